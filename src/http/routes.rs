//! HTTP route definitions

use axum::{
    extract::{Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use crate::app::AppState;
use crate::game::{ArenaSnapshot, ControlState, MatchOutcome};
use crate::stats::{SessionStats, StatRow};
use crate::store::Ledger;
use crate::util::time::uptime_secs;
use crate::ws::handler::ws_handler;
use crate::ws::protocol::{ControlAction, ServerMsg};

/// Outcomes returned when `/outcomes` gets no limit
const DEFAULT_OUTCOME_LIMIT: usize = 20;
const MAX_OUTCOME_LIMIT: usize = 500;

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    // CORS configuration - support multiple origins (comma-separated in CLIENT_ORIGIN)
    let allowed_origins: Vec<header::HeaderValue> = state
        .config
        .client_origin
        .split(',')
        .filter_map(|s| s.trim().parse::<header::HeaderValue>().ok())
        .collect();

    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/arena", get(arena_handler))
        .route("/stats", get(stats_handler))
        .route("/leaderboard", get(leaderboard_handler).delete(reset_leaderboard_handler))
        .route("/outcomes", get(outcomes_handler))
        .route("/control", post(control_handler))
        .route("/ws", get(ws_handler))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Health endpoint
// ============================================================================

#[derive(Serialize, Deserialize)]
struct HealthResponse {
    status: String,
    uptime_secs: u64,
    match_number: u64,
    iteration: u64,
    matches_played: u64,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let session = state.session.lock();
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: uptime_secs(),
        match_number: session.current_match().number,
        iteration: session.current_match().iteration,
        matches_played: session.matches_played(),
    })
}

// ============================================================================
// Arena and statistics
// ============================================================================

async fn arena_handler(State(state): State<AppState>) -> Json<ArenaSnapshot> {
    Json(state.session.lock().snapshot())
}

#[derive(Serialize, Deserialize)]
struct StatsResponse {
    names: [String; 2],
    ratings: [f64; 2],
    rows: Vec<StatRow>,
    totals: SessionStats,
}

async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    let session = state.session.lock();
    Json(StatsResponse {
        names: session.names().clone(),
        ratings: session.ratings(),
        rows: session.stats_rows(),
        totals: session.stats().clone(),
    })
}

async fn leaderboard_handler(State(state): State<AppState>) -> Json<Ledger> {
    Json(state.session.lock().ledger().clone())
}

async fn reset_leaderboard_handler(State(state): State<AppState>) -> StatusCode {
    state.session.lock().reset_leaderboard();
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
struct OutcomesQuery {
    limit: Option<usize>,
}

async fn outcomes_handler(
    State(state): State<AppState>,
    Query(query): Query<OutcomesQuery>,
) -> Result<Json<Vec<MatchOutcome>>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_OUTCOME_LIMIT);
    if limit > MAX_OUTCOME_LIMIT {
        return Err(AppError::BadRequest(format!(
            "limit must not exceed {MAX_OUTCOME_LIMIT}"
        )));
    }
    Ok(Json(state.session.lock().recent_outcomes(limit)))
}

// ============================================================================
// Scheduler controls
// ============================================================================

async fn control_handler(
    State(state): State<AppState>,
    Json(action): Json<ControlAction>,
) -> Result<Json<ControlState>, AppError> {
    let controls = action
        .apply(&mut state.session.lock())
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    info!(action = ?action, "Control applied");
    // Keep WebSocket clients in sync; nobody listening is fine
    let _ = state.events.send(ServerMsg::ControlState(controls));
    Ok(Json(controls))
}

// ============================================================================
// Error handling
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match &self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, EngineConfig};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::net::SocketAddr;
    use std::path::PathBuf;
    use tower::ServiceExt;

    fn test_config() -> Config {
        Config {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            log_level: "info".to_string(),
            client_origin: "http://localhost:5173".to_string(),
            data_dir: PathBuf::from("unused"),
            tank_a: "turret".to_string(),
            tank_b: "idle".to_string(),
            seed: Some(1),
            game_speed: 1,
            fast_forward: false,
            powerups_enabled: true,
            missile_interception: false,
            max_matches: None,
            engine: EngineConfig {
                max_iterations: 50,
                ..Default::default()
            },
        }
    }

    fn app() -> (AppState, Router) {
        let state = AppState::in_memory(test_config()).unwrap();
        (state.clone(), build_router(state))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn health_reports_current_match() {
        let (_, router) = app();
        let response = router.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["match_number"], 1);
        assert_eq!(json["iteration"], 0);
    }

    #[tokio::test]
    async fn control_updates_session() {
        let (state, router) = app();
        let mut events = state.events.subscribe();

        let request = Request::builder()
            .method(Method::POST)
            .uri("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"set_speed","speed":4}"#))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["speed"], 4);
        assert_eq!(state.session.lock().controls().speed, 4);
        assert!(matches!(
            events.try_recv(),
            Ok(ServerMsg::ControlState(ControlState { speed: 4, .. }))
        ));

        let request = Request::builder()
            .method(Method::POST)
            .uri("/control")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(r#"{"action":"set_speed","speed":1000}"#))
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn outcomes_and_leaderboard_follow_finished_matches() {
        let (state, router) = app();
        {
            let mut session = state.session.lock();
            session.set_fast_forward(true);
            while session.matches_played() < 2 {
                session.wake();
            }
        }

        let response = router.clone().oneshot(get("/outcomes?limit=1")).await.unwrap();
        let outcomes = body_json(response).await;
        assert_eq!(outcomes.as_array().map(Vec::len), Some(1));
        assert_eq!(outcomes[0]["match_number"], 2);

        let response = router.clone().oneshot(get("/outcomes?limit=100000")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let board = body_json(router.clone().oneshot(get("/leaderboard")).await.unwrap()).await;
        assert_eq!(board["turret"]["total_matches"], 2);

        let request = Request::builder()
            .method(Method::DELETE)
            .uri("/leaderboard")
            .body(Body::empty())
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(state.session.lock().ledger().is_empty());

        let stats = body_json(router.oneshot(get("/stats")).await.unwrap()).await;
        assert_eq!(stats["totals"]["matches"], 2);
        assert_eq!(stats["rows"][0]["label"], "Wins");
    }

    #[tokio::test]
    async fn arena_returns_snapshot() {
        let (_, router) = app();
        let json = body_json(router.oneshot(get("/arena")).await.unwrap()).await;
        assert_eq!(json["width"], 800.0);
        assert_eq!(json["tanks"].as_array().map(Vec::len), Some(2));
    }
}
