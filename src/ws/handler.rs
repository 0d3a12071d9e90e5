//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::util::rate_limit::ConnectionRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

type WsSink = futures::stream::SplitSink<WebSocket, Message>;
type WsStream = futures::stream::SplitStream<WebSocket>;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();
    info!(conn_id = %conn_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    // Subscribe before the welcome so no snapshot falls in between
    let events_rx = state.events.subscribe();

    let welcome = {
        let session = state.session.lock();
        ServerMsg::Welcome {
            match_number: session.current_match().number,
            server_time: unix_millis(),
            controls: session.controls(),
        }
    };

    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(conn_id = %conn_id, error = %e, "Failed to send welcome");
        return;
    }

    run_connection(conn_id, state, ws_sink, ws_stream, events_rx).await;

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Run the connection with read/write split
async fn run_connection(
    conn_id: Uuid,
    state: AppState,
    ws_sink: WsSink,
    mut ws_stream: WsStream,
    mut events_rx: broadcast::Receiver<ServerMsg>,
) {
    let rate_limiter = ConnectionRateLimiter::new();
    let (reply_tx, mut reply_rx) = tokio::sync::mpsc::channel::<ServerMsg>(16);

    // Writer task: broadcast events and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        let mut ws_sink = ws_sink;
        loop {
            let msg = tokio::select! {
                event = events_rx.recv() => match event {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(conn_id = %conn_id, lagged_count = n, "Client lagged, skipping {} events", n);
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(conn_id = %conn_id, "Event channel closed");
                        break;
                    }
                },
                reply = reply_rx.recv() => match reply {
                    Some(msg) => msg,
                    None => break,
                },
            };
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> session controls
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                let reply = if rate_limiter.check_control() {
                    handle_client_text(conn_id, &state, &text)
                } else {
                    warn!(conn_id = %conn_id, "Rate limited control message");
                    Some(ServerMsg::error("rate_limited", "Too many messages"))
                };
                if let Some(reply) = reply {
                    if reply_tx.send(reply).await.is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Parse and apply one client message
///
/// Returns the direct reply, if any. Applied controls go out on the
/// broadcast so every client, the sender included, sees the new state.
fn handle_client_text(conn_id: Uuid, state: &AppState, text: &str) -> Option<ServerMsg> {
    match serde_json::from_str::<ClientMsg>(text) {
        Ok(ClientMsg::Ping { t }) => Some(ServerMsg::Pong { t }),
        Ok(ClientMsg::Control(action)) => {
            let result = action.apply(&mut state.session.lock());
            match result {
                Ok(controls) => {
                    info!(conn_id = %conn_id, action = ?action, "Control applied");
                    match state.events.send(ServerMsg::ControlState(controls)) {
                        Ok(_) => None,
                        // No subscribers left; answer the sender directly
                        Err(broadcast::error::SendError(msg)) => Some(msg),
                    }
                }
                Err(e) => Some(ServerMsg::error("invalid_control", e.to_string())),
            }
        }
        Err(e) => {
            warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
            Some(ServerMsg::error("bad_message", e.to_string()))
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut WsSink, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
