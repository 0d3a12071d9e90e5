//! Configuration module - environment variable parsing

pub mod engine;

pub use engine::{EngineConfig, RadarPolicy, TrigMode};

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

/// Lowest selectable game speed (slow motion divisor)
pub const MIN_GAME_SPEED: i32 = -99;
/// Highest selectable game speed (ticks per wake-up)
pub const MAX_GAME_SPEED: i32 = 99;

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Allowed client origins for CORS (comma-separated)
    pub client_origin: String,
    /// Directory backing the JSON key-value store
    pub data_dir: PathBuf,

    /// Registered strategy name for the first combatant
    pub tank_a: String,
    /// Registered strategy name for the second combatant
    pub tank_b: String,
    /// Seed for the session RNG; derived from the clock when unset
    pub seed: Option<u64>,
    /// Initial speed setting (see `MIN_GAME_SPEED`..=`MAX_GAME_SPEED`)
    pub game_speed: i32,
    /// Run without animation: as many ticks per wake-up as a match can take
    pub fast_forward: bool,
    pub powerups_enabled: bool,
    pub missile_interception: bool,
    /// Stop the session after this many matches
    pub max_matches: Option<u64>,

    pub engine: EngineConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Render-style PORT wins over SERVER_ADDR
        let server_addr = if let Ok(port) = env::var("PORT") {
            format!("0.0.0.0:{}", port)
        } else {
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string())
        };

        let mut engine = EngineConfig::default();
        if let Some(max_iterations) = parse_var::<u64>("MAX_ITERATIONS")? {
            engine.max_iterations = max_iterations;
        }
        if let Some(policy) = optional_var("RADAR_POLICY") {
            engine.radar_policy = match policy.as_str() {
                "gun" | "slaved_to_gun" => RadarPolicy::SlavedToGun,
                "independent" => RadarPolicy::Independent,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "RADAR_POLICY",
                        reason: format!("unknown policy '{other}'"),
                    })
                }
            };
        }
        if let Some(mode) = optional_var("TRIG_MODE") {
            engine.trig = match mode.as_str() {
                "exact" => TrigMode::Exact,
                "lookup" => TrigMode::Lookup,
                other => {
                    return Err(ConfigError::Invalid {
                        key: "TRIG_MODE",
                        reason: format!("unknown mode '{other}'"),
                    })
                }
            };
        }
        engine.validate()?;

        let game_speed = parse_var::<i32>("GAME_SPEED")?.unwrap_or(1);
        validate_speed(game_speed)?;

        Ok(Self {
            server_addr: server_addr
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,

            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            client_origin: env::var("CLIENT_ORIGIN")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            data_dir: PathBuf::from(env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string())),

            tank_a: strategy_var("TANK_A", "turret")?,
            tank_b: strategy_var("TANK_B", "wanderer")?,
            seed: parse_var::<u64>("SEED")?,
            game_speed,
            fast_forward: parse_var::<bool>("FAST_FORWARD")?.unwrap_or(false),
            powerups_enabled: parse_var::<bool>("POWERUPS_ENABLED")?.unwrap_or(true),
            missile_interception: parse_var::<bool>("MISSILE_INTERCEPTION")?.unwrap_or(false),
            max_matches: parse_var::<u64>("MAX_MATCHES")?,

            engine,
        })
    }
}

/// Speed settings outside the selector range are rejected before ticking
pub fn validate_speed(speed: i32) -> Result<(), ConfigError> {
    if (MIN_GAME_SPEED..=MAX_GAME_SPEED).contains(&speed) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            key: "game_speed",
            reason: format!("{speed} is outside {MIN_GAME_SPEED}..={MAX_GAME_SPEED}"),
        })
    }
}

/// Strategy name, falling back to `default` when unset; set-but-blank is an error
fn strategy_var(key: &'static str, default: &str) -> Result<String, ConfigError> {
    match env::var(key) {
        Ok(name) if name.trim().is_empty() => Err(ConfigError::Missing(key)),
        Ok(name) => Ok(name.trim().to_string()),
        Err(_) => Ok(default.to_string()),
    }
}

fn optional_var(key: &'static str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(key: &'static str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match optional_var(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::Invalid {
                key,
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("{key} out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },

    #[error("No strategy registered under '{0}'")]
    UnknownStrategy(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speed_range_is_enforced() {
        assert!(validate_speed(0).is_ok());
        assert!(validate_speed(-99).is_ok());
        assert!(validate_speed(99).is_ok());
        assert!(validate_speed(100).is_err());
        assert!(validate_speed(-150).is_err());
    }
}
