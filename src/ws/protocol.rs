//! WebSocket protocol message definitions
//! These are the wire types for renderer/controller clients

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::game::{ArenaSnapshot, ControlState, MatchOutcome, Session};

/// Scheduler control requests, shared by `/ws` and `POST /control`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ControlAction {
    Pause,
    Resume,
    /// Run one tick while in step mode
    Step,
    SetSpeed {
        speed: i32,
    },
    SetStepMode {
        enabled: bool,
    },
    SetFastForward {
        enabled: bool,
    },
    Stop,
}

impl ControlAction {
    /// Apply to the session, returning the resulting controls
    pub fn apply(self, session: &mut Session) -> Result<ControlState, ConfigError> {
        match self {
            Self::Pause => session.pause(),
            Self::Resume => session.resume(),
            Self::Step => session.request_step(),
            Self::SetSpeed { speed } => session.set_speed(speed)?,
            Self::SetStepMode { enabled } => session.set_step_mode(enabled),
            Self::SetFastForward { enabled } => session.set_fast_forward(enabled),
            Self::Stop => session.stop(),
        }
        Ok(session.controls())
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Scheduler control
    Control(ControlAction),
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome {
        match_number: u64,
        server_time: u64,
        controls: ControlState,
    },

    /// Arena state for rendering
    Snapshot(ArenaSnapshot),

    /// Match has ended
    MatchEnd { outcome: MatchOutcome },

    /// Controls after a change
    ControlState(ControlState),

    /// Error message
    Error { code: String, message: String },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl ServerMsg {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
