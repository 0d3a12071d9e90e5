//! Arena simulation modules

pub mod builtin;
pub mod combat;
pub mod geometry;
pub mod r#match;
pub mod physics;
pub mod powerup;
pub mod sensor;
pub mod session;
pub mod snapshot;
pub mod strategy;
pub mod tank;

pub use r#match::MatchOutcome;
pub use session::{run_scheduler, ControlState, Session, SessionSettings};
pub use snapshot::ArenaSnapshot;
pub use strategy::StrategyRegistry;
