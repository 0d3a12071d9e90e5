//! Session statistics and skill rating

pub mod aggregate;
pub mod rating;

pub use aggregate::{CombatantTotals, SessionStats, StatRow};
pub use rating::{EloRating, Standing};
