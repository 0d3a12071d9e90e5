//! Persistence: key-value backends, the leaderboard ledger and tank memory

pub mod kv;
pub mod ledger;
pub mod memory;

pub use kv::{JsonFileStore, KeyValueStore, MemoryStore, StoreError};
pub use ledger::{HeadToHead, Ledger, RatingDelta, TankRecord, LEDGER_KEY};
pub use memory::TankMemory;
