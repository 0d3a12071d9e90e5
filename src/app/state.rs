//! Application state shared across routes

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::warn;

use crate::config::{Config, ConfigError};
use crate::game::{Session, SessionSettings, StrategyRegistry};
use crate::store::{JsonFileStore, KeyValueStore, MemoryStore};
use crate::ws::protocol::ServerMsg;

/// Buffered events per subscriber before it lags
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub session: Arc<Mutex<Session>>,
    /// Snapshots, match ends and control changes for WebSocket clients
    pub events: broadcast::Sender<ServerMsg>,
}

impl AppState {
    /// Wire a session onto the JSON store in `config.data_dir`
    ///
    /// Falls back to an in-memory store when the directory is unusable.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let store: Arc<dyn KeyValueStore> = match JsonFileStore::open(&config.data_dir) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                warn!(
                    dir = %config.data_dir.display(),
                    error = %e,
                    "Data directory unusable, leaderboard will not persist"
                );
                Arc::new(MemoryStore::new())
            }
        };
        Self::with_store(config, store)
    }

    /// State backed by a throwaway in-memory store
    pub fn in_memory(config: Config) -> Result<Self, ConfigError> {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    pub fn with_store(config: Config, store: Arc<dyn KeyValueStore>) -> Result<Self, ConfigError> {
        let config = Arc::new(config);

        let registry = StrategyRegistry::with_builtins();
        let session = Session::new(
            Arc::new(config.engine.clone()),
            SessionSettings::from_config(&config),
            &registry,
            store,
        )?;

        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            config,
            session: Arc::new(Mutex::new(session)),
            events,
        })
    }
}
