//! Private per-tank persistence handed to strategies

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::sync::Arc;

use super::kv::{self, KeyValueStore, StoreError};

/// Key-value space scoped to one tank name (`tank_memory/<name>/<key>`)
#[derive(Clone)]
pub struct TankMemory {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl TankMemory {
    pub fn new(store: Arc<dyn KeyValueStore>, tank_name: &str) -> Self {
        Self {
            store,
            prefix: format!("tank_memory/{}/", sanitize(tank_name)),
        }
    }

    fn key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    pub fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.store.get(&self.key(key))
    }

    pub fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        self.store.set(&self.key(key), value)
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.store.remove(&self.key(key))
    }

    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        kv::load(self.store.as_ref(), &self.key(key))
    }

    pub fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        kv::save(self.store.as_ref(), &self.key(key), value)
    }
}

impl std::fmt::Debug for TankMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TankMemory")
            .field("prefix", &self.prefix)
            .finish()
    }
}

// Display names may contain spaces or punctuation the key space rejects
fn sanitize(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::kv::MemoryStore;
    use serde_json::json;

    #[test]
    fn scopes_keys_by_tank() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let alpha = TankMemory::new(store.clone(), "alpha");
        let bravo = TankMemory::new(store.clone(), "bravo");

        alpha.set("orbit", &json!(1)).unwrap();
        bravo.set("orbit", &json!(-1)).unwrap();

        assert_eq!(alpha.get("orbit").unwrap(), Some(json!(1)));
        assert_eq!(bravo.get("orbit").unwrap(), Some(json!(-1)));
        assert_eq!(store.get("tank_memory/alpha/orbit").unwrap(), Some(json!(1)));
    }

    #[test]
    fn odd_names_still_make_valid_keys() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let memory = TankMemory::new(store, "Big Tank #2");
        memory.save("wins", &3u32).unwrap();
        assert_eq!(memory.load::<u32>("wins").unwrap(), Some(3));
    }
}
