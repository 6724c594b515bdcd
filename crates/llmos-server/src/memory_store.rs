//! Key-value memory store backing the `{{memory.*}}` template namespace
//! and the `memory` capability.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;

/// Shared in-process key-value store.
#[derive(Clone, Default)]
pub struct MemoryKv {
    inner: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.read().expect("memory kv lock").get(key).cloned()
    }

    pub fn set(&self, key: &str, value: Value) {
        self.inner
            .write()
            .expect("memory kv lock")
            .insert(key.to_string(), value);
    }

    /// Returns true when the key existed.
    pub fn delete(&self, key: &str) -> bool {
        self.inner
            .write()
            .expect("memory kv lock")
            .remove(key)
            .is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .inner
            .read()
            .expect("memory kv lock")
            .keys()
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Snapshot for template resolution.
    pub fn snapshot(&self) -> HashMap<String, Value> {
        self.inner.read().expect("memory kv lock").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_delete_round_trip() {
        let kv = MemoryKv::new();
        kv.set("greeting", json!("bonjour"));
        assert_eq!(kv.get("greeting"), Some(json!("bonjour")));
        assert_eq!(kv.keys(), vec!["greeting".to_string()]);

        assert!(kv.delete("greeting"));
        assert!(!kv.delete("greeting"));
        assert!(kv.get("greeting").is_none());
    }
}
