// In-memory хранилище для тестов и платформ без постоянного носителя

use crate::storage::KeyValueStore;
use crate::utils::error::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory key-value хранилище
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &[u8]) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_get_set_overwrite() {
        let store = MemoryStore::new();
        assert!(store.get("k").unwrap().is_none());

        store.set("k", b"one").unwrap();
        store.set("k", b"two").unwrap();
        assert_eq!(store.get("k").unwrap(), Some(b"two".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_shared_through_arc() {
        let store = Arc::new(MemoryStore::new());
        let other = Arc::clone(&store);

        other.set("k", b"v").unwrap();
        assert!(store.contains_key("k"));
        assert_eq!(KeyValueStore::get(&store, "k").unwrap(), Some(b"v".to_vec()));
    }
}
