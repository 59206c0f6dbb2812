//! User context adapters
//!
//! A [`UserStore`] is a flat string map holding one user's assignment
//! state. The engine is agnostic to where it lives:
//!
//! - [`SessionAdapter`]: an in-process map, standing in for a host's
//!   session or cookie jar.
//! - [`KvUserAdapter`]: one hash per user in a [`KvStore`](crate::kv::KvStore),
//!   keyed `"<namespace>:<user_id>"`.

use crate::kv::SharedStore;
use crate::Result;
use rustc_hash::FxHashMap;

/// Per-user key/value state.
pub trait UserStore: Send {
    /// Every key held, sorted.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn keys(&self) -> Result<Vec<String>>;

    /// Value of `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn set(&mut self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; no-op when absent.
    ///
    /// # Errors
    ///
    /// Propagates backend errors.
    fn delete(&mut self, key: &str) -> Result<()>;
}

/// In-process user state.
#[derive(Debug, Clone, Default)]
pub struct SessionAdapter {
    values: FxHashMap<String, String>,
}

impl SessionAdapter {
    /// Empty session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Session pre-populated from `values`.
    pub fn from_entries<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Consume into the raw map, e.g. to write back into a host session.
    #[must_use]
    pub fn into_inner(self) -> FxHashMap<String, String> {
        self.values
    }
}

impl UserStore for SessionAdapter {
    fn keys(&self) -> Result<Vec<String>> {
        let mut keys: Vec<String> = self.values.keys().cloned().collect();
        keys.sort_unstable();
        Ok(keys)
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.values.remove(key);
        Ok(())
    }
}

/// User state kept in a shared store hash.
#[derive(Clone)]
pub struct KvUserAdapter {
    store: SharedStore,
    hash_key: String,
}

impl KvUserAdapter {
    /// State for `user_id` under `namespace`.
    pub fn new(store: SharedStore, namespace: &str, user_id: &str) -> Self {
        Self {
            store,
            hash_key: format!("{namespace}:{user_id}"),
        }
    }

    /// Hash key holding this user's state.
    #[must_use]
    pub fn hash_key(&self) -> &str {
        &self.hash_key
    }
}

impl std::fmt::Debug for KvUserAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KvUserAdapter")
            .field("hash_key", &self.hash_key)
            .finish_non_exhaustive()
    }
}

impl UserStore for KvUserAdapter {
    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.store.hgetall(&self.hash_key)?.into_keys().collect())
    }

    fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.hget(&self.hash_key, key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.store.hset(&self.hash_key, key, value)
    }

    fn delete(&mut self, key: &str) -> Result<()> {
        self.store.hdel(&self.hash_key, key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{KvStore, MemoryKvStore};
    use std::sync::Arc;

    fn exercise(adapter: &mut dyn UserStore) {
        assert!(adapter.keys().unwrap().is_empty());
        adapter.set("b", "2").unwrap();
        adapter.set("a", "1").unwrap();
        assert_eq!(adapter.keys().unwrap(), ["a", "b"]);
        assert_eq!(adapter.get("a").unwrap().as_deref(), Some("1"));

        adapter.delete("a").unwrap();
        adapter.delete("missing").unwrap();
        assert_eq!(adapter.keys().unwrap(), ["b"]);
        assert_eq!(adapter.get("a").unwrap(), None);
    }

    #[test]
    fn test_session_adapter() {
        exercise(&mut SessionAdapter::new());
    }

    #[test]
    fn test_kv_adapter() {
        let store: SharedStore = Arc::new(MemoryKvStore::new());
        let mut adapter = KvUserAdapter::new(store.clone(), "persistence", "42");
        exercise(&mut adapter);
        assert_eq!(adapter.hash_key(), "persistence:42");
        assert!(store.exists("persistence:42").unwrap());
    }

    #[test]
    fn test_session_from_entries() {
        let session = SessionAdapter::from_entries([("link_color", "blue")]);
        assert_eq!(session.get("link_color").unwrap().as_deref(), Some("blue"));
        assert_eq!(session.into_inner().len(), 1);
    }
}
