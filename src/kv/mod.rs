//! Key-Value Store Facade
//!
//! Every piece of experiment and per-user persistence decomposes into the
//! primitives of [`KvStore`]: strings, hashes, lists and sets, each with
//! atomic single-key operations. Counters are only ever changed through
//! [`KvStore::incr`] and [`KvStore::hincr_by`], never read-modify-write, so
//! concurrent requests cannot lose an increment.
//!
//! # Example
//!
//! ```rust
//! use split_engine::kv::{KvStore, MemoryKvStore};
//!
//! # fn example() -> split_engine::Result<()> {
//! let store = MemoryKvStore::new();
//!
//! store.set("link_color:version", "1")?;
//! assert_eq!(store.incr("link_color:version")?, 2);
//!
//! store.hincr_by("link_color:red", "participant_count", 1)?;
//! assert_eq!(
//!     store.hget("link_color:red", "participant_count")?,
//!     Some("1".to_string())
//! );
//!
//! store.delete("link_color:red")?;
//! assert!(!store.exists("link_color:red")?);
//! # Ok(())
//! # }
//! ```

mod memory;

pub use memory::MemoryKvStore;

use crate::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Shared handle to a store, as held by every engine component.
pub type SharedStore = Arc<dyn KvStore>;

/// Key-value store trait modelled on the Redis command set the engine needs.
///
/// Implementations must make each method atomic with respect to its key.
pub trait KvStore: Send + Sync {
    /// Get a string value. Returns `None` if the key doesn't exist.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Set a string value, overwriting any existing value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Atomically increment an integer string (missing keys start at 0).
    fn incr(&self, key: &str) -> Result<i64>;

    /// Delete a key of any kind. No-op if the key doesn't exist.
    fn delete(&self, key: &str) -> Result<()>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> Result<bool>;

    /// Get a hash field.
    fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;

    /// Set a hash field.
    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;

    /// Atomically add `delta` to an integer hash field (missing fields start at 0).
    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Get all fields of a hash. Missing keys yield an empty map.
    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>>;

    /// Delete a hash field.
    fn hdel(&self, key: &str, field: &str) -> Result<()>;

    /// Append a value to a list.
    fn rpush(&self, key: &str, value: &str) -> Result<()>;

    /// Get a range of a list. Negative indices count from the end (`-1` is last).
    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>>;

    /// Add a member to a set.
    fn sadd(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set.
    fn srem(&self, key: &str, member: &str) -> Result<()>;

    /// All members of a set, in sorted order.
    fn smembers(&self, key: &str) -> Result<Vec<String>>;

    /// Check set membership.
    fn sismember(&self, key: &str, member: &str) -> Result<bool> {
        Ok(self.smembers(key)?.iter().any(|m| m == member))
    }

    /// Replace a list with the given values.
    fn persist_list(&self, key: &str, values: &[String]) -> Result<()> {
        self.delete(key)?;
        for value in values {
            self.rpush(key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_kv_set_get() {
        let store = MemoryKvStore::new();

        store.set("key1", "value1").unwrap();
        let value = store.get("key1").unwrap();

        assert_eq!(value, Some("value1".to_string()));
    }

    #[test]
    fn test_memory_kv_get_nonexistent() {
        let store = MemoryKvStore::new();

        assert_eq!(store.get("nonexistent").unwrap(), None);
    }

    #[test]
    fn test_memory_kv_delete_nonexistent() {
        let store = MemoryKvStore::new();

        // Should not error
        store.delete("nonexistent").unwrap();
    }

    #[test]
    fn test_memory_kv_exists() {
        let store = MemoryKvStore::new();

        assert!(!store.exists("key").unwrap());

        store.set("key", "value").unwrap();
        assert!(store.exists("key").unwrap());

        store.delete("key").unwrap();
        assert!(!store.exists("key").unwrap());
    }

    #[test]
    fn test_memory_kv_incr() {
        let store = MemoryKvStore::new();

        assert_eq!(store.incr("counter").unwrap(), 1);
        assert_eq!(store.incr("counter").unwrap(), 2);
        assert_eq!(store.get("counter").unwrap(), Some("2".to_string()));
    }

    #[test]
    fn test_memory_kv_incr_non_integer() {
        let store = MemoryKvStore::new();

        store.set("counter", "abc").unwrap();
        assert!(matches!(
            store.incr("counter"),
            Err(crate::Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_memory_kv_hash_ops() {
        let store = MemoryKvStore::new();

        store.hset("h", "a", "1").unwrap();
        store.hset("h", "b", "2").unwrap();
        assert_eq!(store.hget("h", "a").unwrap(), Some("1".to_string()));
        assert_eq!(store.hincr_by("h", "a", 5).unwrap(), 6);
        assert_eq!(store.hincr_by("h", "c", 1).unwrap(), 1);

        let all = store.hgetall("h").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all["a"], "6");

        store.hdel("h", "a").unwrap();
        assert_eq!(store.hget("h", "a").unwrap(), None);
        assert!(store.hgetall("missing").unwrap().is_empty());
    }

    #[test]
    fn test_memory_kv_list_ops() {
        let store = MemoryKvStore::new();

        store.rpush("l", "a").unwrap();
        store.rpush("l", "b").unwrap();
        store.rpush("l", "c").unwrap();

        assert_eq!(store.lrange("l", 0, -1).unwrap(), vec!["a", "b", "c"]);
        assert_eq!(store.lrange("l", 1, 1).unwrap(), vec!["b"]);
        assert_eq!(store.lrange("l", -2, -1).unwrap(), vec!["b", "c"]);
        assert!(store.lrange("l", 5, 10).unwrap().is_empty());
        assert!(store.lrange("missing", 0, -1).unwrap().is_empty());
    }

    #[test]
    fn test_memory_kv_persist_list_replaces() {
        let store = MemoryKvStore::new();

        store.rpush("l", "old").unwrap();
        store
            .persist_list("l", &["x".to_string(), "y".to_string()])
            .unwrap();

        assert_eq!(store.lrange("l", 0, -1).unwrap(), vec!["x", "y"]);
    }

    #[test]
    fn test_memory_kv_set_ops() {
        let store = MemoryKvStore::new();

        store.sadd("s", "b").unwrap();
        store.sadd("s", "a").unwrap();
        store.sadd("s", "a").unwrap();

        assert_eq!(store.smembers("s").unwrap(), vec!["a", "b"]);
        assert!(store.sismember("s", "a").unwrap());

        store.srem("s", "a").unwrap();
        assert!(!store.sismember("s", "a").unwrap());
    }

    #[test]
    fn test_memory_kv_wrong_type() {
        let store = MemoryKvStore::new();

        store.set("key", "value").unwrap();
        assert!(matches!(
            store.hset("key", "f", "v"),
            Err(crate::Error::WrongType { .. })
        ));
        assert!(matches!(
            store.rpush("key", "v"),
            Err(crate::Error::WrongType { .. })
        ));
    }

    #[test]
    fn test_memory_kv_concurrent_increments() {
        let store = Arc::new(MemoryKvStore::new());
        let mut handles = vec![];

        // Spawn 8 concurrent writers, 1000 increments each
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..1000 {
                    store.hincr_by("exp:red", "participant_count", 1).unwrap();
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(
            store.hget("exp:red", "participant_count").unwrap(),
            Some("8000".to_string())
        );
    }

    #[test]
    fn test_shared_store_is_object_safe() {
        let store: SharedStore = Arc::new(MemoryKvStore::new());
        store.set("key", "value").unwrap();
        assert!(store.exists("key").unwrap());
    }
}
