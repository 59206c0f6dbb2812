//! In-memory KV store implementation using `DashMap`.
//!
//! This is the default backend - data is lost on process restart.
//! A networked backend (e.g. Redis) implements the same [`KvStore`] trait.

use super::KvStore;
use crate::{Error, Result};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rustc_hash::FxHashMap;
use std::collections::{BTreeMap, BTreeSet};

/// A stored value. Each key holds exactly one kind.
#[derive(Debug, Clone)]
enum Value {
    Str(String),
    Hash(FxHashMap<String, String>),
    List(Vec<String>),
    Set(BTreeSet<String>),
}

impl Value {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Hash(_) => "hash",
            Self::List(_) => "list",
            Self::Set(_) => "set",
        }
    }
}

fn wrong_type(key: &str, expected: &'static str) -> Error {
    Error::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn parse_counter(key: &str, value: &str) -> Result<i64> {
    value.parse::<i64>().map_err(|_| Error::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// In-memory key-value store using lock-free concurrent hashmap.
///
/// Thread-safe. Mutations go through `DashMap`'s entry API, which holds the
/// shard lock for the duration of the update, so every method is atomic
/// with respect to its key.
///
/// # Example
///
/// ```rust
/// use split_engine::kv::{KvStore, MemoryKvStore};
///
/// # fn example() -> split_engine::Result<()> {
/// let store = MemoryKvStore::new();
/// store.set("hello", "world")?;
/// assert_eq!(store.get("hello")?, Some("world".to_string()));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    store: DashMap<String, Value>,
}

impl MemoryKvStore {
    /// Create a new in-memory KV store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DashMap::new(),
        }
    }

    /// Create with pre-allocated capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            store: DashMap::with_capacity(capacity),
        }
    }

    /// Get the number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// All keys currently stored, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.store.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Clear all entries.
    pub fn clear(&self) {
        self.store.clear();
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.store.get(key).as_deref() {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.store
            .insert(key.to_string(), Value::Str(value.to_string()));
        Ok(())
    }

    fn incr(&self, key: &str) -> Result<i64> {
        match self.store.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(Value::Str("1".to_string()));
                Ok(1)
            }
            Entry::Occupied(mut slot) => match slot.get_mut() {
                Value::Str(s) => {
                    let next = parse_counter(key, s)? + 1;
                    *s = next.to_string();
                    Ok(next)
                }
                _ => Err(wrong_type(key, "string")),
            },
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.store.remove(key);
        Ok(())
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.store.contains_key(key))
    }

    fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        match self.store.get(key).as_deref() {
            None => Ok(None),
            Some(Value::Hash(h)) => Ok(h.get(field).cloned()),
            Some(_) => Err(wrong_type(key, "hash")),
        }
    }

    fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(FxHashMap::default()));
        match entry.value_mut() {
            Value::Hash(h) => {
                h.insert(field.to_string(), value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key, "hash")),
        }
    }

    fn hincr_by(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Value::Hash(FxHashMap::default()));
        match entry.value_mut() {
            Value::Hash(h) => {
                let current = match h.get(field) {
                    Some(v) => parse_counter(&format!("{key}.{field}"), v)?,
                    None => 0,
                };
                let next = current + delta;
                h.insert(field.to_string(), next.to_string());
                Ok(next)
            }
            _ => Err(wrong_type(key, "hash")),
        }
    }

    fn hgetall(&self, key: &str) -> Result<BTreeMap<String, String>> {
        match self.store.get(key).as_deref() {
            None => Ok(BTreeMap::new()),
            Some(Value::Hash(h)) => Ok(h
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect()),
            Some(_) => Err(wrong_type(key, "hash")),
        }
    }

    fn hdel(&self, key: &str, field: &str) -> Result<()> {
        let emptied = match self.store.get_mut(key).as_deref_mut() {
            None => false,
            Some(Value::Hash(h)) => {
                h.remove(field);
                h.is_empty()
            }
            Some(_) => return Err(wrong_type(key, "hash")),
        };
        if emptied {
            self.store
                .remove_if(key, |_, v| matches!(v, Value::Hash(h) if h.is_empty()));
        }
        Ok(())
    }

    fn rpush(&self, key: &str, value: &str) -> Result<()> {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Value::List(Vec::new()));
        match entry.value_mut() {
            Value::List(l) => {
                l.push(value.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key, "list")),
        }
    }

    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let guard = self.store.get(key);
        let list = match guard.as_deref() {
            None => return Ok(Vec::new()),
            Some(Value::List(l)) => l,
            Some(_) => return Err(wrong_type(key, "list")),
        };

        let len = list.len() as isize;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Ok(Vec::new());
        }
        Ok(list[start as usize..=stop as usize].to_vec())
    }

    fn sadd(&self, key: &str, member: &str) -> Result<()> {
        let mut entry = self
            .store
            .entry(key.to_string())
            .or_insert_with(|| Value::Set(BTreeSet::new()));
        match entry.value_mut() {
            Value::Set(s) => {
                s.insert(member.to_string());
                Ok(())
            }
            _ => Err(wrong_type(key, "set")),
        }
    }

    fn srem(&self, key: &str, member: &str) -> Result<()> {
        match self.store.get_mut(key).as_deref_mut() {
            None => Ok(()),
            Some(Value::Set(s)) => {
                s.remove(member);
                Ok(())
            }
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    fn smembers(&self, key: &str) -> Result<Vec<String>> {
        match self.store.get(key).as_deref() {
            None => Ok(Vec::new()),
            Some(Value::Set(s)) => Ok(s.iter().cloned().collect()),
            Some(other) => {
                tracing::warn!(key, kind = other.kind(), "smembers on non-set key");
                Err(wrong_type(key, "set"))
            }
        }
    }
}
