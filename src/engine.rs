//! Engine handle: the shared store plus the immutable configuration.

use crate::config::Configuration;
use crate::kv::{KvStore, MemoryKvStore, SharedStore};
use std::fmt;
use std::sync::Arc;

/// Cheaply cloneable handle passed to every component.
///
/// ```rust
/// use split_engine::{config::Configuration, Engine};
///
/// let engine = Engine::in_memory(Configuration::default());
/// let again = engine.clone(); // two `Arc` clones
/// assert!(again.config().enabled);
/// ```
#[derive(Clone)]
pub struct Engine {
    store: SharedStore,
    config: Arc<Configuration>,
}

impl Engine {
    /// Build an engine over `store`.
    pub fn new(store: impl KvStore + 'static, config: Configuration) -> Self {
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }

    /// Build an engine from already shared parts.
    #[must_use]
    pub fn from_shared(store: SharedStore, config: Arc<Configuration>) -> Self {
        Self { store, config }
    }

    /// Engine over a fresh [`MemoryKvStore`].
    #[must_use]
    pub fn in_memory(config: Configuration) -> Self {
        Self::new(MemoryKvStore::new(), config)
    }

    /// The shared store.
    #[must_use]
    pub const fn store(&self) -> &SharedStore {
        &self.store
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &Configuration {
        &self.config
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
