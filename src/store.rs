//! Key-value lookup stores backing the recommendation signals.
//!
//! Every signal source is a read-only `KvStore` keyed by an integer id and
//! returning raw record bytes. The engine decodes those bytes through
//! [`crate::catalog::Catalog::decode`].

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only byte store keyed by track, artist or user id.
pub trait KvStore: Send + Sync {
    /// Fetch the record stored under `key`, or `None` if there is none.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend itself fails.
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }
}

/// In-memory store, mostly for tests and small catalogs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<i64, Vec<u8>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: i64, value: Vec<u8>) {
        self.entries.insert(key, value);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All keys, in ascending order.
    #[must_use]
    pub fn keys(&self) -> Vec<i64> {
        let mut keys: Vec<i64> = self.entries.keys().copied().collect();
        keys.sort_unstable();
        keys
    }
}

impl FromIterator<(i64, Vec<u8>)> for MemoryStore {
    fn from_iter<I: IntoIterator<Item = (i64, Vec<u8>)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().collect() }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: i64) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.get(&key).cloned())
    }
}
