//! In-memory storage backend implementation.
//!
//! This module provides [`MemoryBackend`], an in-memory implementation of
//! [`StorageBackend`] suitable for testing and development.
//!
//! # Features
//!
//! - **Thread-safe**: Uses [`parking_lot::RwLock`] for concurrent access
//! - **Ordered storage**: Keys are stored in a [`BTreeMap`] so prefix scans
//!   come back in key order
//!
//! # Example
//!
//! ```
//! use signet_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"greeting".to_vec(), b"hello".to_vec()).await.unwrap();
//!     let value = backend.get(b"greeting").await.unwrap();
//!
//!     assert_eq!(value.unwrap().as_ref(), b"hello");
//! }
//! ```
//!
//! # Limitations
//!
//! - Data is not persisted; all data is lost when the process exits
//! - No replication or distributed features

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::{
    backend::StorageBackend,
    error::StorageResult,
    types::KeyValue,
};

/// In-memory storage backend using [`BTreeMap`].
///
/// This backend is primarily intended for testing but can also be used for
/// development where persistence is not required.
///
/// # Cloning
///
/// `MemoryBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same underlying data store.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<Vec<u8>, Bytes>>>,
}

impl MemoryBackend {
    /// Creates a new, empty in-memory storage backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of keys currently stored.
    ///
    /// Useful in tests asserting that an operation did or did not persist.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Returns `true` if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let data = self.data.read();
        Ok(data.get(key).cloned())
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        let mut data = self.data.write();
        data.insert(key, Bytes::from(value));
        Ok(())
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        let mut data = self.data.write();
        data.remove(key);
        Ok(())
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>> {
        let data = self.data.read();

        let results: Vec<KeyValue> = data
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(k, v)| KeyValue::new(Bytes::copy_from_slice(k), v.clone()))
            .collect();

        Ok(results)
    }

    async fn health_check(&self) -> StorageResult<()> {
        // Acquiring the read lock verifies we're not deadlocked.
        let _unused = self.data.read();
        Ok(())
    }
}
