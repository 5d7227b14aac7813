//! Storage backend trait definition.
//!
//! This module defines the [`StorageBackend`] trait, which is the core
//! abstraction for key-value storage in Signet. All storage implementations
//! (`MemoryBackend`, `RocksBackend`) implement this trait.
//!
//! # Design Philosophy
//!
//! The trait provides a minimal, generic key-value interface:
//! - **Keys and values are bytes**: No assumptions about serialization format
//! - **Async by default**: All operations are async for non-blocking I/O
//! - **Prefix scans supported**: The audit ledger reloads its chain through a
//!   single prefix scan at startup
//!
//! Domain-specific logic (block encoding, chain linkage) lives in the layers
//! built on top of this trait, not in the storage backends.

use async_trait::async_trait;
use bytes::Bytes;

use crate::{error::StorageResult, types::KeyValue};

/// Abstract storage backend for key-value operations.
///
/// This trait defines the interface that all storage backends must implement.
/// Backends are expected to be thread-safe (`Send + Sync`) and support
/// concurrent operations.
///
/// # Key Operations
///
/// | Method | Description |
/// |--------|-------------|
/// | [`get`](StorageBackend::get) | Retrieve a single value by key |
/// | [`set`](StorageBackend::set) | Store a key-value pair |
/// | [`delete`](StorageBackend::delete) | Remove a key |
/// | [`scan_prefix`](StorageBackend::scan_prefix) | Retrieve all pairs under a key prefix |
/// | [`health_check`](StorageBackend::health_check) | Verify backend availability |
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use signet_storage::{StorageBackend, MemoryBackend};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let backend = MemoryBackend::new();
///
/// backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
/// let value = backend.get(b"key").await.unwrap();
/// assert_eq!(value, Some(Bytes::from("value")));
/// # });
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Retrieves a value by key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` if the key exists
    /// - `Ok(None)` if the key doesn't exist
    /// - `Err(...)` on storage errors
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>>;

    /// Stores a key-value pair.
    ///
    /// If the key already exists, its value is overwritten. The write is
    /// durable once this call returns `Ok` (for persistent backends).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()>;

    /// Deletes a key.
    ///
    /// If the key doesn't exist, this is a no-op (returns `Ok(())`).
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn delete(&self, key: &[u8]) -> StorageResult<()>;

    /// Retrieves all key-value pairs whose key starts with `prefix`.
    ///
    /// Results are returned in ascending key order. Callers that need a
    /// different ordering (e.g., numeric ordering of decimal-suffixed keys)
    /// must sort on a field extracted from the decoded values — key order for
    /// `block/9` vs `block/10` is lexical, not numeric.
    #[must_use = "storage operations may fail and errors must be handled"]
    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>>;

    /// Checks that the backend can serve requests.
    ///
    /// A failure indicates the backend is unusable (e.g., the underlying
    /// store is closed or its files are gone), not a transient condition.
    #[must_use = "health check results indicate backend availability and must be inspected"]
    async fn health_check(&self) -> StorageResult<()>;
}
