//! RocksDB storage backend implementation.
//!
//! This module provides [`RocksBackend`], the durable implementation of
//! [`StorageBackend`] backed by an embedded RocksDB database. It is the
//! production store for the audit ledger: one database directory per
//! process, opened once at startup and released when the last handle drops.
//!
//! # Durability
//!
//! RocksDB writes go through its write-ahead log, so a `set` that returns
//! `Ok` survives a process crash. No additional fsync tuning is applied
//! here; the defaults match the durability the audit ledger requires.
//!
//! # Blocking I/O
//!
//! RocksDB calls are synchronous. Individual point reads and writes are
//! short enough to run inline on the async executor; callers scanning very
//! large prefixes should do so at startup (as the ledger does) rather than
//! on a hot request path.

use std::{path::Path, sync::Arc};

use async_trait::async_trait;
use bytes::Bytes;
use rocksdb::{DB, Direction, IteratorMode, Options};

use crate::{
    backend::StorageBackend,
    error::{StorageError, StorageResult},
    types::KeyValue,
};

/// Durable storage backend backed by an embedded RocksDB database.
///
/// # Cloning
///
/// `RocksBackend` is cheaply cloneable via [`Arc`]. All clones share the
/// same database handle; the database closes when the last clone drops.
#[derive(Debug, Clone)]
pub struct RocksBackend(Arc<DB>);

impl RocksBackend {
    /// Opens (creating if absent) a RocksDB database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the database cannot be opened,
    /// e.g. the directory is locked by another process or not writable.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path).map_err(|e| {
            StorageError::internal_with_source(
                format!("failed to open rocksdb at {}", path.display()),
                e,
            )
        })?;

        tracing::debug!(path = %path.display(), "opened rocksdb database");
        Ok(Self(Arc::new(db)))
    }
}

#[async_trait]
impl StorageBackend for RocksBackend {
    async fn get(&self, key: &[u8]) -> StorageResult<Option<Bytes>> {
        let value = self
            .0
            .get(key)
            .map_err(|e| StorageError::internal_with_source("rocksdb get failed", e))?;
        Ok(value.map(Bytes::from))
    }

    async fn set(&self, key: Vec<u8>, value: Vec<u8>) -> StorageResult<()> {
        self.0
            .put(key, value)
            .map_err(|e| StorageError::internal_with_source("rocksdb put failed", e))
    }

    async fn delete(&self, key: &[u8]) -> StorageResult<()> {
        self.0
            .delete(key)
            .map_err(|e| StorageError::internal_with_source("rocksdb delete failed", e))
    }

    async fn scan_prefix(&self, prefix: &[u8]) -> StorageResult<Vec<KeyValue>> {
        let mut results = Vec::new();
        let iter = self.0.iterator(IteratorMode::From(prefix, Direction::Forward));

        for item in iter {
            let (key, value) =
                item.map_err(|e| StorageError::internal_with_source("rocksdb scan failed", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            results.push(KeyValue::new(Bytes::from(key.into_vec()), Bytes::from(value.into_vec())));
        }

        Ok(results)
    }

    async fn health_check(&self) -> StorageResult<()> {
        // A point read on a reserved key exercises the full read path.
        self.0
            .get(b"__health__")
            .map(|_| ())
            .map_err(|e| StorageError::internal_with_source("rocksdb health check failed", e))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RocksBackend) {
        let dir = tempfile::tempdir().expect("tempdir");
        let backend = RocksBackend::open(dir.path()).expect("open rocksdb");
        (dir, backend)
    }

    #[tokio::test]
    async fn test_set_get_delete_roundtrip() {
        let (_dir, backend) = open_temp();

        backend.set(b"key".to_vec(), b"value".to_vec()).await.unwrap();
        assert_eq!(backend.get(b"key").await.unwrap(), Some(Bytes::from("value")));

        backend.delete(b"key").await.unwrap();
        assert_eq!(backend.get(b"key").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_scan_prefix_stops_at_prefix_boundary() {
        let (_dir, backend) = open_temp();

        backend.set(b"block/0".to_vec(), b"a".to_vec()).await.unwrap();
        backend.set(b"block/1".to_vec(), b"b".to_vec()).await.unwrap();
        backend.set(b"blocz".to_vec(), b"c".to_vec()).await.unwrap();
        backend.set(b"meta".to_vec(), b"d".to_vec()).await.unwrap();

        let results = backend.scan_prefix(b"block/").await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].key, Bytes::from("block/0"));
        assert_eq!(results[1].key, Bytes::from("block/1"));
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");

        {
            let backend = RocksBackend::open(dir.path()).expect("open");
            backend.set(b"persistent".to_vec(), b"yes".to_vec()).await.unwrap();
        }

        let backend = RocksBackend::open(dir.path()).expect("reopen");
        assert_eq!(backend.get(b"persistent").await.unwrap(), Some(Bytes::from("yes")));
    }

    #[tokio::test]
    async fn test_health_check() {
        let (_dir, backend) = open_temp();
        assert!(backend.health_check().await.is_ok());
    }
}
