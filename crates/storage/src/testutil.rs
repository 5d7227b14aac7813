//! Shared test utilities for storage backend testing.
//!
//! This module provides common helpers for creating test backends, generating
//! test data, and asserting on [`StorageResult`] values. It is feature-gated
//! behind `testutil` to prevent leaking into production builds.
//!
//! # Usage
//!
//! In integration tests, enable the feature in `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! signet-storage = { path = "../storage", features = ["testutil"] }
//! ```

use crate::{
    StorageBackend,
    error::{StorageError, StorageResult},
    memory::MemoryBackend,
};

/// Create a deterministic test key from a prefix and index.
///
/// Produces keys like `"prefix/42"` encoded as UTF-8 bytes, matching the
/// `prefix + decimal index` layout the ledger persists blocks under.
#[must_use]
pub fn make_key(prefix: &str, idx: usize) -> Vec<u8> {
    format!("{prefix}{idx}").into_bytes()
}

/// Create a test value of the given size filled with `0xAB` bytes.
#[must_use]
pub fn make_value(size: usize) -> Vec<u8> {
    vec![0xAB; size]
}

/// Create a [`MemoryBackend`] pre-populated with `count` keys.
///
/// Keys are formatted as `"{prefix}{idx}"` with values of `value_size` bytes
/// each. The backend is ready for immediate use in tests.
///
/// # Panics
///
/// Panics if any `set` operation fails (should not happen with
/// `MemoryBackend`).
pub async fn populated_backend(prefix: &str, count: usize, value_size: usize) -> MemoryBackend {
    let backend = MemoryBackend::new();
    let value = make_value(value_size);
    for i in 0..count {
        backend.set(make_key(prefix, i), value.clone()).await.expect("populate set failed");
    }
    backend
}

/// Assert that a [`StorageResult`] is a [`StorageError::NotFound`].
#[macro_export]
macro_rules! assert_not_found {
    ($result:expr) => {
        assert!(
            matches!($result, Err($crate::error::StorageError::NotFound { .. })),
            "expected StorageError::NotFound, got: {:?}",
            $result,
        );
    };
}

/// Assert that a [`StorageResult`] is `Ok`, returning the inner value.
#[macro_export]
macro_rules! assert_storage_ok {
    ($result:expr) => {
        match $result {
            Ok(val) => val,
            Err(e) => panic!("expected Ok, got StorageError: {e:?}"),
        }
    };
}

/// Helper to verify that a result is a `NotFound` error.
pub fn is_not_found<T>(result: &StorageResult<T>) -> bool {
    matches!(result, Err(StorageError::NotFound { .. }))
}
