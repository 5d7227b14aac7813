//! Shared storage backend abstraction for Signet services.
//!
//! This crate provides the [`StorageBackend`] trait and related types that
//! form the foundation for durable state in Signet. The audit ledger persists
//! its blocks through this abstraction, which keeps the chain logic
//! independent of the storage engine underneath it.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Service Layer                           │
//! │            (API handlers, audit ledger)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    signet-storage                           │
//! │                 StorageBackend trait                        │
//! │            (get, set, delete, scan_prefix)                  │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │ MemoryBackend│              RocksBackend                    │
//! │   (testing)  │             (production)                     │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use signet_storage::{MemoryBackend, StorageBackend};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MemoryBackend::new();
//!
//!     backend.set(b"block/0".to_vec(), b"{}".to_vec()).await?;
//!     let value = backend.get(b"block/0").await?;
//!     assert_eq!(value.map(|b| b.to_vec()), Some(b"{}".to_vec()));
//!
//!     Ok(())
//! }
//! ```
//!
//! # Available Backends
//!
//! | Backend | Use Case | Persistence |
//! |---------|----------|-------------|
//! | [`MemoryBackend`] | Testing, development | No |
//! | [`RocksBackend`] | Production | Yes |
//!
//! # Error Handling
//!
//! All operations return [`StorageResult<T>`], which wraps potential
//! [`StorageError`] variants. Backends map their internal errors to these
//! standardized error types.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with shared test helpers
//!   (key/value generators, backend factories, assertion macros). Enable this
//!   in `[dev-dependencies]` for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod rocks;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;
pub mod types;

// Re-export primary types at crate root for convenience
pub use backend::StorageBackend;
pub use error::{BoxError, StorageError, StorageResult};
pub use memory::MemoryBackend;
pub use rocks::RocksBackend;
pub use types::KeyValue;
