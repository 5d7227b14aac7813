//! Hash-linked audit ledger for Signet signing events.
//!
//! This crate provides [`AuditLedger`], an append-only sequence of
//! [`Block`]s persisted through any
//! [`StorageBackend`](signet_storage::StorageBackend). Each block's hash
//! covers its own fields *including* the previous block's hash, so any
//! retroactive edit to persisted history breaks the chain and is detected
//! on reload.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      API Gateway                            │
//! │        (records every successful signing event)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                     AuditLedger                             │
//! │      open │ append │ list │ verify │ close                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                   StorageBackend                            │
//! │        one JSON record per block, key = block/<n>           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use signet_ledger::AuditLedger;
//! use signet_storage::MemoryBackend;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ledger = AuditLedger::open(Arc::new(MemoryBackend::new())).await?;
//!
//!     // A fresh store starts with a synthesized genesis block.
//!     assert_eq!(ledger.list().await.len(), 1);
//!
//!     let block = ledger.append("order #1 signed", "abc123").await?;
//!     assert_eq!(block.index, 1);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Integrity Model
//!
//! The ledger is tamper-*evident*, not tamper-*proof*: an attacker with
//! write access to the store can still destroy history, but cannot rewrite
//! it without invalidating every subsequent hash link. [`AuditLedger::open`]
//! refuses a store whose chain does not verify.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables the `testutil` module with in-memory ledger
//!   constructors for integration tests.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod block;
mod chain;
mod error;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use block::{BLOCK_KEY_PREFIX, Block, GENESIS_PAYLOAD};
pub use chain::AuditLedger;
pub use error::{LedgerError, LedgerResult};
