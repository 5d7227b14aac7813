//! Shared test utilities for ledger testing.
//!
//! Feature-gated behind `testutil` to prevent leaking into production
//! builds. Enable in `[dev-dependencies]`:
//!
//! ```toml
//! [dev-dependencies]
//! signet-ledger = { path = "../ledger", features = ["testutil"] }
//! ```

use std::sync::Arc;

use signet_storage::MemoryBackend;

use crate::AuditLedger;

/// Opens an [`AuditLedger`] over a fresh in-memory backend, returning both
/// so tests can inspect or tamper with the raw store.
///
/// # Panics
///
/// Panics if opening the ledger fails (should not happen with
/// `MemoryBackend`).
pub async fn memory_ledger() -> (MemoryBackend, AuditLedger) {
    let backend = MemoryBackend::new();
    let ledger =
        AuditLedger::open(Arc::new(backend.clone())).await.expect("open over memory backend");
    (backend, ledger)
}

/// Opens an [`AuditLedger`] pre-populated with `count` appended blocks
/// (payloads `"event 0"`, `"event 1"`, ... and signature refs `"sig0"`,
/// `"sig1"`, ...).
///
/// # Panics
///
/// Panics if any append fails.
pub async fn populated_ledger(count: usize) -> (MemoryBackend, AuditLedger) {
    let (backend, ledger) = memory_ledger().await;
    for i in 0..count {
        ledger.append(format!("event {i}"), format!("sig{i}")).await.expect("populate append");
    }
    (backend, ledger)
}
