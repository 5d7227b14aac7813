//! Integration tests for the audit ledger over the durable RocksDB backend.
//!
//! These tests exercise the persistence and reload invariants across real
//! process-restart boundaries (drop the ledger and the database handle,
//! reopen from disk).

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use signet_ledger::{AuditLedger, Block, GENESIS_PAYLOAD, LedgerError};
use signet_storage::{RocksBackend, StorageBackend};

fn open_backend(path: &std::path::Path) -> Arc<RocksBackend> {
    Arc::new(RocksBackend::open(path).expect("rocksdb open"))
}

#[tokio::test]
async fn fresh_database_gets_exactly_one_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();

    let blocks = ledger.list().await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 0);
    assert_eq!(blocks[0].payload, GENESIS_PAYLOAD);
    assert_eq!(blocks[0].previous_hash, "");
}

#[tokio::test]
async fn genesis_is_synthesized_once_not_per_open() {
    let dir = tempfile::tempdir().unwrap();

    let first_genesis = {
        let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
        ledger.list().await[0].clone()
    };

    let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
    let blocks = ledger.list().await;

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0], first_genesis, "reopen must reload, not re-synthesize");
}

#[tokio::test]
async fn appended_chain_survives_restart_bit_for_bit() {
    let dir = tempfile::tempdir().unwrap();

    let before = {
        let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
        ledger.append("order #1 signed", "abc123").await.unwrap();
        ledger.append("order #2 signed", "def456").await.unwrap();
        let blocks = ledger.list().await;
        ledger.close();
        blocks
    };

    let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
    let after = ledger.list().await;

    assert_eq!(after, before, "same blocks, same order, same hashes");
    assert!(ledger.verify().await.is_ok());
}

#[tokio::test]
async fn reload_orders_by_numeric_index_not_key_string() {
    let dir = tempfile::tempdir().unwrap();

    {
        let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
        // More than ten blocks, so "block/10" < "block/2" lexically and a
        // key-ordered reload would scramble the chain.
        for i in 0..15 {
            ledger.append(format!("event {i}"), format!("sig{i}")).await.unwrap();
        }
    }

    let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
    let blocks = ledger.list().await;

    assert_eq!(blocks.len(), 16);
    for (i, block) in blocks.iter().enumerate() {
        assert_eq!(block.index, i as u64);
        if i > 0 {
            assert_eq!(block.previous_hash, blocks[i - 1].hash);
        }
    }
}

#[tokio::test]
async fn empty_open_then_two_appends_walkthrough() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();

    // Open empty ledger: one block, index 0, no predecessor.
    let blocks = ledger.list().await;
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].index, 0);
    assert_eq!(blocks[0].previous_hash, "");
    let genesis_hash = blocks[0].hash.clone();

    // First append links to genesis.
    let b1 = ledger.append("order #1 signed", "abc123").await.unwrap();
    assert_eq!(b1.index, 1);
    assert_eq!(b1.previous_hash, genesis_hash);

    // Second append links to the first.
    let b2 = ledger.append("order #2 signed", "def456").await.unwrap();
    assert_eq!(b2.index, 2);
    assert_eq!(b2.previous_hash, b1.hash);

    let blocks = ledger.list().await;
    assert_eq!(blocks.iter().map(|b| b.index).collect::<Vec<_>>(), vec![0, 1, 2]);
}

#[tokio::test]
async fn reload_ignores_records_outside_the_block_prefix() {
    // Pre-fill the store with unrelated keys; the ledger must neither choke
    // on them nor count them as blocks.
    let backend = signet_storage::testutil::populated_backend("meta/", 20, 32).await;
    backend.set(b"blocz".to_vec(), b"not a block".to_vec()).await.unwrap();

    let ledger = AuditLedger::open(Arc::new(backend.clone())).await.unwrap();
    assert_eq!(ledger.list().await.len(), 1, "only the synthesized genesis");

    ledger.append("event", "sig").await.unwrap();
    assert_eq!(ledger.list().await.len(), 2);

    // The unrelated records are untouched.
    let key = signet_storage::testutil::make_key("meta/", 0);
    assert!(backend.get(&key).await.unwrap().is_some());
}

#[tokio::test]
async fn tampered_record_on_disk_is_rejected_at_open() {
    let dir = tempfile::tempdir().unwrap();

    {
        let ledger = AuditLedger::open(open_backend(dir.path())).await.unwrap();
        ledger.append("authentic event", "sig").await.unwrap();
    }

    // Doctor the persisted record directly through the storage layer.
    {
        let backend = open_backend(dir.path());
        let raw = backend.get(b"block/1").await.unwrap().expect("block 1 exists");
        let mut block: Block = serde_json::from_slice(&raw).unwrap();
        block.signature_ref = "forged".into();
        backend
            .set(Block::storage_key(1), serde_json::to_vec(&block).unwrap())
            .await
            .unwrap();
    }

    let result = AuditLedger::open(open_backend(dir.path())).await;
    assert!(matches!(result, Err(LedgerError::ChainCorrupted { index: 1, .. })));
}
