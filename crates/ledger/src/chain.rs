//! The audit ledger: chain ownership, persistence, and reload.
//!
//! [`AuditLedger`] is the exclusive owner of the in-memory block sequence
//! and the durable store handle. All mutation funnels through
//! [`append`](AuditLedger::append) under an internal async mutex, so two
//! concurrent appends can never compute the same next index or race the
//! previous-hash linkage.

use std::sync::Arc;

use signet_storage::StorageBackend;
use tokio::sync::Mutex;

use crate::{
    block::{BLOCK_KEY_PREFIX, Block},
    error::{LedgerError, LedgerResult},
};

/// Append-only, hash-linked ledger over a [`StorageBackend`].
///
/// # Concurrency
///
/// `append` calls are serialized with respect to each other; `list` and
/// `verify` take the same lock briefly to snapshot the chain. The store
/// handle is shared and lives for the life of the process.
pub struct AuditLedger {
    store: Arc<dyn StorageBackend>,
    chain: Mutex<Vec<Block>>,
}

impl AuditLedger {
    /// Opens the ledger over the given store.
    ///
    /// Reloads every persisted block under the block key prefix, orders them
    /// by their numeric `index` field (storage key order is lexical and
    /// mis-orders `block/10` before `block/9`), and verifies the hash chain.
    /// If the store held no blocks, a genesis block is synthesized and
    /// persisted before the ledger is returned, so every open ledger has a
    /// well-formed root.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::Storage`] if the scan or the genesis write fails.
    /// - [`LedgerError::Serialization`] if a persisted record does not decode.
    /// - [`LedgerError::ChainCorrupted`] if the reloaded chain fails
    ///   integrity verification.
    pub async fn open(store: Arc<dyn StorageBackend>) -> LedgerResult<Self> {
        let records = store.scan_prefix(BLOCK_KEY_PREFIX.as_bytes()).await?;

        let mut blocks = Vec::with_capacity(records.len());
        for kv in &records {
            let block: Block = serde_json::from_slice(&kv.value).map_err(|e| {
                LedgerError::serialization(format!(
                    "invalid block record at key {}: {e}",
                    String::from_utf8_lossy(&kv.key)
                ))
            })?;
            blocks.push(block);
        }
        blocks.sort_by_key(|b| b.index);

        if blocks.is_empty() {
            let genesis = Block::genesis();
            persist(store.as_ref(), &genesis).await?;
            tracing::info!(hash = %genesis.hash, "synthesized genesis block");
            blocks.push(genesis);
        } else {
            verify_chain(&blocks)?;
            tracing::debug!(blocks = blocks.len(), "reloaded audit chain");
        }

        Ok(Self { store, chain: Mutex::new(blocks) })
    }

    /// Appends a new block recording `payload` and `signature_ref`.
    ///
    /// The block's index is the current chain length and its
    /// `previous_hash` is the last block's hash. The record is persisted
    /// first; the in-memory chain is only extended after the durable write
    /// succeeds, so a storage failure leaves both sides unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] if the durable write fails, and
    /// [`LedgerError::Serialization`] if the block does not encode (which
    /// would indicate a bug rather than bad input).
    pub async fn append(
        &self,
        payload: impl Into<String>,
        signature_ref: impl Into<String>,
    ) -> LedgerResult<Block> {
        let mut chain = self.chain.lock().await;

        // `open` guarantees at least the genesis block.
        let previous_hash = chain.last().map(|b| b.hash.clone()).unwrap_or_default();
        let block = Block::new(chain.len() as u64, payload, signature_ref, previous_hash);

        persist(self.store.as_ref(), &block).await?;
        tracing::debug!(index = block.index, hash = %block.hash, "appended audit block");

        chain.push(block.clone());
        Ok(block)
    }

    /// Returns the full chain in index order, oldest first.
    pub async fn list(&self) -> Vec<Block> {
        self.chain.lock().await.clone()
    }

    /// Walks the in-memory chain, checking index continuity, hash links,
    /// and each block's own hash.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::ChainCorrupted`] naming the first block that
    /// fails verification.
    pub async fn verify(&self) -> LedgerResult<()> {
        let chain = self.chain.lock().await;
        verify_chain(&chain)
    }

    /// Checks that the underlying store can serve requests.
    pub async fn health_check(&self) -> LedgerResult<()> {
        self.store.health_check().await.map_err(LedgerError::from)
    }

    /// Releases the ledger.
    ///
    /// The store handle is dropped with the ledger; for shared backends the
    /// underlying database closes when the last handle goes away. Further
    /// operations on this ledger are impossible by construction (`close`
    /// consumes it).
    pub fn close(self) {
        tracing::debug!("audit ledger closed");
    }
}

/// Serializes and durably writes one block.
async fn persist(store: &dyn StorageBackend, block: &Block) -> LedgerResult<()> {
    let value = serde_json::to_vec(block)
        .map_err(|e| LedgerError::serialization(format!("block {} encode: {e}", block.index)))?;
    store.set(Block::storage_key(block.index), value).await?;
    Ok(())
}

/// Verifies index continuity, hash linkage, and per-block hashes.
fn verify_chain(blocks: &[Block]) -> LedgerResult<()> {
    for (i, block) in blocks.iter().enumerate() {
        if block.index != i as u64 {
            return Err(LedgerError::corrupted(
                block.index,
                format!("index out of sequence, expected {i}"),
            ));
        }

        let expected_prev = if i == 0 { "" } else { blocks[i - 1].hash.as_str() };
        if block.previous_hash != expected_prev {
            return Err(LedgerError::corrupted(block.index, "hash link mismatch"));
        }

        if !block.hash_is_valid() {
            return Err(LedgerError::corrupted(block.index, "stored hash mismatch"));
        }
    }
    Ok(())
}
