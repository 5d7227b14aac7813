//! Block construction and hashing.
//!
//! A [`Block`] is immutable once constructed: its hash is computed over all
//! of its fields (including the predecessor's hash) at construction time and
//! never recomputed afterward. The ledger persists one JSON record per block
//! under `block/<decimal index>`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Key prefix every persisted block record lives under.
pub const BLOCK_KEY_PREFIX: &str = "block/";

/// Payload marker carried by the synthesized genesis block.
pub const GENESIS_PAYLOAD: &str = "genesis";

/// One entry in the hash-linked audit chain.
///
/// Field names are preserved in the persisted JSON form, so a record is
/// self-describing and reconstructable without positional knowledge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the chain; genesis is 0, strictly increasing by 1.
    pub index: u64,
    /// RFC 3339 creation time, captured at block construction.
    pub timestamp: String,
    /// Caller-supplied description of the recorded event.
    pub payload: String,
    /// Signature value associated with the event. Opaque to the ledger;
    /// it is chained into the hash but never re-verified here.
    pub signature_ref: String,
    /// Hash of the immediately preceding block; empty for genesis.
    pub previous_hash: String,
    /// SHA-256 over this block's own fields, lowercase hex.
    pub hash: String,
}

impl Block {
    /// Constructs a new block, stamping the current time and computing its
    /// hash over the final field values.
    pub(crate) fn new(
        index: u64,
        payload: impl Into<String>,
        signature_ref: impl Into<String>,
        previous_hash: impl Into<String>,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp: Utc::now().to_rfc3339(),
            payload: payload.into(),
            signature_ref: signature_ref.into(),
            previous_hash: previous_hash.into(),
            hash: String::new(),
        };
        block.hash = block.compute_hash();
        block
    }

    /// The fixed root of every chain: index 0, marker payload, no
    /// predecessor.
    pub(crate) fn genesis() -> Self {
        Self::new(0, GENESIS_PAYLOAD, "", "")
    }

    /// Storage key for the block at `index`: the fixed prefix plus the
    /// decimal index. Keys are routing only — reload order comes from the
    /// `index` field, never from key order.
    #[must_use]
    pub fn storage_key(index: u64) -> Vec<u8> {
        format!("{BLOCK_KEY_PREFIX}{index}").into_bytes()
    }

    /// SHA-256 over `(index, timestamp, payload, signature_ref,
    /// previous_hash)`, lowercase hex. The index contributes as fixed-width
    /// big-endian bytes so field boundaries cannot shift.
    #[must_use]
    pub fn compute_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.index.to_be_bytes());
        hasher.update(self.timestamp.as_bytes());
        hasher.update(self.payload.as_bytes());
        hasher.update(self.signature_ref.as_bytes());
        hasher.update(self.previous_hash.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// True if the stored hash matches a recomputation over the current
    /// field values.
    #[must_use]
    pub fn hash_is_valid(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis();
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.payload, GENESIS_PAYLOAD);
        assert_eq!(genesis.signature_ref, "");
        assert_eq!(genesis.previous_hash, "");
        assert!(genesis.hash_is_valid());
    }

    #[test]
    fn test_hash_is_lowercase_hex_sha256() {
        let block = Block::new(1, "payload", "sig", "prev");
        assert_eq!(block.hash.len(), 64);
        assert!(block.hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_tampering_invalidates_hash() {
        let mut block = Block::new(1, "order signed", "abc123", "prev");
        assert!(block.hash_is_valid());

        block.payload = "order NOT signed".into();
        assert!(!block.hash_is_valid());
    }

    #[test]
    fn test_hash_covers_previous_hash() {
        let a = Block::new(1, "same", "same", "prev-a");
        let mut b = a.clone();
        b.previous_hash = "prev-b".into();
        // Identical fields apart from the predecessor must not collide.
        assert_ne!(a.compute_hash(), b.compute_hash());
    }

    #[test]
    fn test_storage_key_format() {
        assert_eq!(Block::storage_key(0), b"block/0");
        assert_eq!(Block::storage_key(42), b"block/42");
    }

    #[test]
    fn test_json_round_trip_preserves_fields() {
        let block = Block::new(3, "payload", "deadbeef", "prev-hash");
        let json = serde_json::to_vec(&block).expect("serialize");
        let back: Block = serde_json::from_slice(&json).expect("deserialize");
        assert_eq!(back, block);
    }

    #[test]
    fn test_json_is_self_describing() {
        let block = Block::new(3, "p", "s", "h");
        let json = serde_json::to_string(&block).expect("serialize");
        for field in ["index", "timestamp", "payload", "signature_ref", "previous_hash", "hash"] {
            assert!(json.contains(&format!("\"{field}\"")), "missing field name {field}");
        }
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Any single-field change to a block must change its computed hash.
            #[test]
            fn hash_is_sensitive_to_payload(
                payload in ".*",
                mutation in ".+",
            ) {
                let block = Block::new(1, payload.clone(), "sig", "prev");
                let mut tampered = block.clone();
                tampered.payload.push_str(&mutation);
                prop_assert_ne!(block.compute_hash(), tampered.compute_hash());
            }

            /// Serialization round-trips bit-exactly for arbitrary payloads.
            #[test]
            fn json_round_trip(payload in ".*", sig in "[0-9a-f]{0,64}") {
                let block = Block::new(7, payload, sig, "prev");
                let json = serde_json::to_vec(&block).expect("serialize");
                let back: Block = serde_json::from_slice(&json).expect("deserialize");
                prop_assert_eq!(back, block);
            }
        }
    }
}
