//! Error types for the audit ledger.
//!
//! This module provides [`LedgerError`], which wraps storage failures and
//! adds the integrity-specific failures a hash-linked chain can surface.

use signet_storage::StorageError;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LedgerError {
    /// Error from the underlying storage backend.
    ///
    /// Raised by `append` *before* any in-memory mutation, so the in-memory
    /// chain and the durable store never diverge.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// A persisted block could not be encoded or decoded.
    #[error("Block serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The reloaded chain failed integrity verification.
    ///
    /// Indicates corruption or tampering of the persisted history: a hash
    /// link that does not match the predecessor, a recomputed hash that
    /// differs from the stored one, or a gap in the index sequence.
    #[error("Chain corrupted at block {index}: {reason}")]
    ChainCorrupted {
        /// Index of the first block that failed verification.
        index: u64,
        /// What failed to verify.
        reason: String,
    },
}

impl LedgerError {
    /// Creates a new `Serialization` error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization { message: message.into() }
    }

    /// Creates a new `ChainCorrupted` error for the given block.
    #[must_use]
    pub fn corrupted(index: u64, reason: impl Into<String>) -> Self {
        Self::ChainCorrupted { index, reason: reason.into() }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_conversion() {
        let err: LedgerError = StorageError::internal("disk gone").into();
        assert!(matches!(err, LedgerError::Storage(_)));
    }

    #[test]
    fn test_corrupted_display() {
        let err = LedgerError::corrupted(7, "hash link mismatch");
        assert_eq!(err.to_string(), "Chain corrupted at block 7: hash link mismatch");
    }
}
