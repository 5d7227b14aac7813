//! Common types used across storage operations.
//!
//! This module defines shared data structures used by storage backends
//! and their consumers.

use bytes::Bytes;

/// Key-value pair returned from prefix scans.
///
/// Contains the key and its associated value as byte sequences.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use signet_storage::KeyValue;
///
/// let kv = KeyValue {
///     key: Bytes::from("block/0"),
///     value: Bytes::from(r#"{"index":0}"#),
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyValue {
    /// The key identifying this entry.
    pub key: Bytes,

    /// The value stored at this key.
    pub value: Bytes,
}

impl KeyValue {
    /// Creates a new key-value pair.
    ///
    /// # Examples
    ///
    /// ```
    /// use bytes::Bytes;
    /// use signet_storage::KeyValue;
    ///
    /// let kv = KeyValue::new(Bytes::from("key"), Bytes::from("value"));
    /// ```
    pub fn new(key: Bytes, value: Bytes) -> Self {
        Self { key, value }
    }
}
