//! PKCS#1 v1.5 digest encoding.
//!
//! An RSA signing primitive driven with the raw `CKM_RSA_PKCS` mechanism
//! expects the caller to supply a complete DigestInfo structure: a fixed
//! ASN.1 prefix identifying the hash algorithm, followed by the raw digest.
//! The module does no hashing itself, so getting these bytes wrong produces
//! a structurally valid signature that simply never verifies.

use sha2::{Digest, Sha256};

/// DER encoding of the DigestInfo header for SHA-256 (RFC 8017 §9.2 note 1).
///
/// This is a literal constant, never derived at runtime; it must match the
/// registered algorithm identifier for SHA-256 exactly.
pub const SHA256_DIGEST_INFO_PREFIX: [u8; 19] = [
    0x30, 0x31, 0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01,
    0x05, 0x00, 0x04, 0x20,
];

/// Builds the exact byte sequence submitted to the signing primitive for
/// `message`: the SHA-256 DigestInfo prefix followed by the message's
/// SHA-256 digest. Pure function, no error paths.
#[must_use]
pub fn encode_digest_info(message: &[u8]) -> Vec<u8> {
    let digest = Sha256::digest(message);

    let mut encoded = Vec::with_capacity(SHA256_DIGEST_INFO_PREFIX.len() + digest.len());
    encoded.extend_from_slice(&SHA256_DIGEST_INFO_PREFIX);
    encoded.extend_from_slice(&digest);
    encoded
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // FIPS 180-4 test vector: SHA-256("abc").
    const SHA256_ABC: [u8; 32] = [
        0xba, 0x78, 0x16, 0xbf, 0x8f, 0x01, 0xcf, 0xea, 0x41, 0x41, 0x40, 0xde, 0x5d, 0xae,
        0x22, 0x23, 0xb0, 0x03, 0x61, 0xa3, 0x96, 0x17, 0x7a, 0x9c, 0xb4, 0x10, 0xff, 0x61,
        0xf2, 0x00, 0x15, 0xad,
    ];

    #[test]
    fn test_known_vector() {
        let encoded = encode_digest_info(b"abc");
        assert_eq!(&encoded[..19], &SHA256_DIGEST_INFO_PREFIX);
        assert_eq!(&encoded[19..], &SHA256_ABC);
    }

    #[test]
    fn test_empty_message() {
        // SHA-256 of the empty string.
        let encoded = encode_digest_info(b"");
        assert_eq!(encoded.len(), 51);
        assert_eq!(encoded[19], 0xe3);
        assert_eq!(encoded[20], 0xb0);
    }

    #[test]
    fn test_prefix_identifies_sha256() {
        // The OID bytes for 2.16.840.1.101.3.4.2.1 must be embedded verbatim.
        let oid = [0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01];
        assert_eq!(&SHA256_DIGEST_INFO_PREFIX[5..14], &oid);
        // Trailing 0x04 0x20: OCTET STRING of 32 bytes.
        assert_eq!(&SHA256_DIGEST_INFO_PREFIX[17..], &[0x04, 0x20]);
    }

    mod proptests {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            /// Output is always prefix + 32 digest bytes, for any input.
            #[test]
            fn output_shape(message in proptest::collection::vec(any::<u8>(), 0..4096)) {
                let encoded = encode_digest_info(&message);
                prop_assert_eq!(encoded.len(), 51);
                prop_assert_eq!(&encoded[..19], &SHA256_DIGEST_INFO_PREFIX[..]);
            }

            /// Encoding is deterministic.
            #[test]
            fn deterministic(message in proptest::collection::vec(any::<u8>(), 0..1024)) {
                prop_assert_eq!(encode_digest_info(&message), encode_digest_info(&message));
            }
        }
    }
}
