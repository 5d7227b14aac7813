//! The signing service consumed by the API gateway.
//!
//! [`SigningService`] is the public contract: three async operations, each
//! of which binds the module, drives one complete session on a blocking
//! worker thread, and returns a plain result. No session state crosses the
//! boundary or survives a call.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{
    device::{HsmConnector, HsmDevice, KeyClass, KeyHandle, KeyPairSpec, Pin, SlotId},
    digest::encode_digest_info,
    error::{HsmError, HsmOperation, HsmResult},
    session::{find_unique_key, run_session},
};

/// Default deadline for one complete device interaction.
///
/// Device calls are the only unbounded-latency path in the system; the
/// deadline bounds the caller's wait. An expired worker still completes its
/// teardown in the background.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Label suffix for the public half of a generated key pair.
pub const PUBLIC_LABEL_SUFFIX: &str = "_pub";

/// Label suffix for the private half of a generated key pair.
pub const PRIVATE_LABEL_SUFFIX: &str = "_priv";

/// Labels and handles for a freshly generated RSA key pair.
///
/// Both labels carry role-specific suffixes so each half is independently
/// locatable in later sign/verify calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedKeyPair {
    /// Label of the public key object.
    pub public_key_label: String,
    /// Label of the private key object.
    pub private_key_label: String,
    /// Handle to the public key object.
    pub public_key_handle: KeyHandle,
    /// Handle to the private key object.
    pub private_key_handle: KeyHandle,
}

/// HSM-backed RSA signing operations.
///
/// Cheap to clone; concurrent calls each bind and tear down their own
/// device session.
#[derive(Debug, Clone)]
pub struct SigningService<C> {
    connector: C,
    timeout: Duration,
}

impl<C> SigningService<C>
where
    C: HsmConnector + Clone + 'static,
{
    /// Creates a service with the default operation deadline.
    pub fn new(connector: C) -> Self {
        Self::with_timeout(connector, DEFAULT_OPERATION_TIMEOUT)
    }

    /// Creates a service with an explicit operation deadline.
    pub fn with_timeout(connector: C, timeout: Duration) -> Self {
        Self { connector, timeout }
    }

    /// Signs `message` with the private key labeled `key_label` on `slot`.
    ///
    /// The message is digest-encoded (SHA-256 DigestInfo) before the device
    /// sees it; the returned bytes are the raw RSA signature.
    ///
    /// # Errors
    ///
    /// Any session protocol error, unchanged, or
    /// [`HsmError::Timeout`] if the deadline expires.
    pub async fn sign(
        &self,
        slot: SlotId,
        pin: Pin,
        key_label: &str,
        message: &[u8],
    ) -> HsmResult<Vec<u8>> {
        let data = encode_digest_info(message);
        let label = key_label.to_owned();

        self.run(HsmOperation::Sign, move |connector| {
            let device = connector.connect()?;
            run_session(&device, slot, &pin, |device, session| {
                let key = find_unique_key(device, session, &label, KeyClass::Private)?;
                device.sign(session, key, &data)
            })
        })
        .await
    }

    /// Checks `signature` over `message` against the public key labeled
    /// `key_label` on `slot`.
    ///
    /// Returns `Ok(false)` for a cryptographic mismatch; only protocol and
    /// device failures are errors.
    pub async fn verify(
        &self,
        slot: SlotId,
        pin: Pin,
        key_label: &str,
        message: &[u8],
        signature: &[u8],
    ) -> HsmResult<bool> {
        let data = encode_digest_info(message);
        let label = key_label.to_owned();
        let signature = signature.to_vec();

        self.run(HsmOperation::Verify, move |connector| {
            let device = connector.connect()?;
            run_session(&device, slot, &pin, |device, session| {
                let key = find_unique_key(device, session, &label, KeyClass::Public)?;
                device.verify(session, key, &data, &signature)
            })
        })
        .await
    }

    /// Generates an RSA key pair on `slot`.
    ///
    /// The two objects are labeled `{key_label}_pub` and `{key_label}_priv`.
    pub async fn generate_key_pair(
        &self,
        slot: SlotId,
        pin: Pin,
        modulus_bits: u64,
        key_label: &str,
    ) -> HsmResult<GeneratedKeyPair> {
        let spec = KeyPairSpec {
            modulus_bits,
            public_label: format!("{key_label}{PUBLIC_LABEL_SUFFIX}"),
            private_label: format!("{key_label}{PRIVATE_LABEL_SUFFIX}"),
        };

        self.run(HsmOperation::GenerateKeyPair, move |connector| {
            let device = connector.connect()?;
            let handles = run_session(&device, slot, &pin, |device, session| {
                device.generate_key_pair(session, &spec)
            })?;
            Ok(GeneratedKeyPair {
                public_key_label: spec.public_label,
                private_key_label: spec.private_label,
                public_key_handle: handles.public,
                private_key_handle: handles.private,
            })
        })
        .await
    }

    /// Runs one blocking protocol interaction under the service deadline.
    ///
    /// `tokio::time::timeout` does not cancel a blocking task; on expiry the
    /// worker is abandoned and finishes its teardown on its own thread.
    async fn run<T, F>(&self, operation: HsmOperation, task: F) -> HsmResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&C) -> HsmResult<T> + Send + 'static,
    {
        let connector = self.connector.clone();
        let worker = tokio::task::spawn_blocking(move || task(&connector));

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => {
                Err(HsmError::operation(operation, format!("worker task failed: {join_err}")))
            },
            Err(_elapsed) => {
                tracing::warn!(%operation, timeout = ?self.timeout, "device operation timed out");
                Err(HsmError::Timeout { operation, timeout: self.timeout })
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use crate::testutil::MockHsm;

    use super::*;

    fn service(hsm: MockHsm) -> SigningService<MockHsm> {
        SigningService::new(hsm)
    }

    #[tokio::test]
    async fn test_sign_then_verify_round_trip() {
        let hsm = MockHsm::new().with_rsa_key_pair("app");
        let service = service(hsm);

        let signature = service
            .sign(SlotId(0), Pin::new("1234"), "app_priv", b"hello world")
            .await
            .unwrap();
        let valid = service
            .verify(SlotId(0), Pin::new("1234"), "app_pub", b"hello world", &signature)
            .await
            .unwrap();

        assert!(valid);
    }

    #[tokio::test]
    async fn test_verify_mismatch_is_false_not_error() {
        let hsm = MockHsm::new().with_rsa_key_pair("app");
        let service = service(hsm);

        let signature =
            service.sign(SlotId(0), Pin::new("1234"), "app_priv", b"original").await.unwrap();
        let valid = service
            .verify(SlotId(0), Pin::new("1234"), "app_pub", b"tampered", &signature)
            .await
            .unwrap();

        assert!(!valid);
    }

    #[tokio::test]
    async fn test_sign_with_unknown_label_is_key_not_found() {
        let service = service(MockHsm::new());

        let result = service.sign(SlotId(0), Pin::new("1234"), "ghost_priv", b"msg").await;
        assert!(matches!(result, Err(HsmError::KeyNotFound { .. })));
    }

    #[tokio::test]
    async fn test_generate_key_pair_applies_label_suffixes() {
        let hsm = MockHsm::new();
        let service = service(hsm.clone());

        let pair = service
            .generate_key_pair(SlotId(0), Pin::new("1234"), 2048, "fresh")
            .await
            .unwrap();

        assert_eq!(pair.public_key_label, "fresh_pub");
        assert_eq!(pair.private_key_label, "fresh_priv");
        assert_ne!(pair.public_key_handle, pair.private_key_handle);

        // Both halves are independently locatable afterwards.
        let signature =
            service.sign(SlotId(0), Pin::new("1234"), "fresh_priv", b"msg").await.unwrap();
        let valid = service
            .verify(SlotId(0), Pin::new("1234"), "fresh_pub", b"msg", &signature)
            .await
            .unwrap();
        assert!(valid);
    }

    #[tokio::test]
    async fn test_deadline_expiry_is_timeout() {
        let hsm = MockHsm::new()
            .with_rsa_key_pair("slow")
            .with_sign_delay(Duration::from_millis(250));
        let service = SigningService::with_timeout(hsm, Duration::from_millis(20));

        let result = service.sign(SlotId(0), Pin::new("1234"), "slow_priv", b"msg").await;
        assert!(matches!(
            result,
            Err(HsmError::Timeout { operation: HsmOperation::Sign, .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_calls_use_independent_sessions() {
        let hsm = MockHsm::new().with_rsa_key_pair("app");
        let service = service(hsm.clone());

        let mut handles = Vec::new();
        for _ in 0..6 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.sign(SlotId(0), Pin::new("1234"), "app_priv", b"msg").await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }

        let counters = hsm.counters();
        assert_eq!(counters.sessions_opened, 6);
        assert_eq!(counters.sessions_closed, 6);
        assert_eq!(counters.initializes, 6);
        assert_eq!(counters.finalizes, 6);
    }
}
