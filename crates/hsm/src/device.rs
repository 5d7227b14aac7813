//! Device abstraction for the PKCS#11 session protocol.
//!
//! [`HsmDevice`] mirrors the external device interface one operation per
//! method — initialize, open-session, authenticate, find-objects, sign,
//! verify, generate-key-pair, logout, close-session, finalize — so the
//! session state machine in this crate can be exercised against a mock with
//! exact call accounting, and against a real module through the `cryptoki`
//! backend.
//!
//! [`HsmConnector`] models the step before all of those: binding the
//! module's library interface. Binding is per-call — every service call
//! connects, drives one session, and finalizes.

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::HsmResult;

/// Addressable logical token location exposed by the security module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(pub u64);

impl From<u64> for SlotId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque handle to one open session on a device.
///
/// Only valid for the device that issued it, and only until
/// [`close_session`](HsmDevice::close_session).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(pub u64);

/// Opaque handle to a key object located or created within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyHandle(pub u64);

/// Object class used to disambiguate the two halves of an RSA key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyClass {
    /// Public key objects (verification).
    Public,
    /// Private key objects (signing).
    Private,
}

/// A user credential for device authentication.
///
/// The inner string is zeroed on drop and never appears in `Debug` output
/// or error messages.
#[derive(Clone)]
pub struct Pin(Zeroizing<String>);

impl Pin {
    /// Wraps a credential.
    pub fn new(pin: impl Into<String>) -> Self {
        Self(Zeroizing::new(pin.into()))
    }

    /// Borrows the credential for submission to the device.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Pin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Pin(<redacted>)")
    }
}

impl From<String> for Pin {
    fn from(pin: String) -> Self {
        Self::new(pin)
    }
}

/// Template for on-token RSA key-pair generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPairSpec {
    /// RSA modulus length in bits.
    pub modulus_bits: u64,
    /// Label for the public key object.
    pub public_label: String,
    /// Label for the private key object.
    pub private_label: String,
}

/// Handles to both halves of a freshly generated key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPairHandles {
    /// Handle to the public key object.
    pub public: KeyHandle,
    /// Handle to the private key object.
    pub private: KeyHandle,
}

/// Binds the security module's library interface.
///
/// Connecting corresponds to protocol step 1; it fails with
/// [`HsmError::DeviceUnavailable`](crate::HsmError::DeviceUnavailable) when
/// the interface cannot be loaded. Each connect yields a fresh device whose
/// lifetime is one session protocol run.
pub trait HsmConnector: Send + Sync {
    /// The device produced by a successful bind.
    type Device: HsmDevice;

    /// Binds the library interface.
    fn connect(&self) -> HsmResult<Self::Device>;
}

/// One security module, at the granularity of the PKCS#11 protocol.
///
/// All methods are blocking; callers drive them from a blocking-capable
/// context (the service uses `spawn_blocking`). Implementations must be
/// internally synchronized — the protocol runner calls them sequentially,
/// but nothing else is assumed.
///
/// # Contract
///
/// - [`find_objects`](Self::find_objects) must terminate its search cursor
///   before returning, whether or not anything matched.
/// - [`close_session`](Self::close_session) invalidates the handle and every
///   key handle issued through it.
/// - [`finalize`](Self::finalize) releases the device context; it is called
///   exactly once per connect, after all sessions are closed.
pub trait HsmDevice: Send {
    /// Initializes the device context (protocol step 2).
    fn initialize(&self) -> HsmResult<()>;

    /// Opens a serial, read/write session against `slot` (step 3).
    fn open_session(&self, slot: SlotId) -> HsmResult<SessionHandle>;

    /// Authenticates the session with the user credential (step 4).
    fn login(&self, session: SessionHandle, pin: &Pin) -> HsmResult<()>;

    /// Searches the session for objects matching `label` and `class`
    /// (step 5), returning every match.
    fn find_objects(
        &self,
        session: SessionHandle,
        label: &str,
        class: KeyClass,
    ) -> HsmResult<Vec<KeyHandle>>;

    /// Signs pre-encoded digest bytes with the private key at `key`.
    fn sign(&self, session: SessionHandle, key: KeyHandle, data: &[u8]) -> HsmResult<Vec<u8>>;

    /// Checks `signature` over pre-encoded digest bytes against the public
    /// key at `key`.
    ///
    /// Returns `Ok(false)` for a cryptographic mismatch — that is a normal
    /// negative result, not an error. Only protocol or transport failures
    /// return `Err`.
    fn verify(
        &self,
        session: SessionHandle,
        key: KeyHandle,
        data: &[u8],
        signature: &[u8],
    ) -> HsmResult<bool>;

    /// Generates an RSA key pair on the token per `spec`.
    fn generate_key_pair(
        &self,
        session: SessionHandle,
        spec: &KeyPairSpec,
    ) -> HsmResult<KeyPairHandles>;

    /// Ends the session's authenticated state (teardown, first).
    fn logout(&self, session: SessionHandle) -> HsmResult<()>;

    /// Closes the session (teardown, second).
    fn close_session(&self, session: SessionHandle) -> HsmResult<()>;

    /// Releases the device context (teardown, last).
    fn finalize(&self) -> HsmResult<()>;
}
