//! PKCS#11 session protocol and RSA signing service for Signet.
//!
//! This crate wraps every cryptographic operation in one bounded interaction
//! with a PKCS#11 security module: bind the library, initialize, open a
//! session, authenticate, locate the key object, execute, and tear down — in
//! strict reverse order, on every exit path.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    SigningService                           │
//! │          sign │ verify │ generate_key_pair                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │                  session protocol                           │
//! │  connect → initialize → open → login → locate → execute →   │
//! │         teardown (logout, close, finalize)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │            HsmConnector / HsmDevice traits                  │
//! ├──────────────┬──────────────────────────────────────────────┤
//! │   MockHsm    │           CryptokiConnector                  │
//! │  (testing)   │      (production, `cryptoki` crate)          │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use signet_hsm::{Pin, SigningService, SlotId, testutil::MockHsm};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hsm = MockHsm::new().with_rsa_key_pair("app-key");
//!     let service = SigningService::new(hsm);
//!
//!     let slot = SlotId(0);
//!     let signature = service
//!         .sign(slot, Pin::new("1234"), "app-key_priv", b"hello")
//!         .await?;
//!     let valid = service
//!         .verify(slot, Pin::new("1234"), "app-key_pub", b"hello", &signature)
//!         .await?;
//!     assert!(valid);
//!     Ok(())
//! }
//! ```
//!
//! # Session Discipline
//!
//! Every service call drives its own session; sessions are never pooled or
//! shared between calls, and no session state outlives a call. A failure at
//! any protocol step still releases everything acquired before it, and a
//! failure *during* teardown is logged rather than allowed to mask the
//! original error.
//!
//! # Feature Flags
//!
//! - **`testutil`**: Enables [`testutil::MockHsm`], an in-process device
//!   double with call accounting and failure injection.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod device;
pub mod digest;
pub mod error;
pub mod pkcs11;
mod session;
pub mod service;
#[cfg(any(test, feature = "testutil"))]
#[allow(clippy::expect_used)]
pub mod testutil;

pub use pkcs11::CryptokiConnector;
pub use device::{
    HsmConnector, HsmDevice, KeyClass, KeyHandle, KeyPairHandles, KeyPairSpec, Pin, SessionHandle,
    SlotId,
};
pub use digest::{SHA256_DIGEST_INFO_PREFIX, encode_digest_info};
pub use error::{HsmError, HsmOperation, HsmResult};
pub use service::{
    DEFAULT_OPERATION_TIMEOUT, GeneratedKeyPair, PRIVATE_LABEL_SUFFIX, PUBLIC_LABEL_SUFFIX,
    SigningService,
};
