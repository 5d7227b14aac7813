//! Error types for HSM operations.
//!
//! Each variant corresponds to one step of the session protocol, so a caller
//! can tell *where* an interaction with the device failed. None of these are
//! retried automatically: an unreachable device or a rejected PIN is
//! actionable by an operator, not transient.
//!
//! A cryptographic verification mismatch is deliberately **not** represented
//! here — it is a successful call whose boolean result is `false`.

use std::{sync::Arc, time::Duration};

use thiserror::Error;

/// A boxed error type for source chain tracking.
pub type BoxError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for HSM operations.
pub type HsmResult<T> = Result<T, HsmError>;

/// The cryptographic operation a session was driving when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HsmOperation {
    /// Locating a key object by label and class.
    KeyLookup,
    /// Producing a signature with a private key.
    Sign,
    /// Checking a signature against a public key.
    Verify,
    /// Generating an RSA key pair on the token.
    GenerateKeyPair,
}

impl std::fmt::Display for HsmOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::KeyLookup => "key lookup",
            Self::Sign => "sign",
            Self::Verify => "verify",
            Self::GenerateKeyPair => "generate key pair",
        };
        f.write_str(name)
    }
}

/// Errors that can occur while driving a session against the security
/// module.
///
/// # Non-exhaustive
///
/// This enum is marked `#[non_exhaustive]` — new variants may be added in
/// future minor releases without a semver-breaking change. Downstream match
/// expressions must include a wildcard arm (`_ =>`).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum HsmError {
    /// The PKCS#11 library interface could not be bound.
    #[error("Device unavailable: {message}")]
    DeviceUnavailable {
        /// Description of the binding failure.
        message: String,
        /// The underlying loader error.
        #[source]
        source: Option<BoxError>,
    },

    /// The device context failed to initialize.
    #[error("Device initialization failed: {message}")]
    Initialization {
        /// Description of the initialization failure.
        message: String,
        /// The underlying device error.
        #[source]
        source: Option<BoxError>,
    },

    /// A session against the target slot could not be opened.
    #[error("Session error: {message}")]
    Session {
        /// Description of the session failure.
        message: String,
        /// The underlying device error.
        #[source]
        source: Option<BoxError>,
    },

    /// The supplied credential was rejected.
    #[error("Authentication failed: {message}")]
    Authentication {
        /// Description of the authentication failure. Never contains the
        /// credential itself.
        message: String,
        /// The underlying device error.
        #[source]
        source: Option<BoxError>,
    },

    /// No key object matched the requested label and class.
    #[error("Key not found: {label}")]
    KeyNotFound {
        /// The label that matched nothing.
        label: String,
    },

    /// More than one key object matched the requested label and class.
    ///
    /// Surfaced instead of silently using the first match: signing with an
    /// arbitrary one of several same-labeled keys could use a stale or
    /// planted object.
    #[error("Ambiguous key: {matches} objects match label {label}")]
    AmbiguousKey {
        /// The label that matched more than once.
        label: String,
        /// How many objects matched.
        matches: usize,
    },

    /// The cryptographic operation itself failed at the protocol level.
    #[error("{operation} operation failed: {message}")]
    Operation {
        /// Which operation failed.
        operation: HsmOperation,
        /// Description of the failure.
        message: String,
        /// The underlying device error.
        #[source]
        source: Option<BoxError>,
    },

    /// The operation did not complete within its deadline.
    ///
    /// The abandoned worker still finishes its teardown in the background;
    /// only the caller's wait is bounded.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Which operation timed out.
        operation: HsmOperation,
        /// The deadline that expired.
        timeout: Duration,
    },
}

impl HsmError {
    /// Creates a new `DeviceUnavailable` error with a message and source.
    #[must_use]
    pub fn device_unavailable(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::DeviceUnavailable { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Initialization` error with the given message.
    #[must_use]
    pub fn initialization(message: impl Into<String>) -> Self {
        Self::Initialization { message: message.into(), source: None }
    }

    /// Creates a new `Initialization` error with a message and source.
    #[must_use]
    pub fn initialization_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Initialization { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Session` error with the given message.
    #[must_use]
    pub fn session(message: impl Into<String>) -> Self {
        Self::Session { message: message.into(), source: None }
    }

    /// Creates a new `Session` error with a message and source.
    #[must_use]
    pub fn session_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Session { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `Authentication` error with the given message.
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), source: None }
    }

    /// Creates a new `Authentication` error with a message and source.
    #[must_use]
    pub fn authentication_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Authentication { message: message.into(), source: Some(Arc::new(source)) }
    }

    /// Creates a new `KeyNotFound` error for the given label.
    #[must_use]
    pub fn key_not_found(label: impl Into<String>) -> Self {
        Self::KeyNotFound { label: label.into() }
    }

    /// Creates a new `AmbiguousKey` error for the given label.
    #[must_use]
    pub fn ambiguous_key(label: impl Into<String>, matches: usize) -> Self {
        Self::AmbiguousKey { label: label.into(), matches }
    }

    /// Creates a new `Operation` error with the given message.
    #[must_use]
    pub fn operation(operation: HsmOperation, message: impl Into<String>) -> Self {
        Self::Operation { operation, message: message.into(), source: None }
    }

    /// Creates a new `Operation` error with a message and source.
    #[must_use]
    pub fn operation_with_source(
        operation: HsmOperation,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Operation { operation, message: message.into(), source: Some(Arc::new(source)) }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_key_not_found_display() {
        let err = HsmError::key_not_found("app-key_priv");
        assert_eq!(err.to_string(), "Key not found: app-key_priv");
    }

    #[test]
    fn test_ambiguous_key_display() {
        let err = HsmError::ambiguous_key("app-key_pub", 3);
        assert_eq!(err.to_string(), "Ambiguous key: 3 objects match label app-key_pub");
    }

    #[test]
    fn test_operation_display_names_operation() {
        let err = HsmError::operation(HsmOperation::Sign, "mechanism rejected");
        assert_eq!(err.to_string(), "sign operation failed: mechanism rejected");
    }

    #[test]
    fn test_source_is_preserved() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "libsofthsm2.so missing");
        let err = HsmError::device_unavailable("cannot load module", io);
        assert!(std::error::Error::source(&err).unwrap().to_string().contains("libsofthsm2"));
    }
}
