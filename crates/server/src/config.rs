//! Environment-driven server configuration.
//!
//! All settings come from the process environment, validated once at
//! startup. The PKCS#11 module path has no sensible default — every HSM
//! vendor ships its own library — so it is the one required setting.

use std::{net::SocketAddr, path::PathBuf, time::Duration};

use thiserror::Error;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Default directory for the audit ledger database.
pub const DEFAULT_LEDGER_PATH: &str = "./signet-audit";

/// Default HSM operation deadline, in seconds.
pub const DEFAULT_HSM_TIMEOUT_SECS: u64 = 30;

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("required environment variable {var} is not set")]
    Missing {
        /// The variable name.
        var: &'static str,
    },

    /// An environment variable is set to an unusable value.
    #[error("invalid value for {var}: {message}")]
    Invalid {
        /// The variable name.
        var: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Validated server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to (`SIGNET_LISTEN_ADDR`).
    pub listen_addr: SocketAddr,
    /// Path to the PKCS#11 shared library (`PKCS11_LIB`).
    pub pkcs11_module: PathBuf,
    /// Directory for the audit ledger database (`SIGNET_LEDGER_PATH`).
    pub ledger_path: PathBuf,
    /// Deadline for one HSM interaction (`SIGNET_HSM_TIMEOUT_SECS`).
    pub hsm_timeout: Duration,
}

impl ServerConfig {
    /// Reads and validates configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen_addr = std::env::var("SIGNET_LISTEN_ADDR")
            .unwrap_or_else(|_| DEFAULT_LISTEN_ADDR.to_owned());
        let listen_addr = listen_addr.parse().map_err(|e| ConfigError::Invalid {
            var: "SIGNET_LISTEN_ADDR",
            message: format!("{e}: {listen_addr}"),
        })?;

        let pkcs11_module = std::env::var("PKCS11_LIB")
            .map(PathBuf::from)
            .map_err(|_| ConfigError::Missing { var: "PKCS11_LIB" })?;
        if pkcs11_module.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                var: "PKCS11_LIB",
                message: "path is empty".into(),
            });
        }

        let ledger_path = std::env::var("SIGNET_LEDGER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_LEDGER_PATH));

        let hsm_timeout = match std::env::var("SIGNET_HSM_TIMEOUT_SECS") {
            Ok(raw) => {
                let secs: u64 = raw.parse().map_err(|e| ConfigError::Invalid {
                    var: "SIGNET_HSM_TIMEOUT_SECS",
                    message: format!("{e}: {raw}"),
                })?;
                if secs == 0 {
                    return Err(ConfigError::Invalid {
                        var: "SIGNET_HSM_TIMEOUT_SECS",
                        message: "deadline must be nonzero".into(),
                    });
                }
                Duration::from_secs(secs)
            },
            Err(_) => Duration::from_secs(DEFAULT_HSM_TIMEOUT_SECS),
        };

        Ok(Self { listen_addr, pkcs11_module, ledger_path, hsm_timeout })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // Environment-variable tests mutate process state; each test uses its
    // own variable values and restores nothing, so they run under a lock.
    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    fn clear_env() {
        for var in
            ["SIGNET_LISTEN_ADDR", "PKCS11_LIB", "SIGNET_LEDGER_PATH", "SIGNET_HSM_TIMEOUT_SECS"]
        {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_defaults_with_module_path() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("PKCS11_LIB", "/usr/lib/softhsm/libsofthsm2.so");

        let config = ServerConfig::from_env().unwrap();
        assert_eq!(config.listen_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.ledger_path, PathBuf::from(DEFAULT_LEDGER_PATH));
        assert_eq!(config.hsm_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_missing_module_path_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Missing { var: "PKCS11_LIB" })));
    }

    #[test]
    fn test_invalid_listen_addr_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("PKCS11_LIB", "/usr/lib/softhsm/libsofthsm2.so");
        std::env::set_var("SIGNET_LISTEN_ADDR", "not-an-address");

        let result = ServerConfig::from_env();
        assert!(matches!(result, Err(ConfigError::Invalid { var: "SIGNET_LISTEN_ADDR", .. })));
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        std::env::set_var("PKCS11_LIB", "/usr/lib/softhsm/libsofthsm2.so");
        std::env::set_var("SIGNET_HSM_TIMEOUT_SECS", "0");

        let result = ServerConfig::from_env();
        assert!(matches!(
            result,
            Err(ConfigError::Invalid { var: "SIGNET_HSM_TIMEOUT_SECS", .. })
        ));
    }
}
