//! HTTP gateway for Signet.
//!
//! Translates HTTP requests into calls on the
//! [`SigningService`](signet_hsm::SigningService) and the
//! [`AuditLedger`](signet_ledger::AuditLedger), and maps their errors onto
//! HTTP status codes. Malformed request bodies are rejected by the JSON
//! extractor before they ever reach the core.
//!
//! # Routes
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | POST | `/v1/sign` | Sign a message; records an audit block |
//! | POST | `/v1/verify` | Verify a signature |
//! | POST | `/v1/keys/rsa` | Generate an RSA key pair on the token |
//! | POST | `/v1/ledger/blocks` | Append an audit block |
//! | GET  | `/v1/ledger/blocks` | List the audit chain |
//! | GET  | `/v1/health` | Storage health probe |

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
