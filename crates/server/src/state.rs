//! Shared application state.

use std::sync::Arc;

use signet_hsm::{HsmConnector, SigningService};
use signet_ledger::AuditLedger;

/// State shared by all request handlers: the signing service and the
/// process-wide audit ledger.
#[derive(Clone)]
pub struct AppState<C> {
    /// HSM-backed signing operations.
    pub service: SigningService<C>,
    /// The audit ledger; opened once at startup, lives for the process.
    pub ledger: Arc<AuditLedger>,
}

impl<C> AppState<C>
where
    C: HsmConnector + Clone,
{
    /// Bundles the service and ledger into shared state.
    pub fn new(service: SigningService<C>, ledger: AuditLedger) -> Self {
        Self { service, ledger: Arc::new(ledger) }
    }
}
