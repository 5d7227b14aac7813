//! signet-server — HSM-backed RSA signing with a hash-linked audit ledger.
//!
//! Startup order matters: the audit ledger opens (and verifies) before the
//! listener binds, so a corrupted store refuses to serve rather than
//! serving unverifiable history.

use std::sync::Arc;

use anyhow::Context;
use signet_hsm::{CryptokiConnector, SigningService};
use signet_ledger::AuditLedger;
use signet_server::{AppState, ServerConfig, build_router};
use signet_storage::RocksBackend;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = ServerConfig::from_env().context("invalid configuration")?;

    let backend = RocksBackend::open(&config.ledger_path)
        .with_context(|| format!("opening ledger store at {}", config.ledger_path.display()))?;
    let ledger = AuditLedger::open(Arc::new(backend))
        .await
        .context("opening audit ledger")?;
    tracing::info!(
        path = %config.ledger_path.display(),
        blocks = ledger.list().await.len(),
        "audit ledger open"
    );

    let connector = CryptokiConnector::new(&config.pkcs11_module);
    let service = SigningService::with_timeout(connector, config.hsm_timeout);

    let app = build_router(AppState::new(service, ledger));

    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("binding {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "signet server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("signet server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install shutdown handler");
        return;
    }
    tracing::info!("shutdown signal received");
}
