// src/main.rs

//! # Credential Anchor - Main Entry Point
//!
//! Wires the record store, the optional ledger client and the artifact store
//! into an [`AnchorCoordinator`] and serves the HTTP API.
//!
//! ## Environment Variables
//! - `INFURA_URL`: JSON-RPC endpoint of the ledger
//! - `CONTRACT_ADDRESS`: deployed CertificateRegistry contract address
//! - `PRIVATE_KEY`: signing key of the issuing account
//! - `CREDENTIAL_ANCHOR__SECTION__KEY`: any other setting, e.g.
//!   `CREDENTIAL_ANCHOR__SERVER__PORT=8080`
//!
//! Without the three ledger variables the registry runs in database-only
//! mode: credentials are issued and verified, but never anchored.

use anyhow::Context;
use credential_anchor::blockchain::eth_client::EthLedgerClient;
use credential_anchor::blockchain::ledger_client::LedgerClient;
use credential_anchor::config::{LedgerSettings, Settings};
use credential_anchor::services::anchor_coordinator::AnchorCoordinator;
use credential_anchor::services::api_server::ApiServer;
use credential_anchor::storage::artifact::FileArtifactStore;
use credential_anchor::storage::file_store::FileRecordStore;
use credential_anchor::storage::memory_store::MemoryRecordStore;
use credential_anchor::storage::record_store::RecordStore;
use dotenv::dotenv;
use log::{info, warn};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("failed to load configuration")?;

    let store: Arc<dyn RecordStore> = match &settings.storage.records_path {
        Some(path) => Arc::new(
            FileRecordStore::open(path)
                .await
                .with_context(|| format!("failed to open record store at {}", path.display()))?,
        ),
        None => {
            warn!("No records_path configured; records are kept in memory only");
            Arc::new(MemoryRecordStore::new())
        }
    };

    let ledger = connect_ledger(&settings.ledger).await;
    let artifacts = Arc::new(FileArtifactStore::new(&settings.storage.artifact_dir));
    let coordinator = AnchorCoordinator::with_artifacts(store, ledger, artifacts);

    let api_server = ApiServer::new(Arc::new(coordinator));
    let addr = settings.bind_address();
    info!("API server starting at http://{}", addr);
    api_server
        .run(&addr)
        .await
        .with_context(|| format!("server on {} failed", addr))
}

/// Connects the ledger client, or returns `None` to run database-only.
async fn connect_ledger(settings: &LedgerSettings) -> Option<Arc<dyn LedgerClient>> {
    let Some(config) = settings.ledger_config() else {
        warn!(
            "Ledger disabled, missing: {}",
            settings.missing().join(", ")
        );
        return None;
    };
    match EthLedgerClient::connect(&config).await {
        Ok(client) => {
            info!(
                "Ledger enabled: account {} contract {}",
                client.account(),
                client.contract()
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            warn!("Ledger disabled, could not initialise client: {}", e);
            None
        }
    }
}
