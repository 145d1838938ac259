// src/blockchain/eth_client.rs
//! EVM ledger client.
//!
//! Anchors credential fingerprints in the `CertificateRegistry` contract on
//! any EVM JSON-RPC endpoint, signing with a local key.

use crate::blockchain::ledger_client::{
    AnchorOutcome, AnchorReceipt, LedgerClient, LedgerError, LedgerVerification,
};
use crate::config::LedgerConfig;
use crate::contracts::certificate_registry::CertificateRegistry;
use crate::models::credential::CredentialFingerprint;
use async_trait::async_trait;
use chrono::DateTime;
use ethers::contract::ContractCall;
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, U256, U64};
use ethers::utils::{format_ether, parse_ether, to_checksum};
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Duration;

/// Provider with a local signing wallet.
pub type SignerClient = SignerMiddleware<Provider<Http>, LocalWallet>;

/// Ledger client backed by an EVM JSON-RPC endpoint.
///
/// Holds no mutable state: concurrent anchors are serialized by the
/// provider's nonce handling, not here.
pub struct EthLedgerClient {
    client: Arc<SignerClient>,
    registry: CertificateRegistry<SignerClient>,
    /// Signing account address
    address: Address,
    min_balance: U256,
    gas_margin: U256,
    confirmation_timeout: Duration,
}

impl EthLedgerClient {
    /// Creates a client from a complete ledger bundle.
    ///
    /// Only contacts the endpoint when `chain_id` is not configured.
    ///
    /// # Errors
    /// Returns error if:
    /// - The endpoint URL, contract address or private key is malformed
    /// - The ABI file cannot be read
    /// - The chain ID must be fetched and the endpoint is unreachable
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let provider = Provider::<Http>::try_from(config.endpoint.as_str())
            .map_err(|e| LedgerError::Config(format!("invalid endpoint {}: {}", config.endpoint, e)))?
            .interval(config.poll_interval);

        let chain_id = match config.chain_id {
            Some(id) => id,
            None => provider
                .get_chainid()
                .await
                .map_err(|e| LedgerError::Provider(e.to_string()))?
                .as_u64(),
        };

        let wallet: LocalWallet = config
            .private_key
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid private key: {}", e)))?;
        let wallet = wallet.with_chain_id(chain_id);
        let address = wallet.address();

        let contract_address: Address = config
            .contract_address
            .parse()
            .map_err(|e| LedgerError::Config(format!("invalid contract address: {}", e)))?;

        let abi = match &config.abi_path {
            Some(path) => CertificateRegistry::<SignerClient>::load_abi(path).await?,
            None => CertificateRegistry::<SignerClient>::embedded_abi()?,
        };

        let min_balance = parse_ether(&config.min_balance_eth)
            .map_err(|e| LedgerError::Config(format!("invalid min_balance_eth: {}", e)))?;

        let client = Arc::new(SignerMiddleware::new(provider, wallet));
        let registry = CertificateRegistry::new(client.clone(), contract_address, abi);

        info!("Ledger account: {}", to_checksum(&address, None));
        info!("Ledger contract: {}", to_checksum(&contract_address, None));

        Ok(Self {
            client,
            registry,
            address,
            min_balance,
            gas_margin: U256::from(config.gas_margin),
            confirmation_timeout: config.confirmation_timeout,
        })
    }

    /// Runs the pre-flight checks and builds the gas-priced anchor call.
    ///
    /// Nothing is submitted: an unreachable ledger or a balance below the
    /// configured minimum ends the attempt here.
    async fn prepare_anchor(
        &self,
        fingerprint: &CredentialFingerprint,
        student_id: &str,
    ) -> Result<ContractCall<SignerClient, ()>, LedgerError> {
        if !self.is_connected().await {
            return Err(LedgerError::Disconnected);
        }

        let balance = self
            .client
            .get_balance(self.address, None)
            .await
            .map_err(|e| LedgerError::Provider(e.to_string()))?;
        if balance < self.min_balance {
            return Err(LedgerError::InsufficientFunds {
                balance: format_ether(balance),
                required: format_ether(self.min_balance),
            });
        }

        let call = self
            .registry
            .store_certificate(fingerprint.as_str(), student_id)?
            .from(self.address);
        let estimate = call
            .estimate_gas()
            .await
            .map_err(|e| LedgerError::Contract(e.to_string()))?;
        let gas_price = self
            .client
            .get_gas_price()
            .await
            .map_err(|e| LedgerError::Provider(e.to_string()))?;
        Ok(call.gas(estimate + self.gas_margin).gas_price(gas_price))
    }

    async fn try_anchor(
        &self,
        fingerprint: &CredentialFingerprint,
        student_id: &str,
    ) -> Result<AnchorReceipt, LedgerError> {
        let call = self.prepare_anchor(fingerprint, student_id).await?;

        let pending = call
            .send()
            .await
            .map_err(|e| LedgerError::Contract(e.to_string()))?;
        let tx_hash = format!("0x{:x}", pending.tx_hash());
        info!("Transaction sent: {}", tx_hash);
        debug!("Waiting up to {:?} for confirmation", self.confirmation_timeout);

        let receipt = match tokio::time::timeout(self.confirmation_timeout, pending).await {
            Err(_) => {
                return Err(LedgerError::ConfirmationTimeout {
                    tx_hash,
                    secs: self.confirmation_timeout.as_secs(),
                })
            }
            Ok(Err(e)) => return Err(LedgerError::Provider(format!("{}: {}", tx_hash, e))),
            Ok(Ok(None)) => return Err(LedgerError::Dropped { tx_hash }),
            Ok(Ok(Some(receipt))) => receipt,
        };

        if receipt.status != Some(U64::from(1)) {
            return Err(LedgerError::Reverted { tx_hash });
        }

        let block_number = receipt.block_number.map(|b| b.as_u64()).unwrap_or_default();
        info!("Transaction confirmed in block {}", block_number);
        Ok(AnchorReceipt {
            tx_hash,
            block_number,
            cost: receipt.gas_used.map(|g| g.low_u64()).unwrap_or_default(),
        })
    }
}

#[async_trait]
impl LedgerClient for EthLedgerClient {
    async fn is_connected(&self) -> bool {
        self.client.get_block_number().await.is_ok()
    }

    async fn balance(&self) -> Result<String, LedgerError> {
        self.client
            .get_balance(self.address, None)
            .await
            .map(format_ether)
            .map_err(|e| LedgerError::Provider(e.to_string()))
    }

    async fn anchor(&self, fingerprint: &CredentialFingerprint, student_id: &str) -> AnchorOutcome {
        match self.try_anchor(fingerprint, student_id).await {
            Ok(receipt) => AnchorOutcome::Confirmed(receipt),
            Err(e) => {
                warn!("Ledger anchoring of {} failed: {}", fingerprint.short(), e);
                AnchorOutcome::Failed(e.into_failure())
            }
        }
    }

    async fn verify(&self, fingerprint: &CredentialFingerprint) -> LedgerVerification {
        match self.registry.verify_certificate(fingerprint.as_str()).await {
            Ok((true, student_id, timestamp)) => LedgerVerification::Found {
                student_id,
                anchored_at: i64::try_from(timestamp.low_u64())
                    .ok()
                    .and_then(|secs| DateTime::from_timestamp(secs, 0)),
            },
            Ok((false, _, _)) => LedgerVerification::NotFound,
            Err(e) => {
                warn!("Ledger verification of {} failed: {}", fingerprint.short(), e);
                LedgerVerification::Unreachable {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn total_anchored(&self) -> Result<u64, LedgerError> {
        self.registry.total_certificates().await.map(|n| n.low_u64())
    }

    fn account(&self) -> String {
        to_checksum(&self.address, None)
    }

    fn contract(&self) -> String {
        to_checksum(&self.registry.address(), None)
    }
}
