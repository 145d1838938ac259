// src/contracts/certificate_registry.rs
//! Certificate Registry smart contract interface.
//!
//! Typed wrapper over the `CertificateRegistry` contract that stores
//! credential fingerprints on-chain. Supports anchoring, existence checks
//! and counting.

use crate::blockchain::ledger_client::LedgerError;
use ethers::abi::Abi;
use ethers::contract::{Contract, ContractCall};
use ethers::providers::Middleware;
use ethers::types::{Address, U256};
use std::path::Path;
use std::sync::Arc;

const EMBEDDED_ABI: &[u8] = include_bytes!("abi/CertificateRegistry.json");

/// Certificate Registry smart contract wrapper.
///
/// # Type Parameters
/// * `M` - Middleware the contract is bound to (a signer for writes)
pub struct CertificateRegistry<M> {
    /// Underlying contract instance
    contract: Contract<M>,
}

impl<M> CertificateRegistry<M>
where
    M: Middleware + 'static,
{
    /// Binds the registry at `address` to `client`.
    pub fn new(client: Arc<M>, address: Address, abi: Abi) -> Self {
        CertificateRegistry {
            contract: Contract::new(address, abi, client),
        }
    }

    /// ABI compiled into the binary.
    pub fn embedded_abi() -> Result<Abi, LedgerError> {
        Abi::load(EMBEDDED_ABI).map_err(|e| LedgerError::Config(format!("embedded ABI: {}", e)))
    }

    /// Loads an ABI from a JSON file, for registries deployed with a
    /// different interface revision.
    pub async fn load_abi(path: &Path) -> Result<Abi, LedgerError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| LedgerError::Config(format!("reading ABI {}: {}", path.display(), e)))?;
        Abi::load(bytes.as_slice())
            .map_err(|e| LedgerError::Config(format!("parsing ABI {}: {}", path.display(), e)))
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    /// Builds (but does not send) a `storeCertificate` transaction.
    pub fn store_certificate(
        &self,
        certificate_hash: &str,
        student_id: &str,
    ) -> Result<ContractCall<M, ()>, LedgerError> {
        self.contract
            .method::<_, ()>(
                "storeCertificate",
                (certificate_hash.to_string(), student_id.to_string()),
            )
            .map_err(|e| LedgerError::Contract(e.to_string()))
    }

    /// Calls the `verifyCertificate` view.
    ///
    /// # Returns
    /// `(exists, student_id, unix_timestamp)`
    pub async fn verify_certificate(
        &self,
        certificate_hash: &str,
    ) -> Result<(bool, String, U256), LedgerError> {
        self.contract
            .method::<_, (bool, String, U256)>("verifyCertificate", certificate_hash.to_string())
            .map_err(|e| LedgerError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(|e| LedgerError::Provider(e.to_string()))
    }

    /// Calls the `getTotalCertificates` view.
    pub async fn total_certificates(&self) -> Result<U256, LedgerError> {
        self.contract
            .method::<_, U256>("getTotalCertificates", ())
            .map_err(|e| LedgerError::Contract(e.to_string()))?
            .call()
            .await
            .map_err(|e| LedgerError::Provider(e.to_string()))
    }
}
