// src/config.rs
//! Layered service configuration.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. Optional config file (`config/default.*`, or `CREDENTIAL_ANCHOR_CONFIG`)
//! 3. `CREDENTIAL_ANCHOR__<SECTION>__<KEY>` environment variables
//! 4. `INFURA_URL`, `CONTRACT_ADDRESS`, `PRIVATE_KEY` for the ledger bundle
//!
//! `.env` is loaded by `main` before any of this runs.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const ENV_PREFIX: &str = "CREDENTIAL_ANCHOR";
const CONFIG_PATH_VAR: &str = "CREDENTIAL_ANCHOR_CONFIG";

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub storage: StorageSettings,
    pub ledger: LedgerSettings,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone)]
pub struct StorageSettings {
    /// JSON file backing the record store; in-memory when unset
    pub records_path: Option<PathBuf>,
    /// Directory rendered certificates are written to
    pub artifact_dir: PathBuf,
}

/// Raw ledger section. Turned into a [`LedgerConfig`] only when complete.
#[derive(Deserialize, Debug, Clone)]
pub struct LedgerSettings {
    pub endpoint: Option<String>,
    pub contract_address: Option<String>,
    pub private_key: Option<String>,
    pub abi_path: Option<PathBuf>,
    pub chain_id: Option<u64>,
    pub min_balance_eth: String,
    pub gas_margin: u64,
    pub confirmation_timeout_secs: u64,
    pub poll_interval_ms: u64,
}

/// Everything needed to build a ledger client.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub endpoint: String,
    pub contract_address: String,
    pub private_key: String,
    pub abi_path: Option<PathBuf>,
    pub chain_id: Option<u64>,
    /// Minimum balance, in ether, below which anchoring is refused
    pub min_balance_eth: String,
    /// Gas added on top of the estimate
    pub gas_margin: u64,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
}

impl Settings {
    /// Loads settings from defaults, the optional config file and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| "config/default".to_string());

        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("storage.artifact_dir", "certificates")?
            .set_default("ledger.min_balance_eth", "0.001")?
            .set_default("ledger.gas_margin", 10_000)?
            .set_default("ledger.confirmation_timeout_secs", 120)?
            .set_default("ledger.poll_interval_ms", 2_000)?
            .add_source(File::with_name(&file).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .set_override_option("ledger.endpoint", std::env::var("INFURA_URL").ok())?
            .set_override_option("ledger.contract_address", std::env::var("CONTRACT_ADDRESS").ok())?
            .set_override_option("ledger.private_key", std::env::var("PRIVATE_KEY").ok())?
            .build()?
            .try_deserialize()
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl LedgerSettings {
    /// Names of the required ledger settings that are missing or blank.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            ("INFURA_URL", &self.endpoint),
            ("CONTRACT_ADDRESS", &self.contract_address),
            ("PRIVATE_KEY", &self.private_key),
        ]
        .into_iter()
        .filter(|(_, v)| v.as_deref().map_or(true, |s| s.trim().is_empty()))
        .map(|(name, _)| name)
        .collect()
    }

    /// The complete ledger bundle, or `None` when the ledger is disabled.
    pub fn ledger_config(&self) -> Option<LedgerConfig> {
        match (&self.endpoint, &self.contract_address, &self.private_key) {
            (Some(endpoint), Some(contract_address), Some(private_key)) if self.missing().is_empty() => {
                Some(LedgerConfig {
                    endpoint: endpoint.trim().to_string(),
                    contract_address: contract_address.trim().to_string(),
                    private_key: private_key.trim().to_string(),
                    abi_path: self.abi_path.clone(),
                    chain_id: self.chain_id,
                    min_balance_eth: self.min_balance_eth.clone(),
                    gas_margin: self.gas_margin,
                    confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
                    poll_interval: Duration::from_millis(self.poll_interval_ms),
                })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger(endpoint: Option<&str>, contract: Option<&str>, key: Option<&str>) -> LedgerSettings {
        LedgerSettings {
            endpoint: endpoint.map(String::from),
            contract_address: contract.map(String::from),
            private_key: key.map(String::from),
            abi_path: None,
            chain_id: Some(11155111),
            min_balance_eth: "0.001".into(),
            gas_margin: 10_000,
            confirmation_timeout_secs: 120,
            poll_interval_ms: 2_000,
        }
    }

    #[test]
    fn test_incomplete_ledger_is_disabled() {
        let settings = ledger(Some("https://sepolia.example"), None, Some("00"));
        assert!(settings.ledger_config().is_none());
        assert_eq!(settings.missing(), vec!["CONTRACT_ADDRESS"]);

        let blank = ledger(Some("  "), Some("0x1"), Some("00"));
        assert!(blank.ledger_config().is_none());
        assert_eq!(blank.missing(), vec!["INFURA_URL"]);
    }

    #[test]
    fn test_complete_ledger_builds_bundle() {
        let settings = ledger(Some(" https://sepolia.example "), Some("0x1"), Some("00"));
        let config = settings.ledger_config().unwrap();
        assert_eq!(config.endpoint, "https://sepolia.example");
        assert_eq!(config.confirmation_timeout, Duration::from_secs(120));
        assert_eq!(config.poll_interval, Duration::from_millis(2_000));
        assert_eq!(config.chain_id, Some(11155111));
    }
}
