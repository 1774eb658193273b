//! Node configuration.
//!
//! Loaded from a TOML file; the binary applies CLI overrides on top.
//! Example:
//!
//! ```toml
//! [node]
//! data_dir = "./data"
//! key_seed = "<64 hex chars: the 32-byte Ed25519 seed>"
//! validators = ["<hex address>", "<hex address>"]
//!
//! [consensus]
//! network_id = "isaac-testnet"
//! block_time_ms = 5000
//! timeout_init_ms = 2000
//! timeout_sign_ms = 2000
//! timeout_accept_ms = 2000
//! ops_limit = 1000
//! common_account = "<hex address>"
//! initial_balance = 10000000000
//!
//! [metrics]
//! enabled = true
//! listen_addr = "0.0.0.0:9090"
//! ```

use isaac_consensus::IsaacConfig;
use isaac_types::{Address, KeyPair};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("key_seed must be 64 hex characters (32 bytes)")]
    InvalidKeySeed,
}

/// Top-level node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeConfig {
    pub node: NodeSection,
    pub consensus: ConsensusSection,
    #[serde(default)]
    pub metrics: MetricsSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NodeSection {
    /// Directory for the RocksDB database.
    pub data_dir: PathBuf,
    /// Hex-encoded 32-byte Ed25519 seed for the node keypair.
    pub key_seed: String,
    /// Addresses of all validators, including this node.
    pub validators: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConsensusSection {
    /// Network identifier mixed into every signature.
    pub network_id: String,
    #[serde(default = "default_block_time_ms")]
    pub block_time_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_init_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_sign_ms: u64,
    #[serde(default = "default_timeout_ms")]
    pub timeout_accept_ms: u64,
    #[serde(default = "default_ops_limit")]
    pub ops_limit: usize,
    /// Account receiving collected fees and inflation.
    pub common_account: String,
    /// Initial currency supply.
    pub initial_balance: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_metrics_addr")]
    pub listen_addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_addr: default_metrics_addr(),
        }
    }
}

fn default_block_time_ms() -> u64 {
    5000
}

fn default_timeout_ms() -> u64 {
    2000
}

fn default_ops_limit() -> usize {
    1000
}

fn default_true() -> bool {
    true
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

impl NodeConfig {
    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&raw)?)
    }

    /// The node keypair derived from `node.key_seed`.
    pub fn keypair(&self) -> Result<KeyPair, ConfigError> {
        let bytes = hex::decode(&self.node.key_seed).map_err(|_| ConfigError::InvalidKeySeed)?;
        let seed: [u8; 32] = bytes.try_into().map_err(|_| ConfigError::InvalidKeySeed)?;
        Ok(KeyPair::from_seed(&seed))
    }

    /// The validator set as addresses.
    pub fn validators(&self) -> Vec<Address> {
        self.node.validators.iter().map(Address::new).collect()
    }

    /// The consensus-layer view of this configuration.
    pub fn isaac(&self) -> IsaacConfig {
        IsaacConfig {
            network_id: self.consensus.network_id.as_bytes().to_vec(),
            block_time: Duration::from_millis(self.consensus.block_time_ms),
            timeout_init: Duration::from_millis(self.consensus.timeout_init_ms),
            timeout_sign: Duration::from_millis(self.consensus.timeout_sign_ms),
            timeout_accept: Duration::from_millis(self.consensus.timeout_accept_ms),
            ops_limit: self.consensus.ops_limit,
            common_account: Address::new(&self.consensus.common_account),
            initial_balance: self.consensus.initial_balance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [node]
        data_dir = "/tmp/isaac-test"
        key_seed = "0101010101010101010101010101010101010101010101010101010101010101"
        validators = ["aa", "bb"]

        [consensus]
        network_id = "isaac-testnet"
        timeout_sign_ms = 3000
        common_account = "cc"
        initial_balance = 10000000000
    "#;

    #[test]
    fn parse_with_defaults() {
        let config: NodeConfig = toml::from_str(SAMPLE).unwrap();

        assert_eq!(config.consensus.block_time_ms, 5000);
        assert_eq!(config.consensus.timeout_init_ms, 2000);
        assert_eq!(config.consensus.timeout_sign_ms, 3000);
        assert_eq!(config.consensus.ops_limit, 1000);
        assert!(config.metrics.enabled);

        let isaac = config.isaac();
        assert_eq!(isaac.block_time, Duration::from_secs(5));
        assert_eq!(isaac.timeout_sign, Duration::from_secs(3));
        assert_eq!(isaac.network_id, b"isaac-testnet".to_vec());
        assert_eq!(isaac.common_account, Address::new("cc"));
    }

    #[test]
    fn keypair_from_seed() {
        let config: NodeConfig = toml::from_str(SAMPLE).unwrap();
        let keypair = config.keypair().unwrap();
        assert_eq!(keypair.address(), KeyPair::from_seed(&[1; 32]).address());
    }

    #[test]
    fn bad_key_seed_is_rejected() {
        let mut config: NodeConfig = toml::from_str(SAMPLE).unwrap();
        config.node.key_seed = "zz".into();
        assert!(matches!(
            config.keypair(),
            Err(ConfigError::InvalidKeySeed)
        ));
    }
}
