//! Configuration management for Emberchain

use crate::error::{ChainError, Result};
use serde::Deserialize;
use std::fs;

/// Consensus parameters. Nodes sharing these values produce byte-identical
/// genesis blocks and agree on every validity decision.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChainConfig {
    /// Number of leading zero characters the hex block hash must carry.
    #[serde(default = "default_difficulty")]
    pub difficulty: u32,
    /// Value minted to the miner of each block.
    #[serde(default = "default_mining_reward")]
    pub mining_reward: i64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: default_difficulty(),
            mining_reward: default_mining_reward(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub miner: MinerConfig,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Path of the persisted chain document.
    #[serde(default = "default_chain_file")]
    pub chain_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            chain_file: default_chain_file(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MinerConfig {
    #[serde(default)]
    pub beneficiary_address: String,
    #[serde(default)]
    pub enabled: bool,
}

fn default_difficulty() -> u32 {
    4
}

fn default_mining_reward() -> i64 {
    50
}

fn default_chain_file() -> String {
    "blockchain.json".to_string()
}

pub fn load_config() -> Result<NodeConfig> {
    let config_str = fs::read_to_string("config.toml").unwrap_or_default();
    let config: NodeConfig = if config_str.is_empty() {
        // Sane defaults when config.toml is absent
        NodeConfig {
            chain: ChainConfig::default(),
            storage: StorageConfig::default(),
            miner: MinerConfig::default(),
        }
    } else {
        toml::from_str(&config_str).map_err(|e| ChainError::Config(e.to_string()))?
    };

    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &NodeConfig) -> Result<()> {
    // A 64-char hex digest bounds the meaningful difficulty range.
    if config.chain.difficulty == 0 || config.chain.difficulty > 64 {
        return Err(ChainError::Config(format!(
            "chain.difficulty must be between 1 and 64, got {}",
            config.chain.difficulty
        )));
    }

    if config.chain.mining_reward < 0 {
        return Err(ChainError::Config(format!(
            "chain.mining_reward must be non-negative, got {}",
            config.chain.mining_reward
        )));
    }

    if config.storage.chain_file.is_empty() {
        return Err(ChainError::Config(
            "storage.chain_file must be set".to_string(),
        ));
    }

    if config.miner.enabled && config.miner.beneficiary_address.is_empty() {
        return Err(ChainError::Config(
            "miner.beneficiary_address must be set when mining is enabled".to_string(),
        ));
    }

    Ok(())
}
