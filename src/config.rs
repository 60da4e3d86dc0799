//! Node configuration: consensus constants plus the handful of knobs the
//! CLI and tests need to override. Deserializable from the JSON config
//! file `zether-node` accepts on startup.

use crate::types::AssetId;
use serde::{Deserialize, Serialize};

fn default_block_max_size() -> u64 {
    8 * 1024 * 1024
}

fn default_transactions_max_data_length() -> u64 {
    1 << 16
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_block_max_size")]
    pub block_max_size: u64,

    #[serde(default = "default_transactions_max_data_length")]
    pub transactions_max_data_length: u64,

    #[serde(default)]
    pub native_asset_full: AssetIdConfig,

    #[serde(default = "default_consensus_type")]
    pub consensus_type_full: String,

    #[serde(default)]
    pub faucet_testnet_enabled: bool,

    #[serde(default)]
    pub faucet_testnet_coins_units: u64,
}

fn default_consensus_type() -> String {
    "proof-of-stake".into()
}

/// Hex-encoded asset id, since raw `[u8; 32]` doesn't round-trip through
/// JSON the way humans want to read config files.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetIdConfig(pub String);

impl Default for AssetIdConfig {
    fn default() -> Self {
        AssetIdConfig(hex::encode([0u8; 32]))
    }
}

impl AssetIdConfig {
    pub fn to_asset_id(&self) -> Option<AssetId> {
        let bytes = hex::decode(&self.0).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut fixed = [0u8; 32];
        fixed.copy_from_slice(&bytes);
        Some(AssetId(fixed))
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            block_max_size: default_block_max_size(),
            transactions_max_data_length: default_transactions_max_data_length(),
            native_asset_full: AssetIdConfig::default(),
            consensus_type_full: default_consensus_type(),
            faucet_testnet_enabled: false,
            faucet_testnet_coins_units: 0,
        }
    }
}

impl Config {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(config.block_max_size, back.block_max_size);
    }

    #[test]
    fn asset_id_config_decodes_native() {
        let config = AssetIdConfig::default();
        assert_eq!(config.to_asset_id().unwrap(), crate::types::NATIVE_ASSET_FULL);
    }
}
