//! Configuration management for Ledgerchain

use crate::amount::Amount;
use crate::blockchain::Allocation;
use crate::crypto::Address;
use crate::error::ChainError;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NodeConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub validator: ValidatorConfig,
    #[serde(default)]
    pub genesis: GenesisConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidatorConfig {
    /// Time between production cycles, e.g. `"2s"` or `"500ms"`.
    #[serde(default = "default_interval")]
    pub interval: String,
    #[serde(default)]
    pub autostart: bool,
    /// Label stamped into every produced block.
    #[serde(default = "default_producer")]
    pub producer: String,
    /// Address credited with `reward` for every produced block.
    #[serde(default)]
    pub reward_address: Option<String>,
    #[serde(default = "default_reward")]
    pub reward: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenesisConfig {
    #[serde(default)]
    pub allocations: Vec<AllocationConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllocationConfig {
    pub address: String,
    pub amount: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            autostart: false,
            producer: default_producer(),
            reward_address: None,
            reward: default_reward(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl ValidatorConfig {
    pub fn interval(&self) -> Result<Duration, ChainError> {
        let interval = humantime::parse_duration(self.interval.trim()).map_err(|e| {
            ChainError::Config(format!("validator.interval '{}': {}", self.interval, e))
        })?;
        if interval.is_zero() {
            return Err(ChainError::Config(
                "validator.interval must be greater than zero".to_string(),
            ));
        }
        Ok(interval)
    }

    /// The per-block reward, if one is configured.
    pub fn block_reward(&self) -> Result<Option<Allocation>, ChainError> {
        let amount: Amount = self.reward.parse().map_err(|e| {
            ChainError::Config(format!("validator.reward '{}': {}", self.reward, e))
        })?;
        match &self.reward_address {
            Some(address) => {
                let address = Address::from_hex(address).map_err(|e| {
                    ChainError::Config(format!("validator.reward_address '{}': {}", address, e))
                })?;
                Ok((!amount.is_zero()).then_some(Allocation { address, amount }))
            }
            None if amount.is_zero() => Ok(None),
            None => Err(ChainError::Config(
                "validator.reward requires validator.reward_address".to_string(),
            )),
        }
    }
}

impl GenesisConfig {
    pub fn allocations(&self) -> Result<Vec<Allocation>, ChainError> {
        self.allocations
            .iter()
            .map(|a| {
                let address = Address::from_hex(&a.address).map_err(|e| {
                    ChainError::Config(format!("genesis address '{}': {}", a.address, e))
                })?;
                let amount: Amount = a.amount.parse().map_err(|e| {
                    ChainError::Config(format!("genesis amount '{}': {}", a.amount, e))
                })?;
                Ok(Allocation { address, amount })
            })
            .collect()
    }
}

impl LoggingConfig {
    pub fn level(&self) -> Result<tracing::Level, ChainError> {
        self.level
            .parse()
            .map_err(|_| ChainError::Config(format!("Unknown log level '{}'", self.level)))
    }
}

impl NodeConfig {
    /// Checks every value that is parsed lazily elsewhere.
    pub fn validate(&self) -> Result<(), ChainError> {
        self.validator.interval()?;
        self.validator.block_reward()?;
        self.genesis.allocations()?;
        self.logging.level()?;
        if self.validator.producer.is_empty() {
            return Err(ChainError::Config(
                "validator.producer must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Loads `path`, falling back to defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<NodeConfig, ChainError> {
    let config: NodeConfig = match fs::read_to_string(path) {
        Ok(config_str) => toml::from_str(&config_str)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => NodeConfig::default(),
        Err(e) => return Err(e.into()),
    };

    config.validate()?;
    Ok(config)
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_interval() -> String {
    "2s".to_string()
}

fn default_producer() -> String {
    "local-validator".to_string()
}

fn default_reward() -> String {
    "0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.api.port, 8080);
        assert_eq!(config.validator.interval().unwrap(), Duration::from_secs(2));
        assert!(!config.validator.autostart);
        assert!(config.genesis.allocations().unwrap().is_empty());
        assert_eq!(config.validator.block_reward().unwrap(), None);
    }

    #[test]
    fn test_full_file() {
        let address = "ab".repeat(32);
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[api]
port = 9000

[validator]
interval = "250ms"
autostart = true
producer = "node-a"
reward_address = "{address}"
reward = "2.5"

[[genesis.allocations]]
address = "{address}"
amount = "100.5"

[logging]
level = "debug"
"#
        )
        .unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.api.port, 9000);
        assert_eq!(config.api.host, "127.0.0.1");
        assert_eq!(config.validator.interval().unwrap(), Duration::from_millis(250));
        assert!(config.validator.autostart);
        assert_eq!(config.validator.producer, "node-a");
        assert_eq!(config.logging.level().unwrap(), tracing::Level::DEBUG);

        let reward = config.validator.block_reward().unwrap().unwrap();
        assert_eq!(reward.address.to_hex(), address);
        assert_eq!(reward.amount, Amount::from_units(250_000_000));

        let allocations = config.genesis.allocations().unwrap();
        assert_eq!(allocations.len(), 1);
        assert_eq!(allocations[0].amount, Amount::from_units(10_050_000_000));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut zero = tempfile::NamedTempFile::new().unwrap();
        write!(zero, "[validator]\ninterval = \"0s\"\n").unwrap();
        assert!(matches!(load_config(zero.path()), Err(ChainError::Config(_))));

        let mut bad_address = tempfile::NamedTempFile::new().unwrap();
        write!(
            bad_address,
            "[[genesis.allocations]]\naddress = \"xyz\"\namount = \"1\"\n"
        )
        .unwrap();
        assert!(load_config(bad_address.path()).is_err());

        let mut orphan_reward = tempfile::NamedTempFile::new().unwrap();
        write!(orphan_reward, "[validator]\nreward = \"1\"\n").unwrap();
        assert!(matches!(load_config(orphan_reward.path()), Err(ChainError::Config(_))));

        let mut bad_toml = tempfile::NamedTempFile::new().unwrap();
        write!(bad_toml, "[api\nport = ").unwrap();
        assert!(matches!(load_config(bad_toml.path()), Err(ChainError::Config(_))));
    }
}
