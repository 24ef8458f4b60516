//! Node configuration
//!
//! Sources are layered lowest precedence first: built-in defaults, an
//! optional TOML file, then `PEERPAY__SECTION__KEY` environment variables.
//! Command line flags are applied on top by the binary.

use crate::{NodeError, NodeResult};
use peerpay_core::{Amount, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use peerpay_network::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PEERPAY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub network: NetworkConfig,
    pub storage: StorageConfig,
    pub mining: MiningConfig,
    pub logging: LoggingConfig,
}

impl NodeConfig {
    /// Load configuration from defaults, `path` (if given) and the environment
    pub fn load(path: Option<&Path>) -> NodeResult<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&NodeConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Toml)
                    .required(true),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: NodeConfig = builder.build()?.try_deserialize()?;
        config.validate().map_err(NodeError::Config)?;
        Ok(config)
    }

    /// Keep the ledger file and the identity under `dir`
    pub fn with_data_dir(mut self, dir: PathBuf) -> Self {
        self.network.keystore_path = dir.join("peer_key");
        self.storage.data_dir = dir;
        self
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.network.validate()?;
        self.storage.validate()?;
        self.mining.validate()?;
        self.logging.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ledger file
    pub data_dir: PathBuf,
    /// Ledger file name inside `data_dir`
    pub ledger_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            ledger_file: "ledger.json".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(&self.ledger_file)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.ledger_file.is_empty() {
            return Err("Ledger file name must not be empty".to_string());
        }
        Ok(())
    }
}

/// Chain parameters used when a fresh ledger is seeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiningConfig {
    pub difficulty: u64,
    pub reward: Amount,
}

impl Default for MiningConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            reward: DEFAULT_MINING_REWARD,
        }
    }
}

impl MiningConfig {
    pub fn with_difficulty(mut self, difficulty: u64) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.difficulty == 0 {
            return Err("Mining difficulty must be greater than 0".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    /// Emit JSON log lines
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn validate(&self) -> Result<(), String> {
        tracing_subscriber::EnvFilter::try_new(&self.level)
            .map(|_| ())
            .map_err(|e| format!("Invalid log level '{}': {}", self.level, e))
    }
}
