//! # Notary Configuration
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. [`NotaryConfig::default`]
//! 2. JSON file named by `NOTARY_CONFIG`
//! 3. `NOTARY_NAME`, `NOTARY_KEY_SEED`, `NOTARY_REPLICA_ID`
//!
//! The result is validated before anything starts.

use nc_03_notary_consensus::{ConsensusConfigError, ConsensusMode};
use serde::{Deserialize, Serialize};
use shared_crypto::{derive_seed, KeyPair};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

pub const ENV_CONFIG_PATH: &str = "NOTARY_CONFIG";
pub const ENV_NAME: &str = "NOTARY_NAME";
pub const ENV_KEY_SEED: &str = "NOTARY_KEY_SEED";
pub const ENV_REPLICA_ID: &str = "NOTARY_REPLICA_ID";

const DEV_KEY_CONTEXT: &str = "notary.node.development-key.v1";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Environment variable {var}={value:?} is invalid: {reason}")]
    InvalidEnv {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("Notary name must not be empty")]
    EmptyName,

    #[error("Key seed must be 32 bytes of hex: {0}")]
    InvalidKeySeed(String),

    #[error("NOTARY_REPLICA_ID is set but the notary is not in replicated mode")]
    ReplicaIdWithoutCluster,

    #[error("Invalid consensus configuration: {0}")]
    Consensus(#[from] ConsensusConfigError),
}

/// Ledger storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// RocksDB directory. The ledger is kept in memory when unset or when
    /// the node is built without the `rocksdb` feature.
    pub data_dir: Option<PathBuf>,
    pub sync_writes: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            sync_writes: true,
        }
    }
}

/// Complete notary node configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotaryConfig {
    /// Legal name of the notary identity.
    pub notary_name: String,
    /// Hex ed25519 seed of the notary key. A key derived from the name is
    /// used when absent, which is only suitable for development.
    pub key_seed_hex: Option<String>,
    /// Resolve dependencies and verify contracts before committing.
    pub validating: bool,
    pub mode: ConsensusMode,
    /// Address the node is reachable at, for logs.
    pub notary_node_address: Option<String>,
    pub storage: StorageConfig,
    /// How long a flow waits for the request once a session opens.
    pub receive_timeout_secs: u64,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            notary_name: "O=Notary Service, L=Zurich, C=CH".to_string(),
            key_seed_hex: None,
            validating: false,
            mode: ConsensusMode::SingleAuthority,
            notary_node_address: None,
            storage: StorageConfig::default(),
            receive_timeout_secs: 30,
        }
    }
}

impl NotaryConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|var| std::env::var(var).ok())
    }

    /// Load using `env` to look up environment variables.
    pub fn load_from(env: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match env(ENV_CONFIG_PATH) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!(path = %path.display(), "Loaded configuration file");
        Ok(config)
    }

    fn apply_env(&mut self, env: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(name) = env(ENV_NAME) {
            self.notary_name = name;
        }
        if let Some(seed) = env(ENV_KEY_SEED) {
            self.key_seed_hex = Some(seed);
        }
        if let Some(value) = env(ENV_REPLICA_ID) {
            let replica_id = value.trim().parse::<i32>().map_err(|e| ConfigError::InvalidEnv {
                var: ENV_REPLICA_ID,
                value: value.clone(),
                reason: e.to_string(),
            })?;
            match &mut self.mode {
                ConsensusMode::ReplicatedCluster(cluster) => cluster.replica_id = replica_id,
                ConsensusMode::SingleAuthority => return Err(ConfigError::ReplicaIdWithoutCluster),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notary_name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if let Some(seed) = &self.key_seed_hex {
            decode_seed(seed)?;
        }
        self.mode.validate()?;
        Ok(())
    }

    /// The notary's signing key.
    pub fn keypair(&self) -> Result<KeyPair, ConfigError> {
        match &self.key_seed_hex {
            Some(seed) => Ok(KeyPair::from_seed(decode_seed(seed)?)),
            None => {
                warn!(
                    notary = %self.notary_name,
                    "No key seed configured; using a development key"
                );
                Ok(KeyPair::from_seed(derive_seed(
                    DEV_KEY_CONTEXT,
                    self.notary_name.as_bytes(),
                )))
            }
        }
    }

    pub fn receive_timeout(&self) -> Duration {
        Duration::from_secs(self.receive_timeout_secs)
    }
}

fn decode_seed(seed: &str) -> Result<[u8; 32], ConfigError> {
    let bytes = hex::decode(seed.trim()).map_err(|e| ConfigError::InvalidKeySeed(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|b: Vec<u8>| ConfigError::InvalidKeySeed(format!("{} bytes", b.len())))
}
