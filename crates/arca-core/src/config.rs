use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ArcaError, ArcaResult};

/// Top-level configuration (loaded from arca.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArcaConfig {
    pub logging: LoggingConfig,
    pub key: KeyConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (default: info)
    pub level: String,
    /// Log format: "json" or "text"
    pub format: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Hand the stretched key (33 extra SHA-256 rounds) to decryption and
    /// derivation instead of the bare decoded secret (default: true)
    #[serde(default = "default_true")]
    pub stretch: bool,
    /// Length of derived service passwords (default: 32)
    pub password_length: usize,
    /// Word list file replacing the embedded English dictionary
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory of metadata snapshots, one file per transaction number
    pub meta_dir: PathBuf,
    /// Directory of block files keyed by block id
    pub block_dir: PathBuf,
    /// File name used for in-progress output before it is renamed into place
    pub temp_name: String,
    /// Blocks live under `<first 2 hex>/<remaining 38 hex>` (default: true)
    #[serde(default = "default_true")]
    pub sharded: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            format: "text".into(),
        }
    }
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            stretch: true,
            password_length: 32,
            dictionary: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            meta_dir: PathBuf::from("meta"),
            block_dir: PathBuf::from("data"),
            temp_name: ".tempfile".into(),
            sharded: true,
        }
    }
}

impl ArcaConfig {
    /// Parse a config from TOML text, validating the values serde cannot.
    pub fn from_toml(text: &str) -> ArcaResult<Self> {
        let config: ArcaConfig =
            toml::from_str(text).map_err(|e| ArcaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load(path: &Path) -> ArcaResult<Self> {
        if !path.exists() {
            tracing::warn!("config file not found: {}  (using defaults)", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
            .map_err(|e| ArcaError::Config(format!("{}: {e}", path.display())))
    }

    fn validate(&self) -> ArcaResult<()> {
        match self.logging.format.as_str() {
            "json" | "text" => {}
            other => {
                return Err(ArcaError::Config(format!(
                    "logging.format must be \"json\" or \"text\", got \"{other}\""
                )))
            }
        }
        if self.key.password_length == 0 {
            return Err(ArcaError::Config("key.password_length must be > 0".into()));
        }
        if self.store.temp_name.is_empty() || self.store.temp_name.contains('/') {
            return Err(ArcaError::Config(format!(
                "store.temp_name must be a plain file name, got \"{}\"",
                self.store.temp_name
            )));
        }
        Ok(())
    }
}
