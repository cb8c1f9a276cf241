//! Configuration loading and config file resolution
//!
//! The catalog reads a single TOML file. Every section has compiled
//! defaults, so a missing file at the default location still starts a
//! working (empty) catalog.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "AICAT_CONFIG";

/// Config file looked up in the working directory when nothing else is given
pub const DEFAULT_CONFIG_FILE: &str = "config.toml";

/// Complete catalog configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub connectors: ConnectorsConfig,
    pub linking: LinkRules,
    pub logging: LoggingConfig,
}

/// `[database]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string: `sqlite://<server-dir>/<database>`
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://./data/aiod".to_string(),
        }
    }
}

/// `[server]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Prefix prepended to every route (e.g. "/api")
    pub url_prefix: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5730,
            url_prefix: String::new(),
        }
    }
}

/// `[connectors]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectorsConfig {
    pub openml_base_url: String,
    pub huggingface_base_url: String,
    /// Per-request timeout for upstream registries
    pub timeout_secs: u64,
}

impl Default for ConnectorsConfig {
    fn default() -> Self {
        Self {
            openml_base_url: "https://www.openml.org/api/v1/json".to_string(),
            huggingface_base_url: "https://datasets-server.huggingface.co".to_string(),
            timeout_secs: 30,
        }
    }
}

/// `[logging]` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[linking]` section: curated rules that relate freshly fetched
/// publications to freshly fetched datasets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkRules {
    /// Node the benchmark identifiers belong to
    pub benchmark_node: String,
    /// Publication title linked to every benchmark dataset in a batch
    pub benchmark_title: String,
    /// Node-specific identifiers forming the benchmark set
    pub benchmark_identifiers: Vec<i64>,
    /// Publications linked to datasets by exact name
    pub companions: Vec<CompanionRule>,
}

/// Links a publication (by exact title) to datasets of one node with an exact name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanionRule {
    pub title: String,
    pub node: String,
    pub dataset_name: String,
}

/// OpenML ids of the AutoML benchmark suite
#[rustfmt::skip]
const AMLB_DATASET_IDS: [i64; 71] = [
    181, 1111, 1596, 1457, 40981, 40983, 23517, 1489, 31, 40982, 41138, 41163, 41164, 41143,
    1169, 41167, 41147, 41158, 1487, 54, 41144, 41145, 41156, 41157, 41168, 4541, 1515, 188,
    1464, 1494, 1468, 1049, 23, 40975, 12, 1067, 40984, 40670, 3, 40978, 4134, 40701, 1475,
    4538, 4534, 41146, 41142, 40498, 40900, 40996, 40668, 4135, 1486, 41027, 1461, 1590, 41169,
    41166, 41165, 40685, 41159, 41161, 41150, 41162, 42733, 42734, 42732, 42746, 42742, 42769,
    43072,
];

impl Default for LinkRules {
    fn default() -> Self {
        Self {
            benchmark_node: "openml".to_string(),
            benchmark_title: "AMLB: an AutoML Benchmark".to_string(),
            benchmark_identifiers: AMLB_DATASET_IDS.to_vec(),
            companions: vec![CompanionRule {
                title: "Searching for exotic particles in high-energy physics with deep learning"
                    .to_string(),
                node: "openml".to_string(),
                dataset_name: "Higgs".to_string(),
            }],
        }
    }
}

impl CatalogConfig {
    /// Resolve and load the configuration.
    ///
    /// Priority order:
    /// 1. Command-line argument (highest priority)
    /// 2. `AICAT_CONFIG` environment variable
    /// 3. `./config.toml` when present
    /// 4. Compiled defaults
    ///
    /// A file named explicitly (1 or 2) must exist and parse.
    pub fn resolve(cli_arg: Option<&Path>) -> Result<Self> {
        if let Some(path) = cli_arg {
            return Self::from_file(path);
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }

        let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::from_file(&default_path);
        }

        warn!("No config file found, using compiled defaults");
        Ok(Self::default())
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Read config {} failed: {}", path.display(), e))
        })?;
        let config = Self::from_toml_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
    }
}
