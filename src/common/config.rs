use crate::common::constants;
use crate::common::error::{CatalogError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub blob_store: BlobStoreConfig,
    pub publisher: PublisherConfig,
    pub pipeline: PipelineSettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    Filesystem,
    Http,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BlobStoreConfig {
    pub backend: BlobBackend,
    pub root: PathBuf,
    pub endpoint: Option<String>,
    pub bucket: Option<String>,
    pub public_base_url: Option<String>,
    pub prefix: Option<String>,
    /// Only ever read from `BDP_BLOB_STORE_KEY`
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for BlobStoreConfig {
    fn default() -> Self {
        Self {
            backend: BlobBackend::Filesystem,
            root: PathBuf::from(constants::DEFAULT_BLOB_ROOT),
            endpoint: None,
            bucket: None,
            public_base_url: None,
            prefix: None,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PublisherConfig {
    pub endpoint: String,
    pub timeout_seconds: u64,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://openspending.org/api/3/loader/".to_string(),
            timeout_seconds: 60,
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    pub auto_upload: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self { auto_upload: true }
    }
}

impl Config {
    /// Loads `bdp_catalog.toml` from the working directory, falling back to defaults
    /// when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new(constants::DEFAULT_CONFIG_PATH))
    }

    pub fn load_from(config_path: &Path) -> Result<Self> {
        let _ = dotenv::dotenv();

        let mut config = if config_path.exists() {
            let config_content = fs::read_to_string(config_path).map_err(|e| {
                CatalogError::Config(format!(
                    "Failed to read config file '{}': {}",
                    config_path.display(),
                    e
                ))
            })?;
            Self::from_toml_str(&config_content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("BDP_BLOB_STORE_ROOT") {
            self.blob_store.root = PathBuf::from(root);
        }
        if let Ok(endpoint) = std::env::var("BDP_BLOB_STORE_ENDPOINT") {
            self.blob_store.endpoint = Some(endpoint);
        }
        if let Ok(endpoint) = std::env::var("BDP_PUBLISHER_ENDPOINT") {
            self.publisher.endpoint = endpoint;
        }
        self.blob_store.api_key = std::env::var("BDP_BLOB_STORE_KEY").ok();
        self.publisher.api_key = std::env::var("BDP_OPENSPENDING_API_KEY").ok();
    }

    pub fn validate(&self) -> Result<()> {
        if self.blob_store.backend == BlobBackend::Http {
            if self.blob_store.endpoint.is_none() {
                return Err(CatalogError::Config(
                    "blob_store.endpoint is required for the http backend".to_string(),
                ));
            }
            if self.blob_store.bucket.is_none() {
                return Err(CatalogError::Config(
                    "blob_store.bucket is required for the http backend".to_string(),
                ));
            }
        }
        if self.publisher.endpoint.trim().is_empty() {
            return Err(CatalogError::Config(
                "publisher.endpoint must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
