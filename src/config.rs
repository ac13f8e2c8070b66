//! `config.toml` handling and store construction.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::store::github::{DEFAULT_API_BASE_URL, is_valid_branch};
use crate::store::{
    BlobStore, FileStore, GitHubStore, MemoryStore, RetryingStore, StoreError, TableStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    File,
    GitHub,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: Backend,
    /// Directory holding the tables for the file backend.
    pub dir: String,
    /// `owner/name` of the repository for the GitHub backend.
    pub repo: Option<String>,
    pub branch: String,
    /// Environment variable holding the GitHub token.
    pub token_env: String,
    pub api_base_url: String,
    pub trips_path: String,
    pub fuelings_path: String,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: Backend::File,
            dir: "data".to_string(),
            repo: None,
            branch: "main".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            trips_path: "driving_log.csv".to_string(),
            fuelings_path: "fuel_log.csv".to_string(),
            max_retries: 3,
            retry_base_delay_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name recorded as the author of new trips.
    pub user: String,
    pub store: StoreConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: "LocalUser".to_string(),
            store: StoreConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    MissingConfig(String),
    InvalidConfig(String),
    MissingToken(String),
    Store(StoreError),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingConfig(path) => write!(f, "{path} file not found"),
            ConfigError::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            ConfigError::MissingToken(var) => {
                write!(f, "environment variable {var} with the GitHub token is not set")
            }
            ConfigError::Store(e) => write!(f, "cannot open store: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl Config {
    pub fn from_toml(input: &str) -> Result<Self, ConfigError> {
        let cfg: Config =
            toml::from_str(input).map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::MissingConfig(path.display().to_string()))?;
        Self::from_toml(&data)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.user.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("user must not be empty".into()));
        }
        if self.store.backend == Backend::GitHub
            && self.store.repo.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::InvalidConfig(
                "store.repo is required for the github backend".into(),
            ));
        }
        if self.store.backend == Backend::GitHub && !is_valid_branch(&self.store.branch) {
            return Err(ConfigError::InvalidConfig(format!(
                "store.branch {:?} is not a valid branch name",
                self.store.branch
            )));
        }
        Ok(())
    }

    /// Builds the configured backend, wrapped with retries.
    pub fn open_store(&self) -> Result<TableStore<Box<dyn BlobStore>>, ConfigError> {
        let cfg = &self.store;
        let delay = Duration::from_millis(cfg.retry_base_delay_ms);
        let backend: Box<dyn BlobStore> = match cfg.backend {
            Backend::File => Box::new(RetryingStore::new(
                FileStore::new(&cfg.dir),
                cfg.max_retries,
                delay,
            )),
            Backend::GitHub => {
                let token = std::env::var(&cfg.token_env)
                    .map_err(|_| ConfigError::MissingToken(cfg.token_env.clone()))?;
                let repo = cfg.repo.clone().unwrap_or_default();
                let store =
                    GitHubStore::with_api_base_url(repo, &cfg.branch, token, &cfg.api_base_url)
                        .map_err(ConfigError::Store)?;
                Box::new(RetryingStore::new(store, cfg.max_retries, delay))
            }
            Backend::Memory => Box::new(MemoryStore::new()),
        };
        Ok(TableStore::new(backend, &cfg.trips_path, &cfg.fuelings_path))
    }
}
