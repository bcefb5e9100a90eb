//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. TRACKSYNC_CONFIG environment variable
//! 3. Default: config/dev.toml
//!
//! API credentials may be left empty in the file and supplied through the
//! TRACKSYNC_EMAIL / TRACKSYNC_PASSWORD environment variables instead, so
//! they stay out of version control. Missing credentials or a missing remap
//! table are fatal before the run starts.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_client_id")]
    pub client_id: u32,
    #[serde(default = "default_product_id")]
    pub product_id: u32,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    /// Series values requested from the API; series 3 is additionally
    /// filtered out locally.
    #[serde(default = "default_series_filter")]
    pub series_filter: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
    /// Pages fetched concurrently after page 0
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_base_url() -> String {
    "https://utilities.confirmafacil.com.br".to_string()
}

fn default_client_id() -> u32 {
    206
}

fn default_product_id() -> u32 {
    1
}

fn default_page_size() -> u32 {
    1000
}

fn default_series_filter() -> String {
    "1,4".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_secs() -> u64 {
    1
}

fn default_max_concurrency() -> usize {
    10
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            email: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            product_id: default_product_id(),
            page_size: default_page_size(),
            series_filter: default_series_filter(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            backoff_secs: default_backoff_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    /// Window size on the first run, before any watermark exists
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_watermark_file")]
    pub watermark_file: String,
}

fn default_lookback_days() -> i64 {
    15
}

fn default_watermark_file() -> String {
    "out/last_run.txt".to_string()
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_lookback_days(),
            watermark_file: default_watermark_file(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_file")]
    pub file: String,
}

fn default_store_file() -> String {
    "out/shipments.jsonl".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { file: default_store_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemapConfig {
    #[serde(default = "default_remap_file")]
    pub file: String,
}

fn default_remap_file() -> String {
    "data/carriers.toml".to_string()
}

impl Default for RemapConfig {
    fn default() -> Self {
        Self { file: default_remap_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublishConfig {
    #[serde(default = "default_publish_file")]
    pub file: String,
}

fn default_publish_file() -> String {
    "out/status.csv".to_string()
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self { file: default_publish_file() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub remap: RemapConfig,
    #[serde(default)]
    pub publish: PublishConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    api: ApiConfig,
    window: WindowConfig,
    store_file: String,
    remap_file: String,
    publish_file: String,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            window: WindowConfig::default(),
            store_file: default_store_file(),
            remap_file: default_remap_file(),
            publish_file: default_publish_file(),
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file; credentials fall back to the
    /// environment. Does not validate - call `validate` before running.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let mut api = toml_config.api;
        if api.email.is_empty() {
            if let Ok(email) = env::var("TRACKSYNC_EMAIL") {
                api.email = email;
            }
        }
        if api.password.is_empty() {
            if let Ok(password) = env::var("TRACKSYNC_PASSWORD") {
                api.password = password;
            }
        }

        Ok(Self {
            api,
            window: toml_config.window,
            store_file: toml_config.store.file,
            remap_file: toml_config.remap.file,
            publish_file: toml_config.publish.file,
            config_file: path.display().to_string(),
        })
    }

    /// Startup validation: anything wrong here aborts before the first
    /// network request or persistent write.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api.base_url.trim().is_empty() {
            bail!("api.base_url must not be empty");
        }
        if self.api.email.is_empty() || self.api.password.is_empty() {
            bail!(
                "API credentials missing: set api.email/api.password in {} \
                 or the TRACKSYNC_EMAIL/TRACKSYNC_PASSWORD environment variables",
                self.config_file
            );
        }
        if self.window.lookback_days <= 0 {
            bail!("window.lookback_days must be positive");
        }
        if self.api.max_concurrency == 0 {
            bail!("api.max_concurrency must be at least 1");
        }
        if !Path::new(&self.remap_file).exists() {
            bail!("carrier remap table not found at {}", self.remap_file);
        }
        Ok(())
    }

    // Getters for all config fields
    pub fn api_base_url(&self) -> &str {
        &self.api.base_url
    }

    pub fn api_email(&self) -> &str {
        &self.api.email
    }

    pub fn api_password(&self) -> &str {
        &self.api.password
    }

    pub fn api_client_id(&self) -> u32 {
        self.api.client_id
    }

    pub fn api_product_id(&self) -> u32 {
        self.api.product_id
    }

    pub fn api_page_size(&self) -> u32 {
        self.api.page_size
    }

    pub fn api_series_filter(&self) -> &str {
        &self.api.series_filter
    }

    pub fn api_timeout_secs(&self) -> u64 {
        self.api.timeout_secs
    }

    pub fn api_max_retries(&self) -> u32 {
        self.api.max_retries
    }

    pub fn api_backoff_secs(&self) -> u64 {
        self.api.backoff_secs
    }

    pub fn api_max_concurrency(&self) -> usize {
        self.api.max_concurrency
    }

    pub fn lookback_days(&self) -> i64 {
        self.window.lookback_days
    }

    pub fn set_lookback_days(&mut self, days: i64) {
        self.window.lookback_days = days;
    }

    pub fn watermark_file(&self) -> &str {
        &self.window.watermark_file
    }

    pub fn store_file(&self) -> &str {
        &self.store_file
    }

    pub fn remap_file(&self) -> &str {
        &self.remap_file
    }

    pub fn publish_file(&self) -> &str {
        &self.publish_file
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }
}
