//! Configuration for the freshness checker

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{FreshnessError, Result};

/// Placeholder substituted with a location id in `api_url`.
pub const ID_PLACEHOLDER: &str = "{id}";

/// Largest accepted freshness window, about a century
pub const MAX_DAYS_AGO: u32 = 36_500;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // Measurements API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    // Classification
    #[serde(default = "default_days_ago")]
    pub days_ago: u32,

    // Inputs
    #[serde(default = "default_source_folder")]
    pub source_folder: PathBuf,
    #[serde(default = "default_adapters_ids_file")]
    pub adapters_ids_file: PathBuf,
    pub reviewed_resources_file: Option<PathBuf>,

    // Ledgers
    #[serde(default = "default_outdate_file")]
    pub outdate_file: PathBuf,
    #[serde(default = "default_update_file")]
    pub update_file: PathBuf,

    // Adapters excluded from checking and reconciliation
    #[serde(default)]
    pub skip_adapters: Vec<String>,

    // HTTP
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,
    #[serde(default)]
    pub max_retries: u32,
    pub rate_limit_rpm: Option<u32>,
}

fn default_api_url() -> String {
    "https://u50g7n0cbj.execute-api.us-east-1.amazonaws.com/v2/measurements?location={id}"
        .to_string()
}

fn default_days_ago() -> u32 {
    15
}

fn default_source_folder() -> PathBuf {
    PathBuf::from("/openaq-fetch/sources")
}

fn default_adapters_ids_file() -> PathBuf {
    PathBuf::from("/mnt/data/adapters_id.csv")
}

fn default_outdate_file() -> PathBuf {
    PathBuf::from("/mnt/data/adapters_outdate.csv")
}

fn default_update_file() -> PathBuf {
    PathBuf::from("/mnt/data/adapters_update.csv")
}

fn default_max_concurrent_requests() -> usize {
    10
}

fn default_request_timeout() -> String {
    "20s".to_string()
}

fn default_connect_timeout() -> String {
    "10s".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            days_ago: default_days_ago(),
            source_folder: default_source_folder(),
            adapters_ids_file: default_adapters_ids_file(),
            reviewed_resources_file: None,
            outdate_file: default_outdate_file(),
            update_file: default_update_file(),
            skip_adapters: Vec::new(),
            max_concurrent_requests: default_max_concurrent_requests(),
            request_timeout: default_request_timeout(),
            connect_timeout: default_connect_timeout(),
            max_retries: 0,
            rate_limit_rpm: None,
        }
    }
}

impl Config {
    /// Loads configuration from `FRESHNESS_*` environment variables (and `.env`)
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::with_prefix("FRESHNESS")
                    .prefix_separator("_")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("skip_adapters"),
            )
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        if !self.api_url.contains(ID_PLACEHOLDER) {
            return Err(FreshnessError::InvalidConfig(format!(
                "api_url must contain the {} placeholder: {}",
                ID_PLACEHOLDER, self.api_url
            )));
        }

        url::Url::parse(&self.api_url.replace(ID_PLACEHOLDER, "0")).map_err(|e| {
            FreshnessError::InvalidConfig(format!("api_url is not a valid URL: {}", e))
        })?;

        if self.days_ago > MAX_DAYS_AGO {
            return Err(FreshnessError::InvalidConfig(format!(
                "days_ago must be at most {}, got {}",
                MAX_DAYS_AGO, self.days_ago
            )));
        }

        if self.max_concurrent_requests == 0 {
            return Err(FreshnessError::InvalidConfig(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }

        if self.rate_limit_rpm == Some(0) {
            return Err(FreshnessError::InvalidConfig(
                "rate_limit_rpm must be at least 1 when set".to_string(),
            ));
        }

        self.request_timeout()?;
        self.connect_timeout()?;

        Ok(())
    }

    /// Per-request timeout
    pub fn request_timeout(&self) -> Result<Duration> {
        parse_duration("request_timeout", &self.request_timeout)
    }

    /// TCP connect timeout
    pub fn connect_timeout(&self) -> Result<Duration> {
        parse_duration("connect_timeout", &self.connect_timeout)
    }

    /// Where stale rows accumulate between reconciliations: `<outdate stem>-tmp.csv`
    pub fn outdate_accumulator_file(&self) -> PathBuf {
        accumulator_path(&self.outdate_file)
    }
}

fn parse_duration(field: &str, value: &str) -> Result<Duration> {
    humantime::parse_duration(value)
        .map_err(|e| FreshnessError::InvalidConfig(format!("{} {:?}: {}", field, value, e)))
}

fn accumulator_path(outdate_file: &Path) -> PathBuf {
    let stem = outdate_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    outdate_file.with_file_name(format!("{}-tmp.csv", stem))
}
