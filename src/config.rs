use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::client::{ENA_SEARCH_URL, RetryPolicy};
use crate::domain::OutputFormat;
use crate::error::EnaError;
use crate::query::{DEFAULT_LIMIT, DEFAULT_STRATEGY};

pub const DEFAULT_CONFIG_FILE: &str = "enatrieve.json";

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub strategy: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub format: Option<OutputFormat>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub max_retries: Option<usize>,
    #[serde(default)]
    pub backoff_factor_secs: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub base_url: String,
    pub strategy: String,
    pub limit: u64,
    pub format: OutputFormat,
    pub retry: RetryPolicy,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// An explicit path must exist; otherwise the working directory and the
    /// user config directory are searched and defaults apply when neither has one.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, EnaError> {
        let config_path = match path {
            Some(path) => Some(PathBuf::from(path)),
            None => Self::discover(),
        };
        let Some(config_path) = config_path else {
            return Self::resolve_config(Config::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| EnaError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| EnaError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Some(local);
        }
        BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("enatrieve-tx").join("config.json"))
            .filter(|path| path.exists())
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, EnaError> {
        let defaults = RetryPolicy::default();

        let backoff_factor = match config.backoff_factor_secs {
            Some(secs) if secs.is_finite() && secs >= 0.0 => Duration::from_secs_f64(secs),
            Some(secs) => {
                return Err(EnaError::ConfigParse(format!(
                    "backoff_factor_secs must be a non-negative number, got {secs}"
                )));
            }
            None => defaults.backoff_factor,
        };
        let timeout = match config.timeout_secs {
            Some(0) => {
                return Err(EnaError::ConfigParse(
                    "timeout_secs must be greater than zero".to_string(),
                ));
            }
            Some(secs) => Duration::from_secs(secs),
            None => defaults.timeout,
        };

        Ok(ResolvedConfig {
            base_url: config
                .base_url
                .unwrap_or_else(|| ENA_SEARCH_URL.to_string()),
            strategy: config
                .strategy
                .unwrap_or_else(|| DEFAULT_STRATEGY.to_string()),
            limit: config.limit.unwrap_or(DEFAULT_LIMIT),
            format: config.format.unwrap_or_default(),
            retry: RetryPolicy {
                max_retries: config.max_retries.unwrap_or(defaults.max_retries),
                backoff_factor,
                retry_statuses: defaults.retry_statuses,
                timeout,
            },
        })
    }
}
