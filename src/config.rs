use log::LevelFilter;
use std::path::PathBuf;
use std::time::Duration;

const STORE_VAR: &str = "OTPDECK_STORE";
const STATUS_VAR: &str = "OTPDECK_STATUS_SECS";
const LOG_VAR: &str = "OTPDECK_LOG";

const DEF_STORE_PATH: &str = "saved";
const DEF_STATUS_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}

/// Startup settings, read once and passed down explicitly.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Where the key file lives.
    pub store_path: PathBuf,
    /// How long status messages stay visible.
    pub status_ttl: Duration,
    pub log_level: LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            store_path: PathBuf::from(DEF_STORE_PATH),
            status_ttl: Duration::from_secs(DEF_STATUS_SECS),
            log_level: LevelFilter::Info,
        }
    }
}

impl Config {
    /// Read the process environment, after loading `.env` if there is one.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(path) = get(STORE_VAR).filter(|p| !p.trim().is_empty()) {
            config.store_path = PathBuf::from(path);
        }

        if let Some(value) = get(STATUS_VAR) {
            let secs = value.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: STATUS_VAR,
                value: value.clone(),
            })?;
            config.status_ttl = Duration::from_secs(secs);
        }

        if let Some(value) = get(LOG_VAR) {
            config.log_level = value.trim().parse().map_err(|_| ConfigError::Invalid {
                key: LOG_VAR,
                value: value.clone(),
            })?;
        }

        Ok(config)
    }
}
