use anyhow::{anyhow, Context, Result};
use std::{path::PathBuf, time::Duration};

use crate::sync::looks_gzipped;

const DEFAULT_CADENCE_SECS: u64 = 14400; // 4 hours
const DEFAULT_STATUS_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub data_dir: PathBuf,
    pub scenes_url: String,
    pub scenes_gzip: bool,
    pub cadence: Duration,
    pub bind_addr: String,
    pub status_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Config::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{} must be set", key));

        let scenes_url = required("SCENES_CSV_URL")?;
        let scenes_gzip = match lookup("SCENES_CSV_GZIP") {
            Some(value) => value
                .parse()
                .with_context(|| format!("SCENES_CSV_GZIP must be true or false, got {}", value))?,
            None => looks_gzipped(&scenes_url),
        };

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(value) => value
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a number of seconds, got {}", key, value)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let bind_host = lookup("BROKER_HOST").unwrap_or("0.0.0.0".to_string());
        let bind_port = lookup("PORT").unwrap_or("8080".to_string());

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            data_dir: PathBuf::from(required("DATA_DIR")?),
            scenes_url,
            scenes_gzip,
            cadence: seconds("INGEST_CADENCE_SECS", DEFAULT_CADENCE_SECS)?,
            bind_addr: format!("{}:{}", bind_host, bind_port),
            status_timeout: seconds("STATUS_TIMEOUT_SECS", DEFAULT_STATUS_TIMEOUT_SECS)?,
        })
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.data_dir.join("cache")
    }
}
