//! Settings for the in-container tools, read from the process environment.
//!
//! The container is started with the host's env file, so credentials and
//! tuning knobs arrive as plain environment variables.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{StoreError, WatcherError};

pub const DEFAULT_WATCH_DIR: &str = "/app";
pub const SENTINEL_NAME: &str = ".done";
pub const DEFAULT_POLL: Duration = Duration::from_millis(500);
pub const DEFAULT_DRAIN_SECS: u64 = 2;
/// Retrieval URLs stay valid for three hours.
pub const DEFAULT_PRESIGN_TTL_SECS: u64 = 3 * 60 * 60;

#[derive(Debug, Clone)]
pub struct WatcherConfig {
    pub watch_dir: PathBuf,
    pub sentinel: String,
    pub poll_interval: Duration,
    pub drain_window: Duration,
    pub presign_ttl: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from(DEFAULT_WATCH_DIR),
            sentinel: SENTINEL_NAME.to_string(),
            poll_interval: DEFAULT_POLL,
            drain_window: Duration::from_secs(DEFAULT_DRAIN_SECS),
            presign_ttl: Duration::from_secs(DEFAULT_PRESIGN_TTL_SECS),
        }
    }
}

impl WatcherConfig {
    pub fn from_env() -> Result<Self, WatcherError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source. Unset or empty variables
    /// fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, WatcherError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get("WATCH_DIR") {
            config.watch_dir = PathBuf::from(dir);
        }
        if let Some(v) = get("WATCHER_DRAIN_SECS") {
            config.drain_window = Duration::from_secs(parse_secs("WATCHER_DRAIN_SECS", &v)?);
        }
        if let Some(v) = get("PRESIGN_TTL_SECS") {
            let secs = parse_secs("PRESIGN_TTL_SECS", &v)?;
            // SigV4 caps presigned URLs at seven days.
            if secs == 0 || secs > 604_800 {
                return Err(WatcherError::InvalidSetting {
                    name: "PRESIGN_TTL_SECS",
                    value: v,
                });
            }
            config.presign_ttl = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.watch_dir.join(&self.sentinel)
    }
}

fn parse_secs(name: &'static str, value: &str) -> Result<u64, WatcherError> {
    value
        .trim()
        .parse()
        .map_err(|_| WatcherError::InvalidSetting {
            name,
            value: value.to_string(),
        })
}

/// Connection settings for the S3-compatible bucket.
#[derive(Clone)]
pub struct S3Config {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    pub bucket: String,
    /// Custom endpoint (MinIO, local tests). Switches to path-style URLs.
    pub endpoint: Option<String>,
}

impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("access_key", &self.access_key)
            .field("secret_key", &"***")
            .field("region", &self.region)
            .field("bucket", &self.bucket)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl S3Config {
    pub fn from_env() -> Result<Self, StoreError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, StoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let required = |name: &'static str| get(name).ok_or(StoreError::MissingSetting(name));

        Ok(Self {
            access_key: required("AWS_ACCESS_KEY")?,
            secret_key: required("AWS_SECRET_ACCESS_KEY")?,
            region: get("AWS_DEFAULT_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            bucket: required("AWS_S3_BUCKET_NAME")?,
            endpoint: get("AWS_S3_ENDPOINT"),
        })
    }
}
