//! registry-log configuration.
//!
//! Each setting resolves through a chain, first hit wins:
//!
//! 1. command-line flag
//! 2. `REGISTRY_LOG_*` environment variable
//! 3. `~/.registry-log/config.toml` (or the file passed with `--config`)
//! 4. built-in default
//!
//! A missing default config file is fine; a missing explicit one is an error.

use std::{env, fs, path::Path, path::PathBuf};

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::eventlog::DEFAULT_BLOCK_SIZE;
use crate::goodbye::GoodbyeOptions;
use crate::stats::DEFAULT_SESSION_THRESHOLD;

const ENV_SESSION_THRESHOLD: &str = "REGISTRY_LOG_SESSION_THRESHOLD_SECS";
const ENV_BLOCK_SIZE: &str = "REGISTRY_LOG_BLOCK_SIZE";
const ENV_STAGING_DIR: &str = "REGISTRY_LOG_STAGING_DIR";

/// Pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Maximum distance from a session's first download, in seconds.
    pub session_threshold_secs: i64,

    /// Bytes per block when reading logs backward.
    pub block_size: usize,

    /// Where the goodbye pass stages its reversed copy.
    /// The system temp dir when unset.
    pub staging_dir: Option<PathBuf>,

    /// Fail when a merge producer goes back in time.
    pub verify_source_order: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            session_threshold_secs: DEFAULT_SESSION_THRESHOLD.as_secs(),
            block_size: DEFAULT_BLOCK_SIZE,
            staging_dir: None,
            verify_source_order: true,
        }
    }
}

impl Config {
    /// Load from `explicit`, or from the default path when it exists,
    /// then apply environment overrides.
    ///
    /// Not validated: command-line flags still apply on top, so callers
    /// run [`Config::validate`] once those are in.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::read(path)?,
            None => match Self::path() {
                Some(path) if path.exists() => Self::read(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_overrides(|key| env::var(key).ok().filter(|v| !v.is_empty()))?;
        Ok(config)
    }

    /// The default config file path: `~/.registry-log/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".registry-log").join("config.toml"))
    }

    fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfiguration(format!("failed to read {}: {e}", path.display()))
        })?;
        toml::from_str(&contents).map_err(|e| {
            Error::InvalidConfiguration(format!("invalid config at {}: {e}", path.display()))
        })
    }

    /// Apply overrides from `lookup` (the process environment in practice).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup(ENV_SESSION_THRESHOLD) {
            self.session_threshold_secs = parse_env(ENV_SESSION_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_BLOCK_SIZE) {
            self.block_size = parse_env(ENV_BLOCK_SIZE, &v)?;
        }
        if let Some(v) = lookup(ENV_STAGING_DIR) {
            self.staging_dir = Some(PathBuf::from(v));
        }
        Ok(())
    }

    /// Reject settings no run could use.
    pub fn validate(&self) -> Result<()> {
        if self.session_threshold_secs <= 0 {
            return Err(Error::InvalidConfiguration(format!(
                "session-threshold-secs must be positive, got {}",
                self.session_threshold_secs
            )));
        }
        if self.block_size == 0 {
            return Err(Error::InvalidConfiguration(
                "block-size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_threshold(&self) -> SignedDuration {
        SignedDuration::from_secs(self.session_threshold_secs)
    }

    pub fn goodbye_options(&self) -> GoodbyeOptions {
        GoodbyeOptions {
            block_size: self.block_size,
            staging_dir: self.staging_dir.clone(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::InvalidConfiguration(format!("{key}={value:?}: {e}")))
}
