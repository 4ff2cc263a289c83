//! # Config - RecoStore runtime configuration
//!
//! All settings come from environment variables with sensible defaults:
//!
//! ```text
//! RECO_INPUT_PATH     unsorted input file          (default: "recommends.csv")
//! RECO_SORTED_PATH    sorted store file            (default: "result.csv")
//! RECO_INDEX_PATH     index file                   (default: "index.csv")
//! RECO_CHUNK_RECORDS  records per in-memory chunk  (default: 6000000)
//! RECO_MERGE_FAN_IN   runs merged per pass         (default: 256)
//! RECO_LISTEN_ADDR    HTTP listen address          (default: "127.0.0.1:8080")
//! ```
//!
//! A value that fails to parse falls back to its default with a warning, so a
//! typo never prevents startup; [`Config::validate`] then rejects values that
//! parse but make no sense (a zero chunk size, a fan-in below 2).

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::str::FromStr;

pub const ENV_INPUT_PATH: &str = "RECO_INPUT_PATH";
pub const ENV_SORTED_PATH: &str = "RECO_SORTED_PATH";
pub const ENV_INDEX_PATH: &str = "RECO_INDEX_PATH";
pub const ENV_CHUNK_RECORDS: &str = "RECO_CHUNK_RECORDS";
pub const ENV_MERGE_FAN_IN: &str = "RECO_MERGE_FAN_IN";
pub const ENV_LISTEN_ADDR: &str = "RECO_LISTEN_ADDR";

pub const DEFAULT_INPUT_PATH: &str = "recommends.csv";
pub const DEFAULT_SORTED_PATH: &str = "result.csv";
pub const DEFAULT_INDEX_PATH: &str = "index.csv";
pub const DEFAULT_CHUNK_RECORDS: usize = 6_000_000;
pub const DEFAULT_MERGE_FAN_IN: usize = 256;
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";

/// Paths and tuning knobs shared by the build pipeline and the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub input_path: PathBuf,
    pub sorted_path: PathBuf,
    pub index_path: PathBuf,
    /// Maximum number of records sorted in memory at once.
    pub chunk_records: usize,
    /// Maximum number of runs open during one merge pass.
    pub merge_fan_in: usize,
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_PATH),
            sorted_path: PathBuf::from(DEFAULT_SORTED_PATH),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            chunk_records: DEFAULT_CHUNK_RECORDS,
            merge_fan_in: DEFAULT_MERGE_FAN_IN,
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
        }
    }
}

/// Reads a configuration value from the environment, falling back to `default`.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Parses `key` from the environment, using `default` when it is unset or
/// unparsable.
fn env_parse<T: FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                log::warn!("ignoring invalid {}={:?}, using {}", key, raw, default);
                default
            }
        },
        Err(_) => default,
    }
}

impl Config {
    /// Builds a configuration from `RECO_*` environment variables.
    pub fn from_env() -> Self {
        Self {
            input_path: PathBuf::from(env_or(ENV_INPUT_PATH, DEFAULT_INPUT_PATH)),
            sorted_path: PathBuf::from(env_or(ENV_SORTED_PATH, DEFAULT_SORTED_PATH)),
            index_path: PathBuf::from(env_or(ENV_INDEX_PATH, DEFAULT_INDEX_PATH)),
            chunk_records: env_parse(ENV_CHUNK_RECORDS, DEFAULT_CHUNK_RECORDS),
            merge_fan_in: env_parse(ENV_MERGE_FAN_IN, DEFAULT_MERGE_FAN_IN),
            listen_addr: env_or(ENV_LISTEN_ADDR, DEFAULT_LISTEN_ADDR),
        }
    }

    /// Rejects settings the build pipeline cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_records == 0 {
            bail!("{} must be at least 1", ENV_CHUNK_RECORDS);
        }
        if self.merge_fan_in < 2 {
            bail!("{} must be at least 2, got {}", ENV_MERGE_FAN_IN, self.merge_fan_in);
        }
        if self.sorted_path == self.index_path {
            bail!("sorted file and index file must be different paths");
        }
        if self.input_path == self.sorted_path || self.input_path == self.index_path {
            bail!("input file must not be overwritten by build outputs");
        }
        Ok(())
    }
}
