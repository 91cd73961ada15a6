//! Application configuration.
//!
//! Loaded from a JSON file (every field optional), then overridden by
//! environment variables:
//!
//! | Variable                 | Field                   |
//! |--------------------------|-------------------------|
//! | `DRAWX_DATA_DIR`         | `store.path`            |
//! | `DRAWX_BACKEND`          | `store.backend`         |
//! | `DRAWX_SYNC_WRITES`      | `store.sync_writes`     |
//! | `DRAWX_CONNECT_ATTEMPTS` | `retry.max_attempts`    |
//! | `DRAWX_SETTINGS`         | `settings_path`         |

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use drawx_render::RenderConfig;
use drawx_store::{BackendKind, RetryPolicy, StoreConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub retry: RetryPolicy,
    pub render: RenderConfig,
    /// Settings file; defaults to `settings.json` inside the store directory.
    pub settings_path: Option<PathBuf>,
}

impl AppConfig {
    /// In-memory store, fast retries, no periodic frame logging.
    pub fn for_testing() -> Self {
        Self {
            store: StoreConfig::memory(),
            retry: RetryPolicy::for_testing(),
            render: RenderConfig::for_testing(),
            settings_path: None,
        }
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.settings_path
            .clone()
            .unwrap_or_else(|| self.store.path.join("settings.json"))
    }

    /// Apply `DRAWX_*` variables from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(std::env::vars())
    }

    /// Apply `DRAWX_*` overrides from any list of variables.
    pub fn apply_vars<I, K, V>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            match key.as_ref() {
                "DRAWX_DATA_DIR" => self.store.path = PathBuf::from(value),
                "DRAWX_BACKEND" => {
                    self.store.backend = match value.to_ascii_lowercase().as_str() {
                        "memory" => BackendKind::Memory,
                        "file" => BackendKind::File,
                        "rocksdb" => BackendKind::RocksDb,
                        _ => return Err(invalid("DRAWX_BACKEND", value)),
                    }
                }
                "DRAWX_SYNC_WRITES" => {
                    self.store.sync_writes = match value.as_str() {
                        "1" | "true" | "yes" => true,
                        "0" | "false" | "no" => false,
                        _ => return Err(invalid("DRAWX_SYNC_WRITES", value.clone())),
                    }
                }
                "DRAWX_CONNECT_ATTEMPTS" => {
                    self.retry.max_attempts = value
                        .parse()
                        .map_err(|_| invalid("DRAWX_CONNECT_ATTEMPTS", value.clone()))?;
                }
                "DRAWX_SETTINGS" => self.settings_path = Some(PathBuf::from(value)),
                _ => {}
            }
        }
        Ok(())
    }
}

fn invalid(var: &'static str, value: String) -> ConfigError {
    ConfigError::InvalidEnv { var, value }
}
