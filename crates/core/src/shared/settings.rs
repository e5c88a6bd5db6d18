use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alphabet::domain::alphabet_transcoder::Notation;
use crate::shared::constants::{
    DEFAULT_CALL_TIMEOUT_MS, DEFAULT_CONCURRENCY, DEFAULT_ENDPOINT, DEFAULT_QUEUE_TIMEOUT_MS,
    DEFAULT_SYSTEM,
};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("failed to read settings from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings in {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("call timeout must be greater than 0 ms")]
    ZeroTimeout,
    #[error("queue timeout must be greater than 0 ms")]
    ZeroQueueTimeout,
}

/// Analyzer and display configuration.
///
/// Every field has a default, so a settings file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub system: String,
    pub endpoint: String,
    pub concurrency: usize,
    pub call_timeout_ms: u64,
    /// How long a call may wait for a non-reentrant analyzer busy with
    /// other calls.
    pub queue_timeout_ms: u64,
    pub analyzer_reentrant: bool,
    pub alphabet: Notation,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            call_timeout_ms: DEFAULT_CALL_TIMEOUT_MS,
            queue_timeout_ms: DEFAULT_QUEUE_TIMEOUT_MS,
            analyzer_reentrant: false,
            alphabet: Notation::Ipa,
        }
    }
}

impl Settings {
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("phl-viewer").join("settings.json"))
    }

    /// Loads the per-user settings file, falling back to defaults when it is
    /// absent or unreadable.
    pub fn load() -> Self {
        Self::config_path()
            .and_then(|path| fs::read_to_string(path).ok())
            .and_then(|json| serde_json::from_str(&json).ok())
            .unwrap_or_default()
    }

    /// Loads an explicitly named settings file. Unlike [`Settings::load`],
    /// a missing or malformed file is an error.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let json = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&json).map_err(|e| SettingsError::Malformed {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.concurrency == 0 {
            return Err(SettingsError::ZeroConcurrency);
        }
        if self.call_timeout_ms == 0 {
            return Err(SettingsError::ZeroTimeout);
        }
        if self.queue_timeout_ms == 0 {
            return Err(SettingsError::ZeroQueueTimeout);
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn queue_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_timeout_ms)
    }
}
