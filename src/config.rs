use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TattleError};
use crate::relay::CHUNK_SIZE;
use crate::telemetry::ExporterSettings;

pub const DEFAULT_COLLECTOR_URL: &str = "http://localhost:3000/";

/// Tattle configuration, loaded from ~/.config/tattle/config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TattleConfig {
    /// Where batches are posted.
    pub collector_url: String,
    /// Where session open/close announcements are posted, if anywhere.
    pub session_url: Option<String>,
    pub debounce_ms: u64,
    pub chunk_size: usize,
    pub request_timeout_ms: u64,
    pub flush_on_exit: bool,
    /// How long teardown waits for the exporter's last delivery.
    pub shutdown_grace_ms: u64,
    pub shell: Option<String>,
    pub log_file: Option<PathBuf>,
}

impl Default for TattleConfig {
    fn default() -> Self {
        Self {
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            session_url: None,
            debounce_ms: 1000,
            chunk_size: CHUNK_SIZE,
            request_timeout_ms: 5000,
            flush_on_exit: true,
            shutdown_grace_ms: 2000,
            shell: None,
            log_file: None,
        }
    }
}

impl TattleConfig {
    /// Load config from `path`. A missing file yields defaults; a file that
    /// cannot be read or parsed is an error so the caller can report it once
    /// logging is up.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| {
            TattleError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            TattleError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Save config to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.collector_url.trim().is_empty() {
            return Err(TattleError::Config("collector_url is empty".into()));
        }
        if self.chunk_size == 0 {
            return Err(TattleError::Config("chunk_size must be positive".into()));
        }
        Ok(())
    }

    pub fn exporter_settings(&self) -> ExporterSettings {
        ExporterSettings {
            debounce: Duration::from_millis(self.debounce_ms),
            flush_on_exit: self.flush_on_exit,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    /// Log destination: the configured file or the default under the cache dir.
    pub fn log_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(default_log_path)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("tattle")
        .join("config.json")
}

fn default_log_path() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tattle")
        .join("tattle.log")
}
