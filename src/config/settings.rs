//! Application settings and paths.
//!
//! Settings live in `settings.json` under the XDG config directory
//! (`~/.config/skiff` on Linux). A missing file means built-in defaults.

use crate::error::{ConfigError, ConfigResult};
use crate::output::OutputFormat;
use crate::scanner::{DEFAULT_CONCURRENCY, DEFAULT_TIMEOUT};
use crate::types::{PortRange, ProtocolSelection};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Application directory paths following the XDG Base Directory Specification.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Configuration directory (~/.config/skiff)
    pub config_dir: PathBuf,
}

impl Paths {
    /// Locate the XDG directories for this user.
    pub fn resolve() -> ConfigResult<Self> {
        let project =
            ProjectDirs::from("com", "skiff", "skiff").ok_or(ConfigError::DirectoryNotFound)?;

        Ok(Self {
            config_dir: project.config_dir().to_path_buf(),
        })
    }

    /// Get the path to the settings file.
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }
}

/// Application-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Host scanned when none is given.
    pub default_host: String,
    /// Port range scanned when none is given.
    pub default_ports: PortRange,
    /// Protocols scanned when none are given.
    pub default_protocol: ProtocolSelection,
    /// Probes in flight at once.
    pub default_concurrency: usize,
    /// Per-probe timeout in milliseconds.
    pub default_timeout_ms: u64,
    /// Probe starts per second, 0 for unlimited.
    pub default_rate_limit: u32,
    /// Console output format.
    pub default_output_format: OutputFormat,
    /// CSV table of `protocol,port,service` rows.
    pub services_file: PathBuf,
    /// Append-only result log.
    pub log_file: PathBuf,
    /// Write open ports to the log file.
    pub log_results: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            default_host: "example.com".to_string(),
            default_ports: PortRange::default(),
            default_protocol: ProtocolSelection::Both,
            default_concurrency: DEFAULT_CONCURRENCY,
            default_timeout_ms: DEFAULT_TIMEOUT.as_millis() as u64,
            default_rate_limit: 0,
            default_output_format: OutputFormat::Plain,
            services_file: PathBuf::from("all.csv"),
            log_file: PathBuf::from("logging.txt"),
            log_results: true,
        }
    }
}

impl AppSettings {
    /// Load settings from the default location, falling back to defaults.
    pub fn load() -> ConfigResult<Self> {
        let file = Paths::resolve()?.settings_file();

        if !file.exists() {
            debug!(path = %file.display(), "no settings file, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&file)
    }

    /// Load settings from a specific file.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let settings: Self =
            serde_json::from_str(&content).map_err(|e| ConfigError::InvalidFormat(e.to_string()))?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    /// Save settings to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| ConfigError::WriteFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Per-probe timeout as a `Duration`.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}
