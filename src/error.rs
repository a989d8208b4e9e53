//! Error types for Skiff.
//!
//! Uses `thiserror` for ergonomic error definitions. Each concern gets its
//! own enum so callers can tell fatal setup errors from per-port noise.

use crate::types::{PortError, TargetError};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single connect attempt.
///
/// Never surfaced past the prober: every variant is classified as a closed
/// port.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("connection timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("unreachable: {0}")]
    Unreachable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the service table.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("failed to open service table '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read service table: {0}")]
    Read(#[from] csv::Error),

    #[error("malformed service table row {line}: expected 3 fields, found {found}")]
    MissingFields { line: u64, found: usize },

    #[error("malformed service table row {line}: invalid port '{value}'")]
    InvalidPort { line: u64, value: String },
}

/// Errors raised by result sinks.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration errors, all rejected before a scan starts.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid ports: {0}")]
    InvalidPorts(#[from] PortError),

    #[error("invalid target: {0}")]
    InvalidTarget(#[from] TargetError),

    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("timeout must be greater than zero")]
    ZeroTimeout,

    #[error("no protocols selected")]
    NoProtocols,

    #[error("could not determine configuration directory")]
    DirectoryNotFound,

    #[error("failed to read settings from {path}: {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    #[error("failed to write settings to {path}: {reason}")]
    WriteFailed { path: PathBuf, reason: String },

    #[error("invalid settings format: {0}")]
    InvalidFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Engine-level failures of the scheduler itself.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("invalid scan session: {0}")]
    Config(#[from] ConfigError),

    #[error("scan dispatcher failed: {0}")]
    Dispatcher(#[from] tokio::task::JoinError),
}

/// Top-level error returned by command handlers.
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for service table loading.
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Result type alias for sink operations.
pub type SinkResult<T> = Result<T, SinkError>;

/// Result type alias for configuration handling.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type alias for scan operations.
pub type ScanResult<T> = Result<T, ScanError>;

/// Result type alias for command handlers.
pub type CliResult<T> = Result<T, CliError>;
