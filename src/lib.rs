//! # Skiff - A Concurrent TCP/UDP Reachability Probe
//!
//! Skiff probes every port of a range on one host over TCP and/or UDP,
//! names each open port from a service table and reports it to the
//! terminal and an append-only log.
//!
//! ## Features
//!
//! - **Bounded Concurrency**: A fixed pool of in-flight probes with optional rate limiting
//! - **Cancellation**: Stop dispatching on demand, in-flight probes drain within their timeout
//! - **Service Names**: CSV service table with a built-in fallback
//! - **Result Log**: `Scan Time:` header followed by one line per open port
//! - **Multiple Output Formats**: Plain text, JSON, and CSV
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use skiff::scanner::{ScanScheduler, ScanSession, SocketProber};
//! use skiff::services::ServiceCatalog;
//! use skiff::sink::MemorySink;
//! use skiff::types::{PortRange, ScanTarget};
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let target = ScanTarget::resolve("127.0.0.1").await.unwrap();
//!     let session = ScanSession::new(target, PortRange::from_bounds(1, 1024).unwrap());
//!
//!     let scheduler = ScanScheduler::new(Arc::new(SocketProber), Arc::new(ServiceCatalog::builtin()));
//!     let sink = MemorySink::new();
//!     let summary = scheduler.run(session, &sink, CancellationToken::new()).await.unwrap();
//!
//!     println!("{} open of {} probes", summary.open, summary.total);
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`types`] - Ports, port ranges, protocols and scan targets
//! - [`services`] - The `(protocol, port) -> service` catalog
//! - [`scanner`] - Probers and the bounded scan scheduler
//! - [`sink`] - Result consumers: console, append log, in-memory
//! - [`config`] - XDG settings file
//! - [`output`] - Output formatting utilities
//! - [`error`] - Error types
//! - [`cli`] - Command-line front end

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod scanner;
pub mod services;
pub mod sink;
pub mod types;

// Re-export commonly used types
pub use error::{CatalogError, CliError, ScanError};
pub use scanner::{ProbeOutcome, ProbeResult, Prober, ScanScheduler, ScanSession, ScanSummary};
pub use services::ServiceCatalog;
pub use sink::ResultSink;
pub use types::{Port, PortRange, Protocol, ProtocolSelection, ScanTarget};
