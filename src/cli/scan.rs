//! Scan subcommand implementation.
//!
//! Handles the `skiff scan [HOST]` command. The interactive loop reuses
//! [`execute_scan`] for each of its scans.

use crate::cli::{cancel_on_interrupt, load_catalog, Interrupts};
use crate::config::AppSettings;
use crate::error::{CliResult, ConfigError};
use crate::output::{self, OutputFormat};
use crate::scanner::{ScanScheduler, ScanSession, ScanSummary, SocketProber};
use crate::services::ServiceCatalog;
use crate::sink::{ConsoleSink, LogFileSink, TeeSink};
use crate::types::{PortRange, ProtocolSelection, ScanTarget};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Scan a host for open ports.
///
/// Every flag left out falls back to the settings file, then to the
/// built-in defaults.
#[derive(Parser, Debug)]
pub struct ScanCommand {
    /// Host to scan (IP address or hostname)
    #[arg(value_name = "HOST")]
    pub host: Option<String>,

    /// Port range to scan (e.g., "80" or "1-1024")
    #[arg(short, long)]
    pub ports: Option<PortRange>,

    /// Protocols to probe
    #[arg(short = 'P', long, value_enum)]
    pub protocol: Option<ProtocolSelection>,

    /// Maximum number of probes in flight
    #[arg(short = 'c', long)]
    pub concurrency: Option<usize>,

    /// Per-probe timeout in milliseconds
    #[arg(short = 't', long)]
    pub timeout: Option<u64>,

    /// Probe starts per second (0 = unlimited)
    #[arg(short = 'r', long = "rate")]
    pub rate_limit: Option<u32>,

    /// Service table (CSV rows of protocol,port,service)
    #[arg(short = 's', long, value_name = "PATH")]
    pub services: Option<PathBuf>,

    /// Append open ports to this log file
    #[arg(short = 'l', long, value_name = "PATH", conflicts_with = "no_log")]
    pub log: Option<PathBuf>,

    /// Don't write results to a log file
    #[arg(long)]
    pub no_log: bool,

    /// Output format for results
    #[arg(short = 'o', long = "format", value_enum)]
    pub format: Option<OutputFormat>,

    /// Show closed ports in output
    #[arg(long)]
    pub show_closed: bool,
}

impl ScanCommand {
    /// Execute the scan command.
    pub async fn execute(&self, settings: &AppSettings, verbose: bool, quiet: bool) -> CliResult<()> {
        let request = self.request(settings);
        let catalog = load_catalog(self.services.as_deref(), settings)?;

        let mut interrupts = Interrupts::ctrl_c();
        let cancel = CancellationToken::new();
        let scan = execute_scan(&request, catalog, cancel.clone(), verbose, quiet);

        cancel_on_interrupt(scan, &cancel, &mut interrupts)
            .await
            .map(|_| ())
    }

    /// Merge command-line flags over the settings.
    pub fn request(&self, settings: &AppSettings) -> ScanRequest {
        let defaults = ScanRequest::from_settings(settings);

        let log_file = if self.no_log {
            None
        } else {
            self.log.clone().or(defaults.log_file)
        };

        ScanRequest {
            host: self.host.clone().unwrap_or(defaults.host),
            ports: self.ports.unwrap_or(defaults.ports),
            protocols: self.protocol.unwrap_or(defaults.protocols),
            concurrency: self.concurrency.unwrap_or(defaults.concurrency),
            timeout: self.timeout.map(Duration::from_millis).unwrap_or(defaults.timeout),
            rate_limit: self.rate_limit.unwrap_or(defaults.rate_limit),
            format: self.format.unwrap_or(defaults.format),
            log_file,
            show_closed: self.show_closed,
        }
    }
}

/// Fully resolved parameters of one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanRequest {
    pub host: String,
    pub ports: PortRange,
    pub protocols: ProtocolSelection,
    pub concurrency: usize,
    pub timeout: Duration,
    pub rate_limit: u32,
    pub format: OutputFormat,
    /// `None` disables the result log.
    pub log_file: Option<PathBuf>,
    pub show_closed: bool,
}

impl ScanRequest {
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self {
            host: settings.default_host.clone(),
            ports: settings.default_ports,
            protocols: settings.default_protocol,
            concurrency: settings.default_concurrency,
            timeout: settings.timeout(),
            rate_limit: settings.default_rate_limit,
            format: settings.default_output_format,
            log_file: settings.log_results.then(|| settings.log_file.clone()),
            show_closed: false,
        }
    }
}

/// Resolve, scan and report one host.
///
/// Results go to the console and, when enabled, to the append log. A log
/// file that cannot be opened is reported and the scan runs without it.
pub async fn execute_scan(
    request: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
    cancel: CancellationToken,
    verbose: bool,
    quiet: bool,
) -> CliResult<ScanSummary> {
    let target = ScanTarget::resolve(&request.host)
        .await
        .map_err(ConfigError::from)?;

    let session = ScanSession::new(target, request.ports)
        .with_protocols(request.protocols)
        .with_concurrency(request.concurrency)
        .with_timeout(request.timeout);
    session.validate()?;

    let plain = request.format == OutputFormat::Plain;
    if !quiet && plain {
        output::print_scan_header(
            session.target(),
            session.ports(),
            &request.protocols.to_string(),
            session.work_len(),
        );
        output::print_table_header();
    }

    let progress = (verbose && plain).then(|| progress_bar(session.work_len() as u64));

    let mut scheduler = ScanScheduler::new(Arc::new(SocketProber), catalog)
        .with_rate_limit(request.rate_limit)
        .with_closed(request.show_closed);
    if let Some(pb) = &progress {
        scheduler = scheduler.with_progress(pb.clone());
    }

    let mut display = ConsoleSink::stdout(request.format);
    if let Some(pb) = &progress {
        display = display.with_progress(pb.clone());
    }
    let log = request.log_file.as_ref().and_then(|path| match LogFileSink::open(path) {
        Ok(sink) => Some(sink),
        Err(e) => {
            output::print_warning(&format!(
                "cannot open log file {}: {}, results will not be logged",
                path.display(),
                e
            ));
            None
        }
    });

    let summary = match log {
        Some(log) => {
            info!(path = %log.path().display(), "logging open ports");
            scheduler
                .run(session, &TeeSink::new(display, log), cancel)
                .await?
        }
        None => scheduler.run(session, &display, cancel).await?,
    };

    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if !quiet && plain {
        output::print_summary(&summary);
    } else if request.format == OutputFormat::Json && !quiet {
        println!("{}", output::summary_json(&summary).map_err(ConfigError::from)?);
    }

    Ok(summary)
}

fn progress_bar(len: u64) -> ProgressBar {
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
    )
    .map(|style| style.progress_chars("=>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());

    let pb = ProgressBar::new(len);
    pb.set_style(style);
    pb
}
