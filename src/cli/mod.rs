//! CLI subcommand definitions and handlers.
//!
//! - `skiff scan [HOST]` - Scan a host non-interactively
//! - `skiff interactive` - Prompt for host and protocols in a loop (default)
//! - `skiff config show|init|path` - Inspect or create the settings file

mod config_cmd;
mod interactive;
mod scan;

pub use config_cmd::{ConfigAction, ConfigCommand};
pub use interactive::{run_interactive, InteractiveCommand, PromptState};
pub use scan::{execute_scan, ScanCommand, ScanRequest};

use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use crate::services::ServiceCatalog;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Skiff - a concurrent TCP/UDP reachability probe.
///
/// Probes every port of a range over TCP and/or UDP and reports the open
/// ones with their well-known service name.
#[derive(Parser, Debug)]
#[command(name = "skiff")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "A concurrent TCP/UDP reachability probe", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute (interactive mode when omitted)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Enable verbose output and a progress bar
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to a settings file (defaults to the XDG config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a host for open ports
    #[command(alias = "s")]
    Scan(ScanCommand),

    /// Prompt for targets and protocols in a loop
    #[command(alias = "i")]
    Interactive(InteractiveCommand),

    /// Inspect or create the settings file
    Config(ConfigCommand),
}

/// Dispatch a parsed command line.
///
/// `config` loads the settings file itself, so a broken file can still be
/// replaced with `config init --force`.
pub async fn run(cli: Cli) -> CliResult<()> {
    let config = cli.config.as_deref();

    match &cli.command {
        Some(Commands::Scan(cmd)) => {
            let settings = load_settings(config)?;
            cmd.execute(&settings, cli.verbose, cli.quiet).await
        }
        Some(Commands::Interactive(cmd)) => {
            let settings = load_settings(config)?;
            cmd.execute(&settings, cli.verbose, cli.quiet).await
        }
        Some(Commands::Config(cmd)) => cmd.execute(config),
        None => {
            let settings = load_settings(config)?;
            InteractiveCommand::default()
                .execute(&settings, cli.verbose, cli.quiet)
                .await
        }
    }
}

/// Settings from `--config`, or the XDG location, or defaults.
pub(crate) fn load_settings(path: Option<&Path>) -> CliResult<AppSettings> {
    let settings = match path {
        Some(path) => AppSettings::load_from(path)?,
        None => AppSettings::load()?,
    };
    Ok(settings)
}

/// Load the service table.
///
/// An explicitly requested table must load. The configured default table
/// may be absent, in which case the built-in table is used instead.
pub fn load_catalog(
    explicit: Option<&Path>,
    settings: &AppSettings,
) -> CliResult<Arc<ServiceCatalog>> {
    let catalog = match explicit {
        Some(path) => ServiceCatalog::load(path)?,
        None if settings.services_file.exists() => ServiceCatalog::load(&settings.services_file)?,
        None => {
            warn!(
                path = %settings.services_file.display(),
                "service table not found, using built-in table"
            );
            ServiceCatalog::builtin()
        }
    };

    debug!(entries = catalog.len(), "service catalog ready");
    Ok(Arc::new(catalog))
}

/// Ctrl-C presses, delivered one message per press.
///
/// A single listener serves a whole session; it stops when this is dropped.
pub struct Interrupts {
    presses: mpsc::UnboundedReceiver<()>,
    listener: Option<JoinHandle<()>>,
}

impl Interrupts {
    /// Listen for Ctrl-C on this process.
    pub fn ctrl_c() -> Self {
        let (tx, presses) = mpsc::unbounded_channel();

        let listener = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(()).is_err() {
                    break;
                }
            }
        });

        Self {
            presses,
            listener: Some(listener),
        }
    }

    /// Interrupts fed through the returned sender instead of the terminal.
    pub fn channel() -> (mpsc::UnboundedSender<()>, Self) {
        let (tx, presses) = mpsc::unbounded_channel();
        (
            tx,
            Self {
                presses,
                listener: None,
            },
        )
    }

    /// Wait for the next press. `None` once no more can arrive.
    pub async fn next(&mut self) -> Option<()> {
        self.presses.recv().await
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

/// Drive `work` to completion, firing `cancel` on every interrupt.
pub(crate) async fn cancel_on_interrupt<F: Future>(
    work: F,
    cancel: &CancellationToken,
    interrupts: &mut Interrupts,
) -> F::Output {
    tokio::pin!(work);
    let mut listening = true;

    loop {
        tokio::select! {
            done = &mut work => return done,
            press = interrupts.next(), if listening => match press {
                Some(()) => {
                    output::print_warning("interrupted, finishing in-flight probes");
                    cancel.cancel();
                }
                None => listening = false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CatalogError, CliError};
    use crate::types::{Port, Protocol};
    use std::io::Write;

    #[test]
    fn test_cli_parses_scan_flags() {
        let cli = Cli::try_parse_from([
            "skiff", "scan", "127.0.0.1", "--ports", "20-25", "--protocol", "udp", "-c", "8",
        ])
        .unwrap();

        match cli.command {
            Some(Commands::Scan(cmd)) => {
                assert_eq!(cmd.host.as_deref(), Some("127.0.0.1"));
                assert_eq!(cmd.ports.map(|p| p.to_string()).as_deref(), Some("20-25"));
                assert_eq!(cmd.concurrency, Some(8));
            }
            other => panic!("expected scan command, got {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_inverted_range() {
        assert!(Cli::try_parse_from(["skiff", "scan", "--ports", "100-1"]).is_err());
        assert!(Cli::try_parse_from(["skiff", "scan", "--ports", "0-10"]).is_err());
    }

    #[test]
    fn test_no_subcommand_is_interactive() {
        let cli = Cli::try_parse_from(["skiff"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[tokio::test]
    async fn test_init_force_repairs_corrupt_settings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ broken").unwrap();
        let path_arg = path.to_str().unwrap();

        let show = Cli::try_parse_from(["skiff", "--config", path_arg, "config", "show"]).unwrap();
        assert!(matches!(run(show).await, Err(CliError::Config(_))));

        let init = Cli::try_parse_from([
            "skiff", "--config", path_arg, "config", "init", "--force",
        ])
        .unwrap();
        tokio_test::assert_ok!(run(init).await);
        assert_eq!(AppSettings::load_from(&path).unwrap(), AppSettings::default());
    }

    #[tokio::test]
    async fn test_interrupt_cancels_running_work() {
        let (presses, mut interrupts) = Interrupts::channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        presses.send(()).unwrap();
        let finished = cancel_on_interrupt(
            async move {
                token.cancelled().await;
                "stopped"
            },
            &cancel,
            &mut interrupts,
        )
        .await;

        assert_eq!(finished, "stopped");
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_closed_interrupts_leave_work_running() {
        let (presses, mut interrupts) = Interrupts::channel();
        drop(presses);
        let cancel = CancellationToken::new();

        let value = cancel_on_interrupt(async { 7 }, &cancel, &mut interrupts).await;
        assert_eq!(value, 7);
        assert!(!cancel.is_cancelled());
    }

    #[test]
    fn test_explicit_missing_catalog_is_fatal() {
        let settings = AppSettings::default();
        let result = load_catalog(Some(Path::new("/no/such/table.csv")), &settings);
        assert!(matches!(result, Err(CliError::Catalog(CatalogError::Open { .. }))));
    }

    #[test]
    fn test_missing_default_catalog_falls_back() {
        let settings = AppSettings {
            services_file: PathBuf::from("/no/such/all.csv"),
            ..AppSettings::default()
        };
        let catalog = load_catalog(None, &settings).unwrap();
        assert_eq!(catalog.lookup(Protocol::Tcp, Port::new(22).unwrap()), "ssh");
    }

    #[test]
    fn test_malformed_default_catalog_is_fatal() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tcp,80").unwrap();
        let settings = AppSettings {
            services_file: file.path().to_path_buf(),
            ..AppSettings::default()
        };

        let result = load_catalog(None, &settings);
        assert!(matches!(
            result,
            Err(CliError::Catalog(CatalogError::MissingFields { .. }))
        ));
    }
}
