//! Interactive prompt loop.
//!
//! Asks for a host and a protocol choice, scans, and after a single-protocol
//! scan offers to rescan the same host over the other protocol. End of input
//! or `exit` at the protocol prompt leaves the loop.

use crate::cli::{cancel_on_interrupt, execute_scan, load_catalog, Interrupts, ScanRequest};
use crate::config::AppSettings;
use crate::error::CliResult;
use crate::output;
use crate::services::ServiceCatalog;
use crate::types::{Protocol, ProtocolSelection};
use clap::Parser;
use console::style;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Prompt for hosts and protocols until told to stop.
#[derive(Parser, Debug, Default)]
pub struct InteractiveCommand {
    /// Service table (CSV rows of protocol,port,service)
    #[arg(short = 's', long, value_name = "PATH")]
    pub services: Option<PathBuf>,

    /// Don't write results to a log file
    #[arg(long)]
    pub no_log: bool,
}

impl InteractiveCommand {
    pub async fn execute(&self, settings: &AppSettings, verbose: bool, quiet: bool) -> CliResult<()> {
        let catalog = load_catalog(self.services.as_deref(), settings)?;

        let mut defaults = ScanRequest::from_settings(settings);
        if self.no_log {
            defaults.log_file = None;
        }

        let stdin = BufReader::new(tokio::io::stdin());
        let mut interrupts = Interrupts::ctrl_c();
        run_interactive(stdin, &mut interrupts, &defaults, catalog, verbose, quiet).await
    }
}

/// Where the prompt loop is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptState {
    AwaitHost,
    AwaitProtocol {
        host: String,
    },
    Scanning {
        host: String,
        selection: ProtocolSelection,
        offer_rescan: bool,
    },
    AwaitRescanProtocol {
        host: String,
        protocol: Protocol,
    },
    Exit,
}

impl PromptState {
    /// Text shown before reading a line, for states that read one.
    pub fn prompt(&self, default_host: &str) -> Option<String> {
        match self {
            Self::AwaitHost => Some(format!("Enter host to scan [{}]:", default_host)),
            Self::AwaitProtocol { .. } => {
                Some("Protocol to scan (tcp, udp, anything else for both, exit to quit):".into())
            }
            Self::AwaitRescanProtocol { host, protocol } => {
                Some(format!("Scan {} over {} too? (yes/no):", host, protocol))
            }
            Self::Scanning { .. } | Self::Exit => None,
        }
    }

    /// Transition on one line of input. `None` is end of input.
    pub fn on_input(self, input: Option<&str>, default_host: &str) -> Self {
        let Some(line) = input.map(str::trim) else {
            return match self {
                Self::Scanning { .. } => self,
                _ => Self::Exit,
            };
        };

        match self {
            Self::AwaitHost => {
                let host = if line.is_empty() { default_host } else { line };
                Self::AwaitProtocol {
                    host: host.to_string(),
                }
            }
            Self::AwaitProtocol { host } => match line.to_ascii_lowercase().as_str() {
                "exit" => Self::Exit,
                "tcp" => Self::Scanning {
                    host,
                    selection: ProtocolSelection::Tcp,
                    offer_rescan: true,
                },
                "udp" => Self::Scanning {
                    host,
                    selection: ProtocolSelection::Udp,
                    offer_rescan: true,
                },
                _ => Self::Scanning {
                    host,
                    selection: ProtocolSelection::Both,
                    offer_rescan: false,
                },
            },
            Self::AwaitRescanProtocol { host, protocol } => {
                if matches!(line.to_ascii_lowercase().as_str(), "yes" | "y") {
                    Self::Scanning {
                        host,
                        selection: protocol.into(),
                        offer_rescan: false,
                    }
                } else {
                    Self::AwaitHost
                }
            }
            other @ (Self::Scanning { .. } | Self::Exit) => other,
        }
    }

    /// Transition once the scan of a `Scanning` state is over.
    pub fn after_scan(self) -> Self {
        match self {
            Self::Scanning {
                host,
                selection,
                offer_rescan: true,
            } => match selection.single() {
                Some(scanned) => Self::AwaitRescanProtocol {
                    host,
                    protocol: scanned.other(),
                },
                None => Self::AwaitHost,
            },
            Self::Scanning { .. } => Self::AwaitHost,
            other => other,
        }
    }
}

/// Drive the prompt loop over `input` until it exits.
///
/// A scan that fails (an unresolvable host, say) is reported and the loop
/// goes back to asking for a host. An interrupt cancels a running scan; at a
/// prompt it ends the loop like end of input.
pub async fn run_interactive<R: AsyncBufRead + Unpin>(
    input: R,
    interrupts: &mut Interrupts,
    defaults: &ScanRequest,
    catalog: Arc<ServiceCatalog>,
    verbose: bool,
    quiet: bool,
) -> CliResult<()> {
    let mut lines = input.lines();
    let mut state = PromptState::AwaitHost;
    let mut listening = true;

    if !quiet {
        output::print_info("Skiff interactive mode, press Ctrl-C or Ctrl-D to quit");
    }

    loop {
        state = match &state {
            PromptState::Exit => break,
            PromptState::Scanning {
                host, selection, ..
            } => {
                let request = ScanRequest {
                    host: host.clone(),
                    protocols: *selection,
                    ..defaults.clone()
                };

                let cancel = CancellationToken::new();
                let scan = execute_scan(&request, Arc::clone(&catalog), cancel.clone(), verbose, quiet);
                if let Err(e) = cancel_on_interrupt(scan, &cancel, interrupts).await {
                    output::print_error(&e.to_string());
                }

                state.after_scan()
            }
            _ => {
                if let Some(prompt) = state.prompt(&defaults.host) {
                    print!("{} ", style(prompt).bold());
                    std::io::stdout().flush()?;
                }

                let line = loop {
                    tokio::select! {
                        line = lines.next_line() => break line?,
                        press = interrupts.next(), if listening => match press {
                            Some(()) => {
                                println!();
                                break None;
                            }
                            None => listening = false,
                        },
                    }
                };
                state.on_input(line.as_deref(), &defaults.host)
            }
        };
        debug!(?state, "prompt state");
    }

    Ok(())
}
