//! Plain text output formatting.
//!
//! Produces human-readable output with colors and formatting.

use crate::scanner::{ProbeResult, ScanStatus, ScanSummary};
use crate::types::{PortRange, ScanTarget};
use console::style;

const RULE: &str = "───────────────────────────────────────────────────────";

/// Longest service name shown before truncation.
const MAX_SERVICE_WIDTH: usize = 32;

/// Print a scan header before scanning begins.
pub fn print_scan_header(target: &ScanTarget, ports: PortRange, protocols: &str, probes: usize) {
    println!();
    println!(
        "{} {} v{}",
        style("Starting").cyan(),
        style("Skiff").cyan().bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(
        "{} Target: {}",
        style("•").dim(),
        style(target).white().bold()
    );
    println!(
        "{} Ports {} over {} ({} probes)",
        style("•").dim(),
        style(ports).white().bold(),
        style(protocols).yellow(),
        probes
    );
    println!();
}

/// Print the column header of the live result table.
pub fn print_table_header() {
    println!("  {}", style(RULE).dim());
    println!(
        "  {:>6}  {:<5}  {:<6}  {}",
        style("PORT").bold(),
        style("PROTO").bold(),
        style("STATE").bold(),
        style("SERVICE").bold()
    );
    println!("  {}", style(RULE).dim());
}

/// One table row for a result.
pub fn format_result_row(result: &ProbeResult) -> String {
    let state = if result.open {
        style("open").green().bold()
    } else {
        style("closed").red()
    };

    format!(
        "  {:>6}  {:<5}  {:<6}  {}",
        result.port,
        result.protocol,
        state,
        truncate_string(&result.service, MAX_SERVICE_WIDTH)
    )
}

/// Print the end-of-scan statistics.
pub fn print_summary(summary: &ScanSummary) {
    println!("  {}", style(RULE).dim());
    println!();
    println!(
        "  {} {} of {} probes in {:.2}s, {} open",
        style("Statistics:").bold(),
        summary.attempted,
        summary.total,
        summary.duration_ms as f64 / 1000.0,
        style(summary.open).green().bold()
    );

    if summary.status == ScanStatus::Cancelled {
        print_warning(&format!(
            "scan cancelled, {} of {} probes were not started",
            summary.total - summary.attempted,
            summary.total
        ));
    }

    if summary.sink_failures > 0 {
        print_warning(&format!(
            "{} results could not be written to the log",
            summary.sink_failures
        ));
    }
    println!();
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}

/// Print an info message.
pub fn print_info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Truncate a string to a maximum length, adding ellipsis if truncated.
fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Port, Protocol};

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("ééééé", 4), "é...");
    }

    #[test]
    fn test_result_row() {
        let result = ProbeResult::new(Protocol::Tcp, Port::new(22).unwrap(), "ssh", true);
        let row = console::strip_ansi_codes(&format_result_row(&result)).to_string();
        assert_eq!(row, "      22  tcp    open    ssh");
    }
}
