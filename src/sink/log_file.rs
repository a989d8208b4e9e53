//! Append-only scan log.
//!
//! Format, one entry per line:
//!
//! ```text
//! Scan Time: 2024-05-01 13:37:00
//! Port 22 tcp ssh
//! Port 53 udp domain
//! ```
//!
//! The `Scan Time` header is only written when the file is new or empty.

use crate::error::SinkResult;
use crate::scanner::ProbeResult;
use crate::sink::ResultSink;
use chrono::{Local, NaiveDateTime};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Durable log of open ports, flushed to disk after every line.
#[derive(Debug)]
pub struct LogFileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl LogFileSink {
    /// Open (or create) the log at `path` for appending.
    pub fn open(path: impl AsRef<Path>) -> SinkResult<Self> {
        let path = path.as_ref();
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let needs_header = file.metadata()?.len() == 0;

        let sink = Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        };

        if needs_header {
            sink.write_line(&header_line(Local::now().naive_local()))?;
        }

        debug!(path = %path.display(), needs_header, "opened scan log");
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_line(&self, line: &str) -> SinkResult<()> {
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(file, "{}", line)?;
        file.flush()?;
        file.sync_data()?;
        Ok(())
    }
}

impl ResultSink for LogFileSink {
    fn on_result(&self, result: ProbeResult) -> SinkResult<()> {
        if !result.open {
            return Ok(());
        }
        self.write_line(&result_line(&result))
    }
}

/// Session header line.
pub fn header_line(time: NaiveDateTime) -> String {
    format!("Scan Time: {}", time.format("%Y-%m-%d %H:%M:%S"))
}

/// Log line for one open port.
pub fn result_line(result: &ProbeResult) -> String {
    format!("Port {} {} {}", result.port, result.protocol, result.service)
}
