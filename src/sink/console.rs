//! Terminal display of results as they arrive.

use crate::error::{SinkError, SinkResult};
use crate::output::{self, OutputFormat};
use crate::scanner::ProbeResult;
use crate::sink::ResultSink;
use indicatif::ProgressBar;
use std::io::{self, Stdout, Write};
use std::sync::{Mutex, PoisonError};

enum Writer<W: Write> {
    Text(W),
    Csv {
        wtr: csv::Writer<W>,
        wrote_header: bool,
    },
}

/// Writes each result to a terminal (or any writer) in one output format.
///
/// With a progress bar attached, the bar is hidden while each row is written
/// so rows and bar redraws never interleave.
pub struct ConsoleSink<W: Write = Stdout> {
    format: OutputFormat,
    out: Mutex<Writer<W>>,
    progress: Option<ProgressBar>,
}

impl ConsoleSink<Stdout> {
    /// Sink printing to standard output.
    pub fn stdout(format: OutputFormat) -> Self {
        Self::new(io::stdout(), format)
    }
}

impl<W: Write> ConsoleSink<W> {
    pub fn new(writer: W, format: OutputFormat) -> Self {
        let out = match format {
            OutputFormat::Csv => Writer::Csv {
                wtr: csv::Writer::from_writer(writer),
                wrote_header: false,
            },
            OutputFormat::Plain | OutputFormat::Json => Writer::Text(writer),
        };

        Self {
            format,
            out: Mutex::new(out),
            progress: None,
        }
    }

    /// Keep `progress` out of the way of written rows.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Recover the underlying writer.
    pub fn into_inner(self) -> SinkResult<W> {
        match self.out.into_inner().unwrap_or_else(PoisonError::into_inner) {
            Writer::Text(writer) => Ok(writer),
            Writer::Csv { wtr, .. } => wtr.into_inner().map_err(|e| SinkError::Io(e.into_error())),
        }
    }
}

impl<W: Write> ConsoleSink<W> {
    fn write_result(&self, out: &mut Writer<W>, result: &ProbeResult) -> SinkResult<()> {
        match out {
            Writer::Text(writer) => {
                let line = match self.format {
                    OutputFormat::Json => output::result_json(result)?,
                    _ => output::format_result_row(result),
                };
                writeln!(writer, "{}", line)?;
                writer.flush()?;
            }
            Writer::Csv { wtr, wrote_header } => {
                if !*wrote_header {
                    output::write_csv_header(wtr)?;
                    *wrote_header = true;
                }
                output::write_csv_row(wtr, result)?;
            }
        }

        Ok(())
    }
}

impl<W: Write + Send> ResultSink for ConsoleSink<W> {
    fn on_result(&self, result: ProbeResult) -> SinkResult<()> {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);

        match &self.progress {
            Some(pb) => pb.suspend(|| self.write_result(&mut out, &result)),
            None => self.write_result(&mut out, &result),
        }
    }
}
