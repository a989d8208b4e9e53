//! Result sinks.
//!
//! A sink receives every emitted [`ProbeResult`] for display or durable
//! logging. Sinks are shared, so each one serializes its own writes.

mod console;
mod log_file;

pub use console::ConsoleSink;
pub use log_file::LogFileSink;

use crate::error::SinkResult;
use crate::scanner::ProbeResult;
use std::sync::{Mutex, PoisonError};

/// Receiver of scan results.
pub trait ResultSink: Send + Sync {
    /// Accept one result. Calls are independent and may arrive in any order.
    fn on_result(&self, result: ProbeResult) -> SinkResult<()>;
}

/// Forwards each result to a display sink and then a log sink.
///
/// Both sinks always see the result; the first error is returned.
pub struct TeeSink<A, B> {
    display: A,
    log: B,
}

impl<A: ResultSink, B: ResultSink> TeeSink<A, B> {
    pub fn new(display: A, log: B) -> Self {
        Self { display, log }
    }
}

impl<A: ResultSink, B: ResultSink> ResultSink for TeeSink<A, B> {
    fn on_result(&self, result: ProbeResult) -> SinkResult<()> {
        let displayed = self.display.on_result(result.clone());
        let logged = self.log.on_result(result);
        displayed.and(logged)
    }
}

/// Collects results in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    results: Mutex<Vec<ProbeResult>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results received so far, in arrival order.
    pub fn results(&self) -> Vec<ProbeResult> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ResultSink for MemorySink {
    fn on_result(&self, result: ProbeResult) -> SinkResult<()> {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(result);
        Ok(())
    }
}
