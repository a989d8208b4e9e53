//! Scanner module - the concurrent scan engine.
//!
//! A [`ScanSession`] describes one scan: target, port range, protocols,
//! concurrency limit and per-probe timeout. The [`ScanScheduler`] expands it
//! into work items, runs probes on tokio tasks under a semaphore, looks up
//! service names for open ports and streams [`ProbeResult`]s back to the
//! caller over a channel.

pub mod rate_limiter;
pub mod tcp;
pub mod traits;
pub mod udp;

use crate::error::{ConfigError, ConfigResult, ScanResult, SinkResult};
use crate::services::ServiceCatalog;
use crate::sink::ResultSink;
use crate::types::{PortRange, Protocol, ProtocolSelection, ScanTarget};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{self, JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub use rate_limiter::RateLimiter;
pub use traits::{ProbeOutcome, ProbeResult, Prober, WorkItem};

/// Default number of probes in flight at once.
pub const DEFAULT_CONCURRENCY: usize = 256;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1500);

/// Prober backed by real TCP and UDP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketProber;

#[async_trait]
impl Prober for SocketProber {
    async fn probe(&self, protocol: Protocol, addr: SocketAddr, timeout: Duration) -> ProbeOutcome {
        match protocol {
            Protocol::Tcp => tcp::probe(addr, timeout).await,
            Protocol::Udp => udp::probe(addr, timeout).await,
        }
    }
}

/// Parameters of one scan.
///
/// A session is consumed by [`ScanScheduler::scan`]; scanning again needs a
/// new session.
#[derive(Debug, Clone)]
pub struct ScanSession {
    target: ScanTarget,
    ports: PortRange,
    protocols: Vec<Protocol>,
    concurrency: usize,
    timeout: Duration,
}

impl ScanSession {
    /// Create a session scanning both protocols with default limits.
    pub fn new(target: ScanTarget, ports: PortRange) -> Self {
        Self {
            target,
            ports,
            protocols: ProtocolSelection::Both.protocols().to_vec(),
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Scan the protocols of a selection.
    pub fn with_protocols(self, selection: ProtocolSelection) -> Self {
        self.with_protocol_list(selection.protocols().iter().copied())
    }

    /// Scan an explicit protocol list. Duplicates are dropped, order is kept.
    pub fn with_protocol_list(mut self, protocols: impl IntoIterator<Item = Protocol>) -> Self {
        self.protocols.clear();
        for protocol in protocols {
            if !self.protocols.contains(&protocol) {
                self.protocols.push(protocol);
            }
        }
        self
    }

    /// Set the maximum number of probes in flight.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the per-probe timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn target(&self) -> &ScanTarget {
        &self.target
    }

    pub fn ports(&self) -> PortRange {
        self.ports
    }

    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Reject sessions that cannot run.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.protocols.is_empty() {
            return Err(ConfigError::NoProtocols);
        }
        Ok(())
    }

    /// Number of work items: protocols times ports.
    pub fn work_len(&self) -> usize {
        self.protocols.len() * self.ports.len()
    }

    /// Work items in protocol-major, port-ascending order.
    pub fn work_items(&self) -> impl Iterator<Item = WorkItem> + '_ {
        let host = self.target.ip;
        let ports = self.ports;
        self.protocols.iter().flat_map(move |&protocol| {
            ports
                .iter()
                .map(move |port| WorkItem::new(protocol, host, port))
        })
    }
}

/// How a scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    /// Every work item was probed.
    Completed,
    /// Cancellation stopped dispatch before every item was probed.
    Cancelled,
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Statistics of a finished scan.
#[derive(Debug, Clone, Serialize)]
pub struct ScanSummary {
    pub target: String,
    pub ip_address: String,
    /// Work items in the session.
    pub total: usize,
    /// Probes actually started.
    pub attempted: usize,
    pub open: usize,
    /// Results the sink failed to record.
    pub sink_failures: usize,
    pub duration_ms: u64,
    pub status: ScanStatus,
}

impl ScanSummary {
    pub fn is_complete(&self) -> bool {
        self.status == ScanStatus::Completed
    }
}

/// Results of a running scan.
///
/// Yields each emitted [`ProbeResult`] as its probe finishes, in no
/// particular order, and ends once every dispatched probe has completed.
/// Dropping the stream before it ends aborts the scan, in-flight probes
/// included.
pub struct ScanStream {
    results: mpsc::UnboundedReceiver<ProbeResult>,
    dispatcher: JoinHandle<ScanSummary>,
}

impl ScanStream {
    /// Wait for the scan to finish and return its summary.
    ///
    /// Results not yet taken from the stream are discarded.
    pub async fn finish(mut self) -> ScanResult<ScanSummary> {
        self.results.close();
        while self.results.recv().await.is_some() {}
        Ok((&mut self.dispatcher).await?)
    }
}

impl Drop for ScanStream {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

impl Stream for ScanStream {
    type Item = ProbeResult;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.results.poll_recv(cx)
    }
}

/// Fans a session out over a bounded pool of probe tasks.
pub struct ScanScheduler<P> {
    prober: Arc<P>,
    catalog: Arc<ServiceCatalog>,
    rate_limiter: Option<RateLimiter>,
    emit_closed: bool,
    progress: Option<ProgressBar>,
}

impl<P: Prober + 'static> ScanScheduler<P> {
    /// Create a scheduler using `prober` for every work item.
    pub fn new(prober: Arc<P>, catalog: Arc<ServiceCatalog>) -> Self {
        Self {
            prober,
            catalog,
            rate_limiter: None,
            emit_closed: false,
            progress: None,
        }
    }

    /// Limit probe starts per second (0 = unlimited).
    pub fn with_rate_limit(mut self, rate: u32) -> Self {
        self.rate_limiter = RateLimiter::new(rate);
        self
    }

    /// Also emit results for closed ports.
    pub fn with_closed(mut self, emit_closed: bool) -> Self {
        self.emit_closed = emit_closed;
        self
    }

    /// Advance `progress` once per finished probe.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Start a scan and return its result stream.
    ///
    /// Must be called from within a tokio runtime. Once `cancel` fires no
    /// further work item is dispatched; probes already running finish within
    /// their timeout.
    pub fn scan(&self, session: ScanSession, cancel: CancellationToken) -> ScanResult<ScanStream> {
        session.validate()?;

        let (tx, results) = mpsc::unbounded_channel();
        let dispatcher = tokio::spawn(dispatch(
            DispatchContext {
                prober: Arc::clone(&self.prober),
                catalog: Arc::clone(&self.catalog),
                rate_limiter: self.rate_limiter.clone(),
                emit_closed: self.emit_closed,
                progress: self.progress.clone(),
            },
            session,
            cancel,
            tx,
        ));

        Ok(ScanStream {
            results,
            dispatcher,
        })
    }

    /// Run a scan to completion, handing every result to `sink`.
    ///
    /// Sink failures are logged and counted but never stop the scan.
    pub async fn run(
        &self,
        session: ScanSession,
        sink: &dyn ResultSink,
        cancel: CancellationToken,
    ) -> ScanResult<ScanSummary> {
        let mut stream = self.scan(session, cancel)?;
        let mut sink_failures = 0;

        while let Some(result) = stream.next().await {
            let port = result.port;
            if let Err(e) = record(sink, result) {
                sink_failures += 1;
                warn!(%port, error = %e, "failed to record result");
            }
        }

        let mut summary = stream.finish().await?;
        summary.sink_failures = sink_failures;
        Ok(summary)
    }
}

/// Hand a result to a sink that may block on file IO.
///
/// On a multi-threaded runtime the worker is handed off while the sink runs.
fn record(sink: &dyn ResultSink, result: ProbeResult) -> SinkResult<()> {
    match Handle::try_current().map(|handle| handle.runtime_flavor()) {
        Ok(RuntimeFlavor::MultiThread) => task::block_in_place(|| sink.on_result(result)),
        _ => sink.on_result(result),
    }
}

/// Everything a probe task needs besides its work item.
struct DispatchContext<P> {
    prober: Arc<P>,
    catalog: Arc<ServiceCatalog>,
    rate_limiter: Option<RateLimiter>,
    emit_closed: bool,
    progress: Option<ProgressBar>,
}

async fn dispatch<P: Prober + 'static>(
    ctx: DispatchContext<P>,
    session: ScanSession,
    cancel: CancellationToken,
    tx: mpsc::UnboundedSender<ProbeResult>,
) -> ScanSummary {
    let start_time = Instant::now();
    let total = session.work_len();
    let timeout = session.timeout();
    let semaphore = Arc::new(Semaphore::new(session.concurrency()));
    let open = Arc::new(AtomicUsize::new(0));
    let mut workers = JoinSet::new();
    let mut dispatched = 0usize;

    info!(
        host = %session.target(),
        ports = %session.ports(),
        total,
        concurrency = session.concurrency(),
        "starting scan"
    );

    for item in session.work_items() {
        // The permit is held by the probe task, so this waits while the pool is full.
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            permit = Arc::clone(&semaphore).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit else {
            break;
        };

        if let Some(limiter) = &ctx.rate_limiter {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = limiter.wait() => {}
            }
        }

        if cancel.is_cancelled() {
            break;
        }

        dispatched += 1;

        let prober = Arc::clone(&ctx.prober);
        let catalog = Arc::clone(&ctx.catalog);
        let progress = ctx.progress.clone();
        let open = Arc::clone(&open);
        let tx = tx.clone();
        let emit_closed = ctx.emit_closed;

        workers.spawn(async move {
            let _permit = permit;

            let outcome = prober.probe(item.protocol, item.addr(), timeout).await;

            if let Some(pb) = &progress {
                pb.inc(1);
            }

            if outcome.is_open() {
                open.fetch_add(1, Ordering::Relaxed);
                debug!(protocol = %item.protocol, port = %item.port, "port open");
            } else if !emit_closed {
                return;
            }

            let service = catalog.lookup(item.protocol, item.port);
            let result = ProbeResult::new(item.protocol, item.port, service, outcome.is_open());
            if tx.send(result).is_err() {
                trace!(port = %item.port, "result receiver dropped");
            }
        });
    }

    // Completion barrier: every dispatched probe finishes before we report.
    while let Some(joined) = workers.join_next().await {
        if let Err(e) = joined {
            warn!(error = %e, "probe task failed");
        }
    }

    let status = if dispatched == total {
        ScanStatus::Completed
    } else {
        info!(dispatched, total, "scan cancelled");
        ScanStatus::Cancelled
    };

    let summary = ScanSummary {
        target: session.target().original.clone(),
        ip_address: session.target().ip.to_string(),
        total,
        attempted: dispatched,
        open: open.load(Ordering::Relaxed),
        sink_failures: 0,
        duration_ms: start_time.elapsed().as_millis() as u64,
        status,
    };

    debug!(
        attempted = summary.attempted,
        open = summary.open,
        duration_ms = summary.duration_ms,
        "scan finished"
    );

    summary
}
