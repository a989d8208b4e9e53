//! End-to-end behaviour of the scan scheduler with scripted and real probers.

use async_trait::async_trait;
use futures::StreamExt;
use skiff::error::{CatalogError, SinkError, SinkResult};
use skiff::scanner::{
    ProbeOutcome, ProbeResult, Prober, ScanScheduler, ScanSession, ScanStatus, SocketProber,
};
use skiff::services::ServiceCatalog;
use skiff::sink::{MemorySink, ResultSink};
use skiff::types::{Port, PortRange, Protocol, ProtocolSelection, ScanTarget};
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

fn localhost() -> ScanTarget {
    ScanTarget::from(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

fn range(start: u16, end: u16) -> PortRange {
    PortRange::from_bounds(start, end).unwrap()
}

/// Records every probe and reports the configured ports open.
#[derive(Default)]
struct ScriptedProber {
    open: Vec<(Protocol, u16)>,
    calls: Mutex<HashMap<(Protocol, u16), usize>>,
    cancel_after: Option<(usize, CancellationToken)>,
    count: AtomicUsize,
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(&self, protocol: Protocol, addr: SocketAddr, _timeout: Duration) -> ProbeOutcome {
        *self
            .calls
            .lock()
            .unwrap()
            .entry((protocol, addr.port()))
            .or_default() += 1;

        let n = self.count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some((limit, token)) = &self.cancel_after {
            if n == *limit {
                token.cancel();
            }
        }

        if self.open.contains(&(protocol, addr.port())) {
            ProbeOutcome::Open
        } else {
            ProbeOutcome::Closed
        }
    }
}

/// Tracks how many probes run at once.
#[derive(Default)]
struct GaugeProber {
    current: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl Prober for GaugeProber {
    async fn probe(&self, _protocol: Protocol, _addr: SocketAddr, _timeout: Duration) -> ProbeOutcome {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        ProbeOutcome::Closed
    }
}

#[tokio::test]
async fn every_work_item_is_probed_exactly_once() {
    let prober = Arc::new(ScriptedProber::default());
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 50)).with_concurrency(8);

    let summary = scheduler
        .run(session, &MemorySink::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.total, 100);
    assert_eq!(summary.attempted, 100);
    assert_eq!(summary.status, ScanStatus::Completed);

    let calls = prober.calls.lock().unwrap();
    assert_eq!(calls.len(), 100);
    assert!(calls.values().all(|&n| n == 1));
    for port in 1..=50 {
        assert!(calls.contains_key(&(Protocol::Tcp, port)));
        assert!(calls.contains_key(&(Protocol::Udp, port)));
    }
}

#[tokio::test]
async fn concurrency_never_exceeds_the_bound() {
    let prober = Arc::new(GaugeProber::default());
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 60))
        .with_protocols(ProtocolSelection::Tcp)
        .with_concurrency(4);

    let summary = scheduler
        .run(session, &MemorySink::new(), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 60);
    let peak = prober.peak.load(Ordering::SeqCst);
    assert!(peak <= 4, "peak concurrency was {}", peak);
    assert!(peak >= 1);
}

#[tokio::test]
async fn open_ports_are_named_from_the_catalog() {
    let prober = Arc::new(ScriptedProber {
        open: vec![(Protocol::Tcp, 22), (Protocol::Udp, 53), (Protocol::Tcp, 9999)],
        ..ScriptedProber::default()
    });
    let catalog = ServiceCatalog::from_reader("tcp,22,SSH\nudp,53,DNS\n".as_bytes()).unwrap();
    let scheduler = ScanScheduler::new(prober, Arc::new(catalog));
    let sink = MemorySink::new();

    let summary = scheduler
        .run(ScanSession::new(localhost(), range(1, 10000)), &sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.open, 3);
    let mut found: Vec<(Protocol, u16, String)> = sink
        .results()
        .into_iter()
        .map(|r| (r.protocol, r.port.as_u16(), r.service))
        .collect();
    found.sort();
    assert_eq!(
        found,
        vec![
            (Protocol::Tcp, 22, "SSH".to_string()),
            (Protocol::Tcp, 9999, "Unknown Service".to_string()),
            (Protocol::Udp, 53, "DNS".to_string()),
        ]
    );
}

#[tokio::test]
async fn listening_tcp_port_is_reported_once() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let catalog = ServiceCatalog::from_reader(format!("tcp,{},HTTP\n", port).as_bytes()).unwrap();

    let scheduler = ScanScheduler::new(Arc::new(SocketProber), Arc::new(catalog));
    let session = ScanSession::new(localhost(), range(port, port))
        .with_protocols(ProtocolSelection::Tcp)
        .with_timeout(Duration::from_millis(500));
    let sink = MemorySink::new();

    let summary = scheduler.run(session, &sink, CancellationToken::new()).await;
    let summary = tokio_test::assert_ok!(summary);

    assert_eq!(summary.open, 1);
    let results = sink.results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].port, Port::new(port).unwrap());
    assert_eq!(results[0].service, "HTTP");
    assert!(results[0].open);
}

#[tokio::test]
async fn closed_tcp_port_yields_no_results() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };

    let scheduler = ScanScheduler::new(Arc::new(SocketProber), Arc::new(ServiceCatalog::builtin()));
    let session = ScanSession::new(localhost(), range(port, port))
        .with_protocols(ProtocolSelection::Tcp)
        .with_timeout(Duration::from_millis(500));
    let sink = MemorySink::new();

    let summary = scheduler
        .run(session, &sink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.attempted, 1);
    assert_eq!(summary.open, 0);
    assert!(sink.is_empty());
}

#[test]
fn malformed_catalog_is_rejected_before_any_probe() {
    let result = ServiceCatalog::from_reader("tcp,80,http\nudp,53\n".as_bytes());
    assert!(matches!(
        result,
        Err(CatalogError::MissingFields { line: 2, found: 2 })
    ));
}

#[tokio::test]
async fn cancellation_stops_dispatch() {
    let cancel = CancellationToken::new();
    let prober = Arc::new(ScriptedProber {
        cancel_after: Some((50, cancel.clone())),
        ..ScriptedProber::default()
    });
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 100))
        .with_protocols(ProtocolSelection::Tcp)
        .with_concurrency(1);

    let summary = scheduler
        .run(session, &MemorySink::new(), cancel)
        .await
        .unwrap();

    assert_eq!(summary.status, ScanStatus::Cancelled);
    assert_eq!(summary.attempted, 50);
    assert_eq!(prober.count.load(Ordering::SeqCst), 50);
}

#[tokio::test]
async fn cancelled_before_start_probes_nothing() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let prober = Arc::new(ScriptedProber::default());
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()));

    let summary = scheduler
        .run(ScanSession::new(localhost(), range(1, 10)), &MemorySink::new(), cancel)
        .await
        .unwrap();

    assert_eq!(summary.attempted, 0);
    assert_eq!(summary.status, ScanStatus::Cancelled);
    assert_eq!(prober.count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn catalog_lookups_are_stable_under_concurrency() {
    let catalog = Arc::new(ServiceCatalog::builtin());
    let expected = catalog.lookup(Protocol::Tcp, Port::new(443).unwrap()).to_string();

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..32 {
        let catalog = Arc::clone(&catalog);
        tasks.spawn(async move {
            (0..1000)
                .map(|_| catalog.lookup(Protocol::Tcp, Port::new(443).unwrap()).to_string())
                .collect::<Vec<_>>()
        });
    }

    while let Some(names) = tasks.join_next().await {
        assert!(names.unwrap().iter().all(|name| *name == expected));
    }
}

#[tokio::test]
async fn results_stream_ends_after_the_last_probe() {
    let prober = Arc::new(ScriptedProber {
        open: (1..=5).map(|p| (Protocol::Udp, p)).collect(),
        ..ScriptedProber::default()
    });
    let scheduler = ScanScheduler::new(prober, Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 5)).with_protocols(ProtocolSelection::Udp);

    let mut stream = scheduler.scan(session, CancellationToken::new()).unwrap();
    let mut ports = Vec::new();
    while let Some(result) = stream.next().await {
        ports.push(result.port.as_u16());
    }
    ports.sort_unstable();
    assert_eq!(ports, vec![1, 2, 3, 4, 5]);

    let summary = stream.finish().await.unwrap();
    assert!(summary.is_complete());
}

/// Refuses every result.
struct RejectingSink;

impl ResultSink for RejectingSink {
    fn on_result(&self, _result: ProbeResult) -> SinkResult<()> {
        Err(SinkError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}

/// Takes a while to record each result, like a log synced to disk.
struct SlowSink {
    delay: Duration,
    inner: MemorySink,
}

impl ResultSink for SlowSink {
    fn on_result(&self, result: ProbeResult) -> SinkResult<()> {
        std::thread::sleep(self.delay);
        self.inner.on_result(result)
    }
}

/// Sleeps on every probe and reports it open.
#[derive(Default)]
struct SlowProber {
    count: AtomicUsize,
}

#[async_trait]
impl Prober for SlowProber {
    async fn probe(&self, _protocol: Protocol, _addr: SocketAddr, _timeout: Duration) -> ProbeOutcome {
        self.count.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        ProbeOutcome::Open
    }
}

fn odd_ports_open(end: u16) -> Arc<ScriptedProber> {
    Arc::new(ScriptedProber {
        open: (1..=end).filter(|p| p % 2 == 1).map(|p| (Protocol::Tcp, p)).collect(),
        ..ScriptedProber::default()
    })
}

#[tokio::test]
async fn sink_failures_are_counted_not_fatal() {
    let scheduler = ScanScheduler::new(odd_ports_open(10), Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 10)).with_protocols(ProtocolSelection::Tcp);

    let summary = scheduler
        .run(session, &RejectingSink, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(summary.status, ScanStatus::Completed);
    assert_eq!(summary.attempted, 10);
    assert_eq!(summary.open, 5);
    assert_eq!(summary.sink_failures, summary.open);
}

#[tokio::test]
async fn closed_results_are_emitted_on_request() {
    let scheduler = ScanScheduler::new(odd_ports_open(10), Arc::new(ServiceCatalog::default()))
        .with_closed(true);
    let session = ScanSession::new(localhost(), range(1, 10)).with_protocols(ProtocolSelection::Tcp);
    let sink = MemorySink::new();

    let summary = scheduler
        .run(session, &sink, CancellationToken::new())
        .await
        .unwrap();

    let results = sink.results();
    assert_eq!(results.len(), 10);
    assert_eq!(results.iter().filter(|r| r.open).count(), 5);
    assert!(results.iter().filter(|r| !r.open).all(|r| r.port.as_u16() % 2 == 0));
    assert_eq!(summary.open, 5);
}

#[tokio::test]
async fn rate_limit_paces_dispatch() {
    let prober = Arc::new(ScriptedProber::default());
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()))
        .with_rate_limit(20);
    let session = ScanSession::new(localhost(), range(1, 60)).with_protocols(ProtocolSelection::Tcp);

    let started = Instant::now();
    let summary = scheduler
        .run(session, &MemorySink::new(), CancellationToken::new())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.attempted, 60);
    assert_eq!(prober.count.load(Ordering::SeqCst), 60);
    // 20 start at once, the other 40 at 20 per second.
    assert!(elapsed >= Duration::from_millis(1500), "finished in {:?}", elapsed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 1)]
async fn slow_sink_does_not_stall_other_tasks() {
    let ticks = Arc::new(AtomicUsize::new(0));
    let ticker = {
        let ticks = Arc::clone(&ticks);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                ticks.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    let scan = tokio::spawn(async move {
        let scheduler = ScanScheduler::new(odd_ports_open(6), Arc::new(ServiceCatalog::default()));
        let session =
            ScanSession::new(localhost(), range(1, 6)).with_protocols(ProtocolSelection::Tcp);
        let sink = SlowSink {
            delay: Duration::from_millis(100),
            inner: MemorySink::new(),
        };
        let summary = scheduler
            .run(session, &sink, CancellationToken::new())
            .await
            .unwrap();
        (summary, sink.inner.len())
    });

    let (summary, recorded) = scan.await.unwrap();
    ticker.abort();

    assert_eq!(summary.open, 3);
    assert_eq!(recorded, 3);
    let ticks = ticks.load(Ordering::SeqCst);
    assert!(ticks >= 10, "only {} ticks while the sink was busy", ticks);
}

#[tokio::test]
async fn dropping_the_stream_stops_the_scan() {
    let prober = Arc::new(SlowProber::default());
    let scheduler = ScanScheduler::new(Arc::clone(&prober), Arc::new(ServiceCatalog::default()));
    let session = ScanSession::new(localhost(), range(1, 200))
        .with_protocols(ProtocolSelection::Tcp)
        .with_concurrency(1);

    let mut stream = scheduler.scan(session, CancellationToken::new()).unwrap();
    assert!(stream.next().await.is_some());
    drop(stream);

    tokio::time::sleep(Duration::from_millis(100)).await;
    let after_drop = prober.count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(prober.count.load(Ordering::SeqCst), after_drop);
    assert!(after_drop < 200);
}
