//! Prober trait abstraction and the values that flow through a scan.
//!
//! Defines a common interface for probe implementations, enabling the
//! scheduler to run against real sockets or against test doubles.

use crate::types::{Port, Protocol};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Classification of a single probe.
///
/// Transport errors are folded into `Closed`: the tool reports reachability,
/// not diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    /// The port accepted the connection (or, for UDP, did not refuse it).
    Open,
    /// The port refused, timed out, or errored.
    Closed,
}

impl ProbeOutcome {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// One `(protocol, host, port)` triple to probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkItem {
    pub protocol: Protocol,
    pub host: IpAddr,
    pub port: Port,
}

impl WorkItem {
    pub fn new(protocol: Protocol, host: IpAddr, port: Port) -> Self {
        Self {
            protocol,
            host,
            port,
        }
    }

    /// Socket address this item targets.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port.as_u16())
    }
}

/// Result of probing a single port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Protocol the port was probed over.
    pub protocol: Protocol,
    /// The port number that was probed.
    pub port: Port,
    /// Service name from the catalog.
    pub service: String,
    /// Whether the port was classified open.
    pub open: bool,
    /// When the probe finished.
    pub timestamp: DateTime<Utc>,
}

impl ProbeResult {
    /// Create a result stamped with the current time.
    pub fn new(protocol: Protocol, port: Port, service: impl Into<String>, open: bool) -> Self {
        Self {
            protocol,
            port,
            service: service.into(),
            open,
            timestamp: Utc::now(),
        }
    }

    /// Outcome this result was built from.
    pub fn outcome(&self) -> ProbeOutcome {
        if self.open {
            ProbeOutcome::Open
        } else {
            ProbeOutcome::Closed
        }
    }
}

/// Trait for single-port probe implementations.
///
/// Implementations must release any socket they open on every exit path
/// and must return within roughly `timeout`.
///
/// # Example
///
/// ```ignore
/// use skiff::scanner::{Prober, SocketProber, WorkItem};
///
/// async fn check<P: Prober>(prober: &P, item: WorkItem) -> bool {
///     prober.probe(item.protocol, item.addr(), Duration::from_secs(1)).await.is_open()
/// }
/// ```
#[async_trait]
pub trait Prober: Send + Sync {
    /// Attempt one connection to `addr` over `protocol`.
    async fn probe(&self, protocol: Protocol, addr: SocketAddr, timeout: Duration)
        -> ProbeOutcome;
}
