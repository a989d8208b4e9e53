//! TCP connect probing.
//!
//! Completes the full TCP handshake through the operating system's socket
//! API. Needs no privileges. The stream is dropped as soon as it is
//! established; nothing is read or written.

use crate::error::ProbeError;
use crate::scanner::traits::ProbeOutcome;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Probe one TCP port.
pub async fn probe(addr: SocketAddr, connect_timeout: Duration) -> ProbeOutcome {
    match attempt_connect(addr, connect_timeout).await {
        Ok(stream) => {
            drop(stream);
            ProbeOutcome::Open
        }
        Err(e) => {
            trace!(%addr, error = %e, "tcp probe closed");
            ProbeOutcome::Closed
        }
    }
}

/// Attempt to connect to the target address.
async fn attempt_connect(
    addr: SocketAddr,
    connect_timeout: Duration,
) -> Result<TcpStream, ProbeError> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(classify(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}

/// Map a socket error onto the probe error taxonomy.
pub(crate) fn classify(e: io::Error) -> ProbeError {
    if e.kind() == io::ErrorKind::ConnectionRefused {
        return ProbeError::ConnectionRefused;
    }

    let message = e.to_string();
    if message.to_lowercase().contains("unreachable") {
        ProbeError::Unreachable(message)
    } else {
        ProbeError::Io(e)
    }
}
