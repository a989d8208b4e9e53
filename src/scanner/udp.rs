//! UDP probing.
//!
//! Sends one empty datagram from a connected, ephemeral socket and waits for
//! either a reply or a connection-refused signal (the OS surfaces ICMP port
//! unreachable as `ECONNREFUSED` on a connected UDP socket).
//!
//! # Accuracy
//!
//! Silence until the timeout is reported as open. A listener that ignores
//! empty datagrams and a firewall that drops them look identical from here,
//! so filtered ports show up as open. No ICMP-based correction and no
//! confirmation read is attempted.

use crate::error::ProbeError;
use crate::scanner::tcp::classify;
use crate::scanner::traits::ProbeOutcome;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use tracing::trace;

/// Scratch space for a reply; the contents are discarded.
const RECV_BUFFER_SIZE: usize = 512;

/// Probe one UDP port.
pub async fn probe(addr: SocketAddr, response_timeout: Duration) -> ProbeOutcome {
    match exchange(addr, response_timeout).await {
        Ok(()) => ProbeOutcome::Open,
        Err(ProbeError::Timeout) => {
            trace!(%addr, "udp probe silent, assuming open");
            ProbeOutcome::Open
        }
        Err(e) => {
            trace!(%addr, error = %e, "udp probe closed");
            ProbeOutcome::Closed
        }
    }
}

/// Send an empty datagram and wait for any answer.
///
/// `Ok` means a datagram came back; `Err(Timeout)` means nothing did.
async fn exchange(addr: SocketAddr, response_timeout: Duration) -> Result<(), ProbeError> {
    let local: SocketAddr = if addr.is_ipv4() {
        (Ipv4Addr::UNSPECIFIED, 0).into()
    } else {
        (Ipv6Addr::UNSPECIFIED, 0).into()
    };

    let socket = UdpSocket::bind(local).await.map_err(classify)?;
    socket.connect(addr).await.map_err(classify)?;
    socket.send(&[]).await.map_err(classify)?;

    let mut buf = [0u8; RECV_BUFFER_SIZE];
    match timeout(response_timeout, socket.recv(&mut buf)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(classify(e)),
        Err(_) => Err(ProbeError::Timeout),
    }
}
