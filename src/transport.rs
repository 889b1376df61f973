//! Transport abstraction: send a datagram, receive a datagram with a
//! deadline.
//!
//! The client drives exactly one [`Transport`] per instance, sequentially.
//! [`UdpTransport`] is the production implementation: a connected UDP
//! socket bound to one peer.

use crate::error::{Error, Result};
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

/// Datagram transport with per-call deadlines.
pub trait Transport: Send + Sync {
    /// Send one datagram, failing after `deadline`.
    fn send(&self, data: &[u8], deadline: Duration) -> impl Future<Output = Result<()>> + Send;

    /// Receive one datagram, failing after `deadline`.
    fn recv(&self, deadline: Duration) -> impl Future<Output = Result<Bytes>> + Send;

    /// The remote address this transport is bound to.
    fn peer_addr(&self) -> SocketAddr;

    /// The local bind address.
    fn local_addr(&self) -> SocketAddr;
}

/// UDP transport over a connected socket.
#[derive(Debug)]
pub struct UdpTransport {
    socket: tokio::net::UdpSocket,
    peer: SocketAddr,
    local: SocketAddr,
}

impl UdpTransport {
    /// Resolve `address` and connect a UDP socket to it.
    ///
    /// `network` selects the address family: `udp` (either), `udp4`, `udp6`.
    pub async fn connect(network: &str, address: &str) -> Result<Self> {
        let want_v4 = match network {
            "udp" => None,
            "udp4" => Some(true),
            "udp6" => Some(false),
            other => return Err(Error::argument(other, "unknown network")),
        };

        let mut candidates = tokio::net::lookup_host(address)
            .await
            .map_err(|e| Error::Io {
                target: None,
                source: e,
            })?;

        let peer = candidates
            .find(|addr| match want_v4 {
                None => true,
                Some(v4) => addr.is_ipv4() == v4,
            })
            .ok_or_else(|| Error::argument(address, "address did not resolve"))?;

        let bind_addr: SocketAddr = if peer.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        };

        let socket = tokio::net::UdpSocket::bind(bind_addr)
            .await
            .map_err(|e| Error::Io {
                target: Some(peer),
                source: e,
            })?;
        socket.connect(peer).await.map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;

        let local = socket.local_addr().map_err(|e| Error::Io {
            target: Some(peer),
            source: e,
        })?;

        tracing::debug!(peer = %peer, local = %local, "connected UDP transport");

        Ok(Self {
            socket,
            peer,
            local,
        })
    }

    fn timeout_error(&self, elapsed: Duration) -> Error {
        Error::Timeout {
            target: Some(self.peer),
            elapsed,
            request_id: 0,
            retries: 0,
        }
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8], deadline: Duration) -> Result<()> {
        match tokio::time::timeout(deadline, self.socket.send(data)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(Error::Io {
                target: Some(self.peer),
                source: e,
            }),
            Err(_) => Err(self.timeout_error(deadline)),
        }
    }

    async fn recv(&self, deadline: Duration) -> Result<Bytes> {
        let mut buf = vec![0u8; 65535];
        match tokio::time::timeout(deadline, self.socket.recv(&mut buf)).await {
            Ok(Ok(n)) => {
                buf.truncate(n);
                Ok(Bytes::from(buf))
            }
            Ok(Err(e)) => Err(Error::Io {
                target: Some(self.peer),
                source: e,
            }),
            Err(_) => Err(self.timeout_error(deadline)),
        }
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    fn local_addr(&self) -> SocketAddr {
        self.local
    }
}
