//! Live UDP provider

use std::io;
use std::net::SocketAddr;
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

use crate::provider::{Datagram, Provider};
use crate::{Result, VisError};

/// Largest datagram read off the socket.
pub const MTU: usize = 1515;

/// Provider that listens for SDP telemetry on a UDP port.
#[derive(Debug)]
pub struct UdpProvider {
    socket: UdpSocket,
    local: SocketAddr,
    buf: Box<[u8; MTU]>,
    received: u64,
}

impl UdpProvider {
    /// Bind the listening socket.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await.map_err(|e| {
            VisError::transport_with_source(format!("failed to bind listener on {addr}"), e)
        })?;
        Self::from_socket(socket)
    }

    /// Wrap a socket that is already bound.
    pub fn from_socket(socket: UdpSocket) -> Result<Self> {
        let local = socket
            .local_addr()
            .map_err(|e| VisError::transport_with_source("listener has no local address", e))?;
        info!(%local, "Listening for SDP telemetry");
        Ok(Self { socket, local, buf: Box::new([0u8; MTU]), received: 0 })
    }

    pub fn received(&self) -> u64 {
        self.received
    }
}

/// Errors that mean the socket has gone away rather than failed.
fn is_closed(err: &io::Error) -> bool {
    const EBADF: i32 = 9;
    matches!(err.kind(), io::ErrorKind::NotConnected | io::ErrorKind::ConnectionAborted)
        || err.raw_os_error() == Some(EBADF)
}

#[async_trait::async_trait]
impl Provider for UdpProvider {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        match self.socket.recv_from(&mut self.buf[..]).await {
            Ok((len, source)) => {
                self.received += 1;
                trace!(len, %source, "Datagram received");
                Ok(Some(Datagram::new(self.buf[..len].to_vec(), source)))
            }
            Err(e) if is_closed(&e) => {
                debug!(error = %e, "Listening socket closed");
                Ok(None)
            }
            Err(e) => Err(VisError::transport_with_source("receive failed", e)),
        }
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        Some(self.local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn receives_bytes_and_source() {
        let mut provider = UdpProvider::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let target = provider.local_addr().unwrap();
        let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        board.send_to(&[1, 2, 3, 4, 5, 6], target).await.unwrap();

        let datagram = provider.next_datagram().await.unwrap().unwrap();
        assert_eq!(datagram.payload, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(datagram.source, board.local_addr().unwrap());
        assert_eq!(provider.received(), 1);
    }

    #[test]
    fn closed_socket_errors_end_the_stream() {
        assert!(is_closed(&io::Error::from(io::ErrorKind::NotConnected)));
        assert!(is_closed(&io::Error::from(io::ErrorKind::ConnectionAborted)));
        assert!(is_closed(&io::Error::from_raw_os_error(9)));
        assert!(!is_closed(&io::Error::from(io::ErrorKind::PermissionDenied)));
    }
}
