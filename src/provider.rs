//! Provider trait for datagram sources

use std::net::SocketAddr;
use std::time::Instant;

use crate::Result;

/// One received datagram and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub source: SocketAddr,
    /// When the bytes were taken off the socket
    pub received_at: Instant,
}

impl Datagram {
    pub fn new(payload: Vec<u8>, source: SocketAddr) -> Self {
        Self { payload, source, received_at: Instant::now() }
    }
}

/// Trait for telemetry sources
///
/// The driver owns exactly one provider and pulls from it until it reports
/// the end of the stream or fails.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Wait for the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - a datagram arrived
    /// - `Ok(None)` - the source closed (normal termination)
    /// - `Err(e)` - transport failure; the driver stops
    async fn next_datagram(&mut self) -> Result<Option<Datagram>>;

    /// Address the source is listening on, if it has one
    fn local_addr(&self) -> Option<SocketAddr>;
}
