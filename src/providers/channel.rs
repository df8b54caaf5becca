//! In-process provider fed through a channel

use std::net::SocketAddr;
use tokio::sync::mpsc;

use crate::provider::{Datagram, Provider};
use crate::Result;

/// Provider backed by an mpsc channel.
///
/// Dropping every [`mpsc::Sender`] ends the stream. Used to drive the
/// receive loop without a socket.
#[derive(Debug)]
pub struct ChannelProvider {
    rx: mpsc::Receiver<Datagram>,
}

impl ChannelProvider {
    pub fn new(capacity: usize) -> (mpsc::Sender<Datagram>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait::async_trait]
impl Provider for ChannelProvider {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        Ok(self.rx.recv().await)
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_ends_when_senders_drop() {
        let (tx, mut provider) = ChannelProvider::new(4);
        tx.send(Datagram::new(vec![7], "127.0.0.1:9".parse().unwrap())).await.unwrap();
        drop(tx);
        assert_eq!(provider.next_datagram().await.unwrap().unwrap().payload, vec![7]);
        assert!(provider.next_datagram().await.unwrap().is_none());
    }
}
