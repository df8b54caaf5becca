//! Datagram providers

mod channel;
mod udp;

pub use channel::ChannelProvider;
pub use udp::{MTU, UdpProvider};
