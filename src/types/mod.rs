//! Core types shared across the crate.
//!
//! - [`WireFrame`] is one decoded datagram in either the raw SpiNNaker or the
//!   addressed SDP layout
//! - [`ChipAddress`] packs chip coordinates into the 16-bit wire form
//! - [`SimulationMode`] selects how payloads are interpreted
//! - [`RefreshRate`] and [`ReplaySpeed`] control the pace of consumers and replay

mod address;
pub mod frame;
mod mode;
mod refresh_rate;
mod replay_speed;

pub use address::ChipAddress;
pub use frame::{FrameLayout, WireFrame};
pub use mode::SimulationMode;
pub use refresh_rate::RefreshRate;
pub use replay_speed::ReplaySpeed;
