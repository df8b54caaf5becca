//! Chip addressing for SDP frames

use serde::{Deserialize, Serialize};

/// Address of a SpiNNaker chip, packed on the wire as `x << 8 | y`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChipAddress {
    pub x: u8,
    pub y: u8,
}

impl ChipAddress {
    /// Create an address from chip coordinates.
    pub const fn new(x: u8, y: u8) -> Self {
        Self { x, y }
    }

    /// Unpack a wire address (high byte X, low byte Y).
    pub const fn from_packed(packed: u16) -> Self {
        Self { x: (packed >> 8) as u8, y: (packed & 0xFF) as u8 }
    }

    /// Pack into the 16-bit wire representation.
    pub const fn packed(self) -> u16 {
        ((self.x as u16) << 8) | self.y as u16
    }
}

impl From<u16> for ChipAddress {
    fn from(packed: u16) -> Self {
        Self::from_packed(packed)
    }
}

impl From<ChipAddress> for u16 {
    fn from(address: ChipAddress) -> Self {
        address.packed()
    }
}

impl std::fmt::Display for ChipAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
