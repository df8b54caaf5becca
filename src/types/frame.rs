//! SDP and raw SpiNNaker frame codec
//!
//! Two layouts share one UDP port. The discriminator is the big-endian u32 at
//! byte offset 2: if it holds one of the reserved raw command codes the frame
//! is a raw SpiNNaker packet, otherwise it is an addressed SDP frame.
//!
//! ```text
//! raw:        version:u16 cmd_rc:u32 arg1:u32 arg2:u32 arg3:u32 | data...      (18 bytes)
//! addressed:  ip_time_out:u8 pad:u8 flags:u8 tag:u8 dest_port:u8 srce_port:u8
//!             dest_addr:u16 srce_addr:u16 cmd_rc:u16 seq:u16
//!             arg1:u32 arg2:u32 arg3:u32 | data...                        (26 bytes)
//! ```
//!
//! Header fields are big-endian. Payload words are little-endian, the byte
//! order of the hosts that produce them. Bytes past the last whole word are
//! kept so that [`WireFrame::encode`] is an exact inverse of
//! [`WireFrame::decode`].

use super::ChipAddress;
use crate::{Result, VisError};
use tracing::trace;

/// Maximum number of payload words in one frame.
pub const MAX_DATA_WORDS: usize = 364;
/// Maximum datagram size accepted from the wire.
pub const MAX_FRAME_LEN: usize = 1500;
/// Header length of an addressed SDP frame.
pub const SDP_HEADER_LEN: usize = 26;
/// Header length of a raw SpiNNaker frame.
pub const RAW_HEADER_LEN: usize = 18;
/// Bytes needed to read the layout discriminator.
const DISCRIMINATOR_LEN: usize = 6;

/// Discovery frame sent by a board announcing itself.
pub const SPINN_HELLO: u32 = 0x41;
/// Point-to-point SpiNNaker packet.
pub const P2P_SPINN_PACKET: u32 = 0x3A;
/// Stimulus input packet (retina spikes).
pub const STIM_IN_SPINN_PACKET: u32 = 0x49;

/// Which header layout a frame uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameLayout {
    Raw,
    Addressed,
}

/// A decoded SDP or raw SpiNNaker frame.
///
/// Fields that only exist in the addressed layout are zero for raw frames;
/// `version` only exists in the raw layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireFrame {
    pub layout: FrameLayout,
    pub version: Option<u16>,
    pub ip_time_out: u8,
    pub pad: u8,
    pub flags: u8,
    pub tag: u8,
    pub dest_port: u8,
    pub srce_port: u8,
    pub dest_addr: ChipAddress,
    pub srce_addr: ChipAddress,
    pub cmd_rc: u32,
    pub seq: u16,
    pub arg1: u32,
    pub arg2: u32,
    pub arg3: u32,
    pub data: Vec<u32>,
    /// Bytes after the last whole payload word
    pub trailing: Vec<u8>,
}

impl WireFrame {
    /// Build an addressed SDP frame with zeroed routing fields.
    pub fn addressed(cmd_rc: u16, args: [u32; 3], data: Vec<u32>) -> Self {
        Self {
            layout: FrameLayout::Addressed,
            version: None,
            ip_time_out: 0,
            pad: 0,
            flags: 0,
            tag: 0,
            dest_port: 0,
            srce_port: 0,
            dest_addr: ChipAddress::default(),
            srce_addr: ChipAddress::default(),
            cmd_rc: cmd_rc as u32,
            seq: 0,
            arg1: args[0],
            arg2: args[1],
            arg3: args[2],
            data,
            trailing: Vec::new(),
        }
    }

    /// Build a raw SpiNNaker frame.
    pub fn raw(version: u16, cmd_rc: u32, args: [u32; 3], data: Vec<u32>) -> Self {
        Self {
            layout: FrameLayout::Raw,
            version: Some(version),
            cmd_rc,
            ..Self::addressed(0, args, data)
        }
    }

    /// Decode a datagram.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() > MAX_FRAME_LEN {
            return Err(VisError::OversizedFrame { len: buf.len(), max: MAX_FRAME_LEN });
        }
        if buf.len() < DISCRIMINATOR_LEN {
            return Err(VisError::truncated_frame(DISCRIMINATOR_LEN, buf.len()));
        }

        let layout = match be_u32(buf, 2) {
            SPINN_HELLO | P2P_SPINN_PACKET | STIM_IN_SPINN_PACKET => FrameLayout::Raw,
            _ => FrameLayout::Addressed,
        };
        let header_len = match layout {
            FrameLayout::Raw => RAW_HEADER_LEN,
            FrameLayout::Addressed => SDP_HEADER_LEN,
        };
        if buf.len() < header_len {
            return Err(VisError::truncated_frame(header_len, buf.len()));
        }

        let payload = &buf[header_len..];
        let words = payload.chunks_exact(4);
        let trailing = words.remainder().to_vec();
        let data: Vec<u32> =
            words.map(|w| u32::from_le_bytes([w[0], w[1], w[2], w[3]])).collect();
        if data.len() > MAX_DATA_WORDS {
            return Err(VisError::OversizedFrame { len: data.len() * 4, max: MAX_DATA_WORDS * 4 });
        }

        let frame = match layout {
            FrameLayout::Raw => Self {
                version: Some(be_u16(buf, 0)),
                cmd_rc: be_u32(buf, 2),
                arg1: be_u32(buf, 6),
                arg2: be_u32(buf, 10),
                arg3: be_u32(buf, 14),
                trailing,
                ..Self::raw(0, 0, [0; 3], data)
            },
            FrameLayout::Addressed => Self {
                layout,
                version: None,
                ip_time_out: buf[0],
                pad: buf[1],
                flags: buf[2],
                tag: buf[3],
                dest_port: buf[4],
                srce_port: buf[5],
                dest_addr: ChipAddress::from_packed(be_u16(buf, 6)),
                srce_addr: ChipAddress::from_packed(be_u16(buf, 8)),
                cmd_rc: be_u16(buf, 10) as u32,
                seq: be_u16(buf, 12),
                arg1: be_u32(buf, 14),
                arg2: be_u32(buf, 18),
                arg3: be_u32(buf, 22),
                data,
                trailing,
            },
        };

        trace!(
            layout = ?frame.layout,
            cmd_rc = frame.cmd_rc,
            words = frame.data.len(),
            "Decoded frame"
        );
        Ok(frame)
    }

    /// Encode back to wire bytes.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        match self.layout {
            FrameLayout::Raw => {
                out.extend_from_slice(&self.version.unwrap_or(0).to_be_bytes());
                out.extend_from_slice(&self.cmd_rc.to_be_bytes());
            }
            FrameLayout::Addressed => {
                out.extend_from_slice(&[
                    self.ip_time_out,
                    self.pad,
                    self.flags,
                    self.tag,
                    self.dest_port,
                    self.srce_port,
                ]);
                out.extend_from_slice(&self.dest_addr.packed().to_be_bytes());
                out.extend_from_slice(&self.srce_addr.packed().to_be_bytes());
                out.extend_from_slice(&(self.cmd_rc as u16).to_be_bytes());
                out.extend_from_slice(&self.seq.to_be_bytes());
            }
        }
        for arg in [self.arg1, self.arg2, self.arg3] {
            out.extend_from_slice(&arg.to_be_bytes());
        }
        for word in &self.data {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&self.trailing);
        out
    }

    /// Size of the encoded frame in bytes.
    pub fn wire_len(&self) -> usize {
        let header = match self.layout {
            FrameLayout::Raw => RAW_HEADER_LEN,
            FrameLayout::Addressed => SDP_HEADER_LEN,
        };
        header + self.data.len() * 4 + self.trailing.len()
    }

    /// A board announcing itself rather than carrying telemetry.
    pub fn is_discovery(&self) -> bool {
        self.layout == FrameLayout::Raw && self.cmd_rc == SPINN_HELLO
    }

    /// Number of payload bytes that did not form a whole word.
    pub fn trailing_bytes(&self) -> usize {
        self.trailing.len()
    }
}

fn be_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([buf[offset], buf[offset + 1]])
}

fn be_u32(buf: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([buf[offset], buf[offset + 1], buf[offset + 2], buf[offset + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hello_frame_is_discovery() {
        let frame = WireFrame::raw(1, SPINN_HELLO, [0; 3], vec![]);
        let decoded = WireFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.layout, FrameLayout::Raw);
        assert!(decoded.is_discovery());
    }

    #[test]
    fn addressed_header_fields_land_at_fixed_offsets() {
        let mut frame = WireFrame::addressed(64, [1, 2, 3], vec![0xDEADBEEF]);
        frame.flags = 7;
        frame.tag = 255;
        frame.srce_port = 0x21;
        frame.srce_addr = ChipAddress::new(1, 2);
        let bytes = frame.encode();

        assert_eq!(bytes.len(), SDP_HEADER_LEN + 4);
        assert_eq!(bytes[2], 7);
        assert_eq!(bytes[3], 255);
        assert_eq!(&bytes[8..10], &[1, 2]);
        assert_eq!(&bytes[10..12], &[0, 64]);
        assert_eq!(&bytes[26..30], &0xDEADBEEFu32.to_le_bytes());

        let decoded = WireFrame::decode(&bytes).unwrap();
        assert_eq!(decoded, frame);
        assert!(!decoded.is_discovery());
    }

    #[test]
    fn stimulus_packets_use_raw_layout() {
        let frame = WireFrame::raw(0, STIM_IN_SPINN_PACKET, [0; 3], vec![5, 6]);
        let decoded = WireFrame::decode(&frame.encode()).unwrap();
        assert_eq!(decoded.layout, FrameLayout::Raw);
        assert_eq!(decoded.data, vec![5, 6]);
    }

    #[test]
    fn short_buffers_are_truncated_frames() {
        assert!(matches!(
            WireFrame::decode(&[0u8; 3]),
            Err(VisError::TruncatedFrame { needed: 6, actual: 3 })
        ));
        assert!(matches!(
            WireFrame::decode(&[0u8; 20]),
            Err(VisError::TruncatedFrame { needed: SDP_HEADER_LEN, actual: 20 })
        ));
    }

    #[test]
    fn oversized_buffers_are_rejected() {
        let buf = vec![0u8; MAX_FRAME_LEN + 1];
        assert!(matches!(WireFrame::decode(&buf), Err(VisError::OversizedFrame { .. })));
    }

    #[test]
    fn trailing_bytes_survive_encode() {
        let mut bytes = WireFrame::addressed(80, [0; 3], vec![1]).encode();
        bytes.extend_from_slice(&[9, 9]);
        let decoded = WireFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.trailing_bytes(), 2);
        assert_eq!(decoded.data, vec![1]);
        assert_eq!(decoded.encode(), bytes);
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..1600)) {
            let _ = WireFrame::decode(&bytes);
        }

        #[test]
        fn decoded_frames_reencode_exactly(
            bytes in prop::collection::vec(any::<u8>(), SDP_HEADER_LEN..600)
        ) {
            if let Ok(frame) = WireFrame::decode(&bytes) {
                prop_assert_eq!(frame.encode(), bytes);
            }
        }
    }
}
