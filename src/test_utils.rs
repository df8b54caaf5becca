//! Test utilities shared by unit tests and benches
//!
//! Builders for the frames, grids and capture files the tests keep needing.

#![cfg(any(test, feature = "benchmark"))]

use std::time::Duration;

use crate::capture::CaptureRecord;
use crate::mapping::CoordinateSpace;
use crate::store::StoreSettings;
use crate::types::{ChipAddress, WireFrame};

/// The 4x4 grid of 2x2 chips most tests use.
pub fn small_grid() -> CoordinateSpace {
    CoordinateSpace::new(4, 4, 2, 2).expect("4x4 grid tiles exactly")
}

/// Store settings with a short ring and a 5 ms row quantum.
pub fn fast_settings(space: CoordinateSpace, rows: usize) -> StoreSettings {
    StoreSettings {
        history_rows: rows,
        max_rasterised_neurons: 16,
        quantum: Duration::from_millis(5),
        ..StoreSettings::new(space)
    }
}

/// Heat-map frame from chip `(x, y)` carrying `words`.
pub fn heat_frame(x: u8, y: u8, words: Vec<u32>) -> WireFrame {
    let mut frame = WireFrame::addressed(0, [0; 3], words);
    frame.srce_addr = ChipAddress::new(x, y);
    frame.flags = 7;
    frame
}

/// Encoded heat-map frame, as it would arrive on the socket.
pub fn heat_datagram(x: u8, y: u8, words: Vec<u32>) -> Vec<u8> {
    heat_frame(x, y, words).encode()
}

/// Fixed-point heat values with 16 fractional bits.
pub fn fixed(value: f32) -> u32 {
    (value * 65536.0) as u32
}

/// A full chip's worth of frames for every chip in `space`, with
/// deterministic varying values.
pub fn heat_sweep(space: &CoordinateSpace) -> Vec<WireFrame> {
    let mut frames = Vec::with_capacity(space.chip_count());
    for tile in 0..space.chip_count() {
        let Some(chip) = space.chip_of(tile) else { continue };
        let words =
            (0..space.chip_len()).map(|i| fixed(((tile * 7 + i * 3) % 50) as f32)).collect();
        frames.push(heat_frame(chip.x, chip.y, words));
    }
    frames
}

/// Raw capture file contents for `(offset_us, payload)` records.
pub fn capture_bytes(records: &[(i64, Vec<u8>)]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for (offset_us, payload) in records {
        let record = CaptureRecord { offset_us: *offset_us, payload: payload.clone() };
        bytes.extend(record.to_bytes().expect("test payloads fit a record"));
    }
    bytes
}
