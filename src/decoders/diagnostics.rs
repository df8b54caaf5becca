//! Board diagnostics: link check, CPU utilisation and chip temperature.

use super::{DecodeContext, Update, UpdateBatch};
use crate::types::WireFrame;

/// Value written for each link a chip has received on.
const LINK_SEEN: f32 = 60.0;

/// Cell offset within a chip for each receive-link bit of `arg1`.
/// Bit 1 (south-west) marks the chip's base cell.
const LINK_CELL: [i64; 6] = [1, 0, 4, 9, 10, 6];

/// Static chip outline drawn under the link markers.
fn link_pattern(cell: usize) -> f32 {
    match cell {
        2 | 3 | 7 | 8 => 0.0,
        c if c > 10 => 0.0,
        5 => 20.0,
        _ => 100.0,
    }
}

/// Draws the chip outline even while frozen; link markers only when live.
pub(super) fn link_check(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let base = ctx.source_chip_base(frame);
    for cell in 0..ctx.space.chip_len() {
        let value = link_pattern(cell);
        batch.push_checked(base + cell as i64, ctx.grid_len(), |index| Update::Overlay {
            index,
            value,
        });
    }
    if ctx.frozen {
        return;
    }
    for (bit, offset) in LINK_CELL.iter().enumerate() {
        if frame.arg1 & (1 << bit) != 0 {
            batch.set(base + offset, ctx.grid_len(), LINK_SEEN);
        }
    }
}

pub(super) fn cpu_utilisation(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let base = ctx.source_chip_base(frame);
    for (i, &word) in frame.data.iter().enumerate() {
        batch.set(base + i as i64, ctx.grid_len(), word as f32);
    }
}

/// Three sensor readings combined into an approximate 0..100 scale.
pub(super) fn chip_temperature(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let (s1, s2, s3) = (frame.arg1 as f64, frame.arg2 as f64, frame.arg3 as f64);
    let value = ((s1 - 6300.0) / 15.0 + (s2 - 9300.0) / 18.0 + (55000.0 - s3) / 450.0 - 80.0) / 1.5;
    batch.set(ctx.source_chip_base(frame), ctx.grid_len(), value as f32);
}
