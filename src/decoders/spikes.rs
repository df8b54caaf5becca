//! Spike markers: cochlea channels and plain spike receipt.

use super::{DecodeContext, Update, UpdateBatch};
use crate::types::WireFrame;

const COCHLEA_CELLS: i64 = 4;
const COCHLEA_CHANNELS: i64 = 64;

pub(super) fn cochlea(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let Some(&word) = frame.data.first() else {
        batch.truncated = true;
        return;
    };
    let neuron = (word % 0x800) as i64;
    let core = ((word >> 11) % 0x20) as i64;
    let x = (core - 1) * COCHLEA_CELLS + neuron % COCHLEA_CELLS;
    let y = neuron / COCHLEA_CELLS;
    batch.push_checked(x * COCHLEA_CHANNELS + y, ctx.grid_len(), |index| Update::Count {
        index,
    });
}

/// One marker per received spike, regardless of freeze.
pub(super) fn spike_receive(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    for &word in &frame.data {
        // Low 11 bits; the 0x8FF mask older hosts used loses bits 8 to 10
        batch.set((word & 0x7FF) as i64, ctx.grid_len(), 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::super::Decoder;
    use super::*;
    use crate::mapping::CoordinateSpace;

    fn cochlea_ctx() -> DecodeContext {
        DecodeContext::new(CoordinateSpace::new(64, 64, 4, 4).unwrap())
    }

    #[test]
    fn cochlea_places_cell_and_channel() {
        // core 2, neuron 9: x = 4 + 1, y = 2
        let word = (2 << 11) | 9;
        let frame = WireFrame::addressed(0, [0; 3], vec![word, 0xFFFF_FFFF]);
        let batch = Decoder::Cochlea.decode(&frame, &cochlea_ctx());
        assert_eq!(batch.updates, vec![Update::Count { index: 5 * 64 + 2 }]);
    }

    #[test]
    fn cochlea_core_zero_is_skipped() {
        let frame = WireFrame::addressed(0, [0; 3], vec![1]);
        let batch = Decoder::Cochlea.decode(&frame, &cochlea_ctx());
        assert!(batch.is_empty());
        assert_eq!(batch.skipped, 1);
    }

    #[test]
    fn cochlea_without_payload_is_truncated() {
        let frame = WireFrame::addressed(0, [0; 3], vec![]);
        assert!(Decoder::Cochlea.decode(&frame, &cochlea_ctx()).truncated);
    }

    #[test]
    fn spike_receive_masks_neuron_id() {
        let frame = WireFrame::addressed(0, [0; 3], vec![0x0102_0805]);
        let batch = Decoder::SpikeReceive.decode(&frame, &cochlea_ctx());
        assert_eq!(batch.updates, vec![Update::Set { index: 5, value: 1.0 }]);
    }
}
