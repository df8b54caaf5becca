//! Retina family: raw stimulus spikes and the Seville retina variants.

use super::{DecodeContext, Update, UpdateBatch};
use crate::types::WireFrame;
use crate::types::frame::{FrameLayout, STIM_IN_SPINN_PACKET};

/// Command code of a Seville retina column dump.
const SEVILLE_COLUMN: u32 = 0x4943;
/// Neurons addressable by one core's key space.
const CORE_KEY_SPACE: u64 = 0x800;

pub(super) fn raw_retina(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    if frame.layout != FrameLayout::Raw || frame.cmd_rc != STIM_IN_SPINN_PACKET {
        return;
    }
    for &word in &frame.data {
        let neuron = word & 0xFF;
        batch.push_checked(neuron as i64, ctx.grid_len(), |index| Update::Count { index });
        batch.push(Update::Spike { neuron });
    }
}

/// Column of pixels, two signed 16-bit values per word.
pub(super) fn seville_retina(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    if frame.cmd_rc != SEVILLE_COLUMN {
        return;
    }
    let column_base = frame.arg1 as i64 * frame.arg2 as i64;
    for (i, &word) in frame.data.iter().enumerate() {
        let pixel = column_base + 2 * i as i64;
        batch.set(pixel, ctx.grid_len(), (word & 0xFFFF) as u16 as i16 as f32);
        batch.set(pixel + 1, ctx.grid_len(), (word >> 16) as u16 as i16 as f32);
    }
}

/// Routing keys folded into the grid; each neuron cell receives its own
/// X and the following cell its Y.
pub(super) fn seville_retina_keys(
    frame: &WireFrame,
    ctx: &DecodeContext,
    batch: &mut UpdateBatch,
) {
    let total = ctx.grid_len() as u64;
    let x_dim = ctx.space.x_dim() as u64;
    let per_core = ctx.neurons_per_processor as u64;
    for &word in &frame.data {
        let key = (word & 0xFFFF) as u64 + ctx.id_offset as u64;
        let neuron = (key % CORE_KEY_SPACE + key / CORE_KEY_SPACE * per_core) % total;
        let (x, y) = (neuron % x_dim, neuron / x_dim);
        batch.set(neuron as i64, ctx.grid_len(), x as f32);
        batch.set(neuron as i64 + 1, ctx.grid_len(), y as f32);
    }
}

#[cfg(test)]
mod tests {
    use super::super::Decoder;
    use super::super::tests::ctx_4x4;
    use super::*;

    #[test]
    fn raw_retina_counts_low_byte_and_reports_spikes() {
        let frame = WireFrame::raw(1, STIM_IN_SPINN_PACKET, [0; 3], vec![0x0103, 0x0203]);
        let batch = Decoder::Retina.decode(&frame, &ctx_4x4());
        assert_eq!(
            batch.updates,
            vec![
                Update::Count { index: 3 },
                Update::Spike { neuron: 3 },
                Update::Count { index: 3 },
                Update::Spike { neuron: 3 },
            ]
        );
    }

    #[test]
    fn raw_retina_ignores_other_commands() {
        let frame = WireFrame::raw(1, 0x3A, [0; 3], vec![1]);
        assert!(Decoder::Retina.decode(&frame, &ctx_4x4()).is_empty());
    }

    #[test]
    fn out_of_grid_spike_still_reported() {
        let frame = WireFrame::raw(1, STIM_IN_SPINN_PACKET, [0; 3], vec![200]);
        let batch = Decoder::Retina.decode(&frame, &ctx_4x4());
        assert_eq!(batch.skipped, 1);
        assert_eq!(batch.updates, vec![Update::Spike { neuron: 200 }]);
    }

    #[test]
    fn seville_column_splits_signed_pairs() {
        let word = ((-2i16 as u16 as u32) << 16) | 5;
        let frame = WireFrame::addressed(0x4943, [1, 4, 4], vec![word]);
        let batch = Decoder::SevilleRetina.decode(&frame, &ctx_4x4());
        assert_eq!(
            batch.updates,
            vec![Update::Set { index: 4, value: 5.0 }, Update::Set { index: 5, value: -2.0 }]
        );
    }

    #[test]
    fn retina_keys_wrap_into_grid() {
        let frame = WireFrame::addressed(0, [0; 3], vec![0x0806]);
        // key 0x806: 6 + 1 * 2048 = 2054, wrapped into 16 cells = 6
        let batch = Decoder::SevilleRetina.decode(&frame, &ctx_4x4());
        assert!(batch.is_empty());
        let batch = Decoder::Retina2.decode(&frame, &ctx_4x4());
        assert_eq!(
            batch.updates,
            vec![Update::Set { index: 6, value: 2.0 }, Update::Set { index: 7, value: 1.0 }]
        );
    }
}
