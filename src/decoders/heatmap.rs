//! Per-chip analogue values: the heat diffusion demo and the leaky integrator.

use super::{DecodeContext, Update, UpdateBatch};
use crate::types::WireFrame;

/// Simulation time step of the integrator, in seconds.
const INTEGRATOR_DT: f64 = 0.001;
/// Integrator time constant, in seconds.
const INTEGRATOR_TAU: f64 = 0.03;

/// Decay applied to the previous integrator value each step.
pub fn integrator_decay() -> f32 {
    (-INTEGRATOR_DT / INTEGRATOR_TAU).exp() as f32
}

/// One unsigned fixed-point temperature per core of the sending chip.
pub(super) fn heat_map(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let base = ctx.source_chip_base(frame);
    let scale = 2f64.powi(ctx.fixed_point_bits as i32);
    for (i, &word) in frame.data.iter().enumerate() {
        let value = (word as f64 / scale) as f32;
        batch.set(base + i as i64, ctx.grid_len(), value);
    }
}

pub(super) fn integrator(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let Some(&word) = frame.data.first() else {
        batch.truncated = true;
        return;
    };
    let input = (1.0 + word as i32 as f64 / 256.0) * (INTEGRATOR_DT / INTEGRATOR_TAU);
    batch.push_checked(ctx.source_chip_base(frame), ctx.grid_len(), |index| {
        Update::Integrate { index, input: input as f32 }
    });
}
