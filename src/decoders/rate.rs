//! Population rate plots and the key/value raster.

use super::{DecodeContext, Update, UpdateBatch, word_pairs};
use crate::mapping::checked_index;
use crate::types::WireFrame;
use tracing::warn;

const LEGACY_RASTER: u32 = 256;
const LEGACY_RATE: u32 = 257;
const MAR12_RASTER: u32 = 80;
const RATE: u32 = 64;
const BIAS: u32 = 65;
const MEMBRANE_POTENTIAL: u32 = 66;

/// Old firmware: the population is the source core, the payload either
/// firing counts (257) or raster neuron ids (256).
pub(super) fn legacy_rate_plot(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let space = &ctx.space;
    let core_population = (frame.srce_port & 0x1F) as i64 - 1;
    let (x, y) = (frame.srce_addr.x as i64, frame.srce_addr.y as i64);
    let population =
        space.chip_len() as i64 * (y * space.x_chips() as i64 + x) + core_population;

    match frame.cmd_rc {
        LEGACY_RATE => {
            let bias = frame.arg1 as f32 / 256.0;
            batch.push_checked(population, ctx.grid_len(), |index| Update::Bias {
                index,
                value: bias,
            });

            let samples = (frame.arg2 as u64 + 1) * frame.arg3 as u64;
            if samples == 0 {
                warn!(population, "Rate frame reports zero neurons per population");
                return;
            }
            for &spikes in &frame.data {
                let rate = (spikes as f64 * 1000.0 / samples as f64) as f32;
                batch.set(population, ctx.grid_len(), rate);
            }
        }
        LEGACY_RASTER => {
            for &word in &frame.data {
                let neuron = word & 0xFF;
                if (neuron as usize) < ctx.max_rasterised_neurons {
                    batch.push(Update::Raster { neuron: neuron as usize });
                    batch.push(Update::Spike { neuron });
                }
            }
        }
        _ => {}
    }
}

pub(super) fn mar12_raster(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    if frame.cmd_rc != MAR12_RASTER {
        return;
    }
    for (key, value) in word_pairs(&frame.data, batch) {
        batch.set(ctx.population_from_key(key), ctx.grid_len(), value as f32);
    }
}

pub(super) fn rate_plot(frame: &WireFrame, ctx: &DecodeContext, batch: &mut UpdateBatch) {
    let command = frame.cmd_rc;
    if !matches!(command, RATE | BIAS | MEMBRANE_POTENTIAL) {
        return;
    }
    for (key, value) in word_pairs(&frame.data, batch) {
        let population = match checked_index(ctx.population_from_key(key), ctx.grid_len()) {
            Ok(population) => population,
            Err(error) => {
                warn!(%error, command, "Skipping population outside the grid");
                batch.skipped += 1;
                continue;
            }
        };
        match command {
            RATE => batch.push(Update::Set { index: population, value: value as f32 }),
            BIAS => batch.push(Update::Bias { index: population, value: value as f32 / 256.0 }),
            _ => {
                let potential = (value as u16 as i16) as f32 / 256.0;
                batch.push(Update::Set { index: 0, value: potential });
            }
        }
    }
}
