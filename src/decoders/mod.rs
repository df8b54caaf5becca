//! Mode-specific payload decoders.
//!
//! A [`Decoder`] is chosen once from the configured [`SimulationMode`] and
//! turns each [`WireFrame`] into an [`UpdateBatch`]: a list of writes for the
//! store to apply under a single lock. Decoders never touch shared state, so
//! they can be tested and benchmarked in isolation.
//!
//! Every index derived from wire data goes through
//! [`checked_index`](crate::mapping::checked_index). An out-of-range index
//! skips that one update with a warning; the rest of the frame still applies.

mod diagnostics;
mod heatmap;
mod rate;
mod retina;
mod spikes;

pub use heatmap::integrator_decay;

use crate::mapping::{CoordinateSpace, checked_index};
use crate::types::{SimulationMode, WireFrame};
use tracing::warn;

/// A single write produced by a decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Update {
    /// Replace the value at `index` in the snapshot and current history row
    Set { index: usize, value: f32 },
    /// Increment the value at `index`, treating an undefined cell as zero
    Count { index: usize },
    /// Replace the bias current of a population
    Bias { index: usize, value: f32 },
    /// Write to the snapshot only, leaving history untouched
    Overlay { index: usize, value: f32 },
    /// Increment a neuron's count in the current raster row
    Raster { neuron: usize },
    /// A neuron was observed firing
    Spike { neuron: u32 },
    /// Leaky integration of `input` against the previous history row
    Integrate { index: usize, input: f32 },
}

/// Everything a decoder produced from one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateBatch {
    pub updates: Vec<Update>,
    /// Updates dropped because their index fell outside the grid
    pub skipped: usize,
    /// The payload ended mid-record and the remainder was ignored
    pub truncated: bool,
}

impl UpdateBatch {
    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    fn push(&mut self, update: Update) {
        self.updates.push(update);
    }

    /// Push an update whose index was computed from wire data.
    fn push_checked(&mut self, index: i64, len: usize, make: impl FnOnce(usize) -> Update) {
        match checked_index(index, len) {
            Ok(index) => self.updates.push(make(index)),
            Err(error) => {
                warn!(%error, "Skipping update outside the grid");
                self.skipped += 1;
            }
        }
    }

    fn set(&mut self, index: i64, len: usize, value: f32) {
        self.push_checked(index, len, |index| Update::Set { index, value });
    }
}

/// Per-frame inputs shared by every decoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeContext {
    pub space: CoordinateSpace,
    /// Display frozen: most modes produce nothing
    pub frozen: bool,
    /// Fractional bits of heat-map fixed-point values
    pub fixed_point_bits: u32,
    /// Sub-core population bits folded into population ids
    pub bits_of_pop_id: u32,
    pub id_offset: u32,
    pub neurons_per_processor: u32,
    pub max_rasterised_neurons: usize,
}

impl DecodeContext {
    /// Context with the stock constants for a given grid.
    pub fn new(space: CoordinateSpace) -> Self {
        Self {
            space,
            frozen: false,
            fixed_point_bits: 16,
            bits_of_pop_id: 0,
            id_offset: 0,
            neurons_per_processor: 2048,
            max_rasterised_neurons: 1024,
        }
    }

    /// Same context with the freeze flag replaced.
    pub fn with_frozen(self, frozen: bool) -> Self {
        Self { frozen, ..self }
    }

    fn grid_len(&self) -> usize {
        self.space.len()
    }

    /// Flat index of the first cell of the chip that sent `frame`.
    fn source_chip_base(&self, frame: &WireFrame) -> i64 {
        let tile =
            frame.srce_addr.x as i64 * self.space.y_chips() as i64 + frame.srce_addr.y as i64;
        tile * self.space.chip_len() as i64
    }

    /// Population index for a routing key `x:8 y:8 core:5 ... pop:2 ...`.
    fn population_from_key(&self, key: u32) -> i64 {
        let x = (key >> 24) as i64;
        let y = ((key >> 16) & 0xFF) as i64;
        let mut population = ((key >> 11) & 0xF) as i64;
        if self.bits_of_pop_id > 0 {
            population <<= self.bits_of_pop_id;
            population += ((key >> 4) & 0x3) as i64;
        }
        self.space.chip_len() as i64 * (x * self.space.y_chips() as i64 + y) + population
    }
}

/// Payload interpretation, one arm per simulation mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    Retina,
    SevilleRetina,
    Retina2,
    Cochlea,
    RatePlotLegacy,
    Mar12Raster,
    SpikeReceive,
    RatePlot,
    HeatMap,
    LinkCheck,
    CpuUtil,
    ChipTemperature,
    IntegratorFg,
}

impl From<SimulationMode> for Decoder {
    fn from(mode: SimulationMode) -> Self {
        match mode {
            SimulationMode::Retina => Decoder::Retina,
            SimulationMode::SevilleRetina => Decoder::SevilleRetina,
            SimulationMode::Retina2 => Decoder::Retina2,
            SimulationMode::Cochlea => Decoder::Cochlea,
            SimulationMode::RatePlotLegacy => Decoder::RatePlotLegacy,
            SimulationMode::Mar12Raster => Decoder::Mar12Raster,
            SimulationMode::SpikeReceive => Decoder::SpikeReceive,
            SimulationMode::RatePlot => Decoder::RatePlot,
            SimulationMode::HeatMap => Decoder::HeatMap,
            SimulationMode::LinkCheck => Decoder::LinkCheck,
            SimulationMode::CpuUtil => Decoder::CpuUtil,
            SimulationMode::ChipTemperature => Decoder::ChipTemperature,
            SimulationMode::IntegratorFg => Decoder::IntegratorFg,
        }
    }
}

impl Decoder {
    /// Whether this decoder still produces updates while the display is frozen.
    pub fn observes_while_frozen(self) -> bool {
        matches!(self, Decoder::SpikeReceive | Decoder::LinkCheck)
    }

    /// Decode one frame.
    pub fn decode(self, frame: &WireFrame, ctx: &DecodeContext) -> UpdateBatch {
        let mut batch = UpdateBatch::default();
        if ctx.frozen && !self.observes_while_frozen() {
            return batch;
        }
        match self {
            Decoder::Retina => retina::raw_retina(frame, ctx, &mut batch),
            Decoder::SevilleRetina => retina::seville_retina(frame, ctx, &mut batch),
            Decoder::Retina2 => retina::seville_retina_keys(frame, ctx, &mut batch),
            Decoder::Cochlea => spikes::cochlea(frame, ctx, &mut batch),
            Decoder::RatePlotLegacy => rate::legacy_rate_plot(frame, ctx, &mut batch),
            Decoder::Mar12Raster => rate::mar12_raster(frame, ctx, &mut batch),
            Decoder::SpikeReceive => spikes::spike_receive(frame, ctx, &mut batch),
            Decoder::RatePlot => rate::rate_plot(frame, ctx, &mut batch),
            Decoder::HeatMap => heatmap::heat_map(frame, ctx, &mut batch),
            Decoder::LinkCheck => diagnostics::link_check(frame, ctx, &mut batch),
            Decoder::CpuUtil => diagnostics::cpu_utilisation(frame, ctx, &mut batch),
            Decoder::ChipTemperature => diagnostics::chip_temperature(frame, ctx, &mut batch),
            Decoder::IntegratorFg => heatmap::integrator(frame, ctx, &mut batch),
        }
        batch
    }
}

/// Iterate `(key, value)` word pairs, flagging a dangling key as truncation.
fn word_pairs<'a>(
    data: &'a [u32],
    batch: &mut UpdateBatch,
) -> impl Iterator<Item = (u32, u32)> + use<'a> {
    if data.len() % 2 != 0 {
        batch.truncated = true;
    }
    data.chunks_exact(2).map(|pair| (pair[0], pair[1]))
}
