//! Simulation modes understood by the decoders

use serde::{Deserialize, Serialize};

/// The payload interpretation selected once at startup.
///
/// Each variant corresponds to one simulation application running on the
/// board, and therefore to one arm of [`crate::decoders::Decoder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationMode {
    /// Raw retina spikes, one neuron id per word
    Retina,
    /// Seville retina column dumps, two pixels per word
    SevilleRetina,
    /// Seville retina routing keys folded into the grid
    Retina2,
    /// Silicon cochlea spikes
    Cochlea,
    /// Per-population firing counts and raster spikes (old firmware)
    RatePlotLegacy,
    /// March 2012 key/value raster
    Mar12Raster,
    /// Spike receipt markers
    SpikeReceive,
    /// Population rates, bias currents and membrane potential
    RatePlot,
    /// Heat diffusion demo, fixed-point temperatures per core
    #[default]
    HeatMap,
    /// Inter-chip link check
    LinkCheck,
    /// Per-core CPU utilisation
    CpuUtil,
    /// On-chip temperature sensors
    ChipTemperature,
    /// Leaky integrator / function generator
    IntegratorFg,
}

impl SimulationMode {
    /// Every mode, in configuration order.
    pub const ALL: [SimulationMode; 13] = [
        SimulationMode::Retina,
        SimulationMode::SevilleRetina,
        SimulationMode::Retina2,
        SimulationMode::Cochlea,
        SimulationMode::RatePlotLegacy,
        SimulationMode::Mar12Raster,
        SimulationMode::SpikeReceive,
        SimulationMode::RatePlot,
        SimulationMode::HeatMap,
        SimulationMode::LinkCheck,
        SimulationMode::CpuUtil,
        SimulationMode::ChipTemperature,
        SimulationMode::IntegratorFg,
    ];

    /// Whether this mode produces spike events worth a NeuroTools recording.
    pub fn emits_spikes(self) -> bool {
        matches!(self, SimulationMode::Retina | SimulationMode::RatePlotLegacy)
    }
}
