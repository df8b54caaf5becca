//! Visualiser configuration.
//!
//! A [`VisualiserConfig`] is read from YAML. Every field has a default, so an
//! empty document yields the stock 32x32 heat map listening on port 17894.
//!
//! ```rust
//! use sdpvis::{SimulationMode, VisualiserConfig};
//!
//! let config = VisualiserConfig::from_yaml_str(
//!     "mode: cpu_util\nx_dimensions: 8\ny_dimensions: 8\n",
//! )
//! .unwrap();
//! assert_eq!(config.mode, SimulationMode::CpuUtil);
//! assert_eq!(config.validate().unwrap().len(), 64);
//! ```

use crate::decoders::DecodeContext;
use crate::mapping::{CoordinateSpace, Transform};
use crate::sender::EdgeValues;
use crate::store::{HI_WATER, LO_WATER, StoreSettings};
use crate::types::SimulationMode;
use crate::{Result, VisError};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::Path;
use std::time::Duration;

/// Default UDP port the board sends telemetry to.
pub const SDP_PORT: u16 = 17894;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualiserConfig {
    pub title: String,
    pub mode: SimulationMode,
    pub x_dimensions: usize,
    pub y_dimensions: usize,
    pub each_chip_x: usize,
    pub each_chip_y: usize,
    /// Rows in the history ring
    pub history_size: usize,
    pub max_rasterised_neurons: usize,
    /// Seconds of history shown across the plot
    pub time_window_secs: f64,
    pub plot_width_pixels: u32,
    pub hi_water: f32,
    pub lo_water: f32,
    pub sdp_port: u16,
    pub fixed_point_bits: u32,
    pub bits_of_pop_id: u32,
    /// Increment applied when an edge value is nudged
    pub alter_step: f32,
    pub id_offset: u32,
    pub neurons_per_processor: u32,
    /// Cleared history rows hold 0.0 instead of the undefined sentinel
    pub init_zero: bool,
    /// Upper bound on view refreshes per second, 0 for unbounded
    pub max_frame_rate: u32,
    /// Board to address before it has introduced itself
    pub board_address: Option<IpAddr>,
    pub broadcast_to_all_chips: bool,
    pub transform: Transform,
    /// Edge values the heat-map controls start from
    pub edges: EdgeValues,
}

impl Default for VisualiserConfig {
    fn default() -> Self {
        Self {
            title: "NO SIMULATION TITLE SUPPLIED".to_string(),
            mode: SimulationMode::default(),
            x_dimensions: 32,
            y_dimensions: 32,
            each_chip_x: 4,
            each_chip_y: 4,
            history_size: 3500,
            max_rasterised_neurons: 1024,
            time_window_secs: 3.5,
            plot_width_pixels: 630,
            hi_water: HI_WATER,
            lo_water: LO_WATER,
            sdp_port: SDP_PORT,
            fixed_point_bits: 16,
            bits_of_pop_id: 0,
            alter_step: 1.0,
            id_offset: 0,
            neurons_per_processor: 2048,
            init_zero: false,
            max_frame_rate: 25,
            board_address: None,
            broadcast_to_all_chips: false,
            transform: Transform::default(),
            edges: EdgeValues::default(),
        }
    }
}

impl VisualiserConfig {
    /// Read and validate a YAML configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| VisError::file_error(path, e))?;
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml_ng::from_str(yaml).map_err(|e| VisError::config(e.to_string()))?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the geometry and sizes, returning the grid they describe.
    pub fn validate(&self) -> Result<CoordinateSpace> {
        if self.history_size == 0 {
            return Err(VisError::config("history_size must be non-zero"));
        }
        if self.max_rasterised_neurons == 0 {
            return Err(VisError::config("max_rasterised_neurons must be non-zero"));
        }
        if !(self.time_window_secs.is_finite() && self.time_window_secs > 0.0) {
            return Err(VisError::config(format!(
                "time_window_secs must be positive, got {}",
                self.time_window_secs
            )));
        }
        if self.plot_width_pixels == 0 {
            return Err(VisError::config("plot_width_pixels must be non-zero"));
        }
        self.quantum()?;
        if self.neurons_per_processor == 0 {
            return Err(VisError::config("neurons_per_processor must be non-zero"));
        }
        if self.fixed_point_bits > 31 {
            return Err(VisError::config(format!(
                "fixed_point_bits must be at most 31, got {}",
                self.fixed_point_bits
            )));
        }
        CoordinateSpace::new(
            self.x_dimensions,
            self.y_dimensions,
            self.each_chip_x,
            self.each_chip_y,
        )
    }

    /// Wall time covered by one history row.
    pub fn quantum(&self) -> Result<Duration> {
        let secs = self.time_window_secs / f64::from(self.plot_width_pixels);
        Duration::try_from_secs_f64(secs).map_err(|e| {
            VisError::config(format!(
                "time_window_secs {} over {} pixels is not a usable row duration: {e}",
                self.time_window_secs, self.plot_width_pixels
            ))
        })
    }

    pub fn store_settings(&self) -> Result<StoreSettings> {
        let space = self.validate()?;
        Ok(StoreSettings {
            history_rows: self.history_size,
            max_rasterised_neurons: self.max_rasterised_neurons,
            quantum: self.quantum()?,
            init_zero: self.init_zero,
            hi_water: self.hi_water,
            lo_water: self.lo_water,
            transform: self.transform,
            ..StoreSettings::new(space)
        })
    }

    pub fn decode_context(&self) -> Result<DecodeContext> {
        let space = self.validate()?;
        Ok(DecodeContext {
            fixed_point_bits: self.fixed_point_bits,
            bits_of_pop_id: self.bits_of_pop_id,
            id_offset: self.id_offset,
            neurons_per_processor: self.neurons_per_processor,
            max_rasterised_neurons: self.max_rasterised_neurons,
            ..DecodeContext::new(space)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_gives_defaults() {
        let config = VisualiserConfig::from_yaml_str("").unwrap();
        assert_eq!(config, VisualiserConfig::default());
        let space = config.validate().unwrap();
        assert_eq!((space.x_chips(), space.y_chips()), (8, 8));
        assert_eq!(config.sdp_port, 17894);
    }

    #[test]
    fn partial_document_keeps_other_defaults() {
        let yaml = r#"
title: Heat demo
mode: heat_map
x_dimensions: 4
y_dimensions: 4
each_chip_x: 2
each_chip_y: 2
board_address: 192.168.240.1
transform:
  x_flip: true
"#;
        let config = VisualiserConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.title, "Heat demo");
        assert_eq!(config.history_size, 3500);
        assert_eq!(config.board_address, Some("192.168.240.1".parse().unwrap()));
        assert!(config.transform.x_flip);
        assert!(!config.transform.rotate);
        assert_eq!(config.edges, EdgeValues::default());
    }

    #[test]
    fn inexact_tiling_is_rejected() {
        let err = VisualiserConfig::from_yaml_str("x_dimensions: 30\n").unwrap_err();
        assert!(matches!(err, VisError::Config { .. }), "got {err:?}");
    }

    #[test]
    fn unknown_mode_is_a_config_error() {
        let err = VisualiserConfig::from_yaml_str("mode: oscilloscope\n").unwrap_err();
        assert!(matches!(err, VisError::Config { .. }));
    }

    #[test]
    fn zero_sizes_are_rejected() {
        for yaml in ["history_size: 0\n", "plot_width_pixels: 0\n", "time_window_secs: -1.0\n"] {
            assert!(VisualiserConfig::from_yaml_str(yaml).is_err(), "{yaml} accepted");
        }
    }

    #[test]
    fn unrepresentable_row_duration_is_rejected() {
        let err = VisualiserConfig::from_yaml_str("time_window_secs: 1.0e300
").unwrap_err();
        assert!(matches!(err, VisError::Config { .. }), "got {err:?}");

        let config = VisualiserConfig { time_window_secs: 1.0e300, ..VisualiserConfig::default() };
        assert!(config.quantum().is_err());
        assert!(config.store_settings().is_err());
    }

    #[test]
    fn derived_settings_follow_the_config() {
        let config = VisualiserConfig {
            x_dimensions: 4,
            y_dimensions: 4,
            each_chip_x: 2,
            each_chip_y: 2,
            history_size: 10,
            init_zero: true,
            fixed_point_bits: 8,
            bits_of_pop_id: 2,
            ..VisualiserConfig::default()
        };
        let settings = config.store_settings().unwrap();
        assert_eq!(settings.history_rows, 10);
        assert!(settings.init_zero);
        assert_eq!(settings.quantum, Duration::from_secs_f64(3.5 / 630.0));

        let ctx = config.decode_context().unwrap();
        assert_eq!(ctx.fixed_point_bits, 8);
        assert_eq!(ctx.bits_of_pop_id, 2);
        assert!(!ctx.frozen);
        assert_eq!(ctx.space.len(), 16);
    }

    #[test]
    fn load_reads_yaml_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "mode: chip_temperature\nmax_frame_rate: 0").unwrap();
        let config = VisualiserConfig::load(file.path()).unwrap();
        assert_eq!(config.mode, SimulationMode::ChipTemperature);
        assert_eq!(config.max_frame_rate, 0);
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = VisualiserConfig::load("/nonexistent/sdpvis.yaml").unwrap_err();
        assert!(matches!(err, VisError::File { .. }));
    }

    #[test]
    fn serialised_config_parses_back() {
        let config = VisualiserConfig { mode: SimulationMode::Retina, ..Default::default() };
        let yaml = serde_yaml_ng::to_string(&config).unwrap();
        assert_eq!(VisualiserConfig::from_yaml_str(&yaml).unwrap(), config);
    }
}
