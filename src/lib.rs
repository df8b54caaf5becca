//! Receive, decode, record and replay SpiNNaker SDP telemetry.
//!
//! `sdpvis` is the headless core of a SpiNNaker simulation visualiser. It
//! listens for SDP frames from a board, decodes their payload according to
//! the running simulation, and keeps a latest-value snapshot plus a
//! time-windowed history that a renderer can draw from.
//!
//! # Features
//!
//! - **Thirteen simulation modes**: heat maps, retinas, cochlea, rate plots,
//!   link checks, CPU and temperature diagnostics
//! - **Single guarded store**: one lock per frame, owned copies for readers
//! - **Capture**: raw `.spinn` recordings and NeuroTools spike files
//! - **Replay**: captures re-sent with their original spacing, at any speed
//! - **Board control**: heat-map edge values, pause, resume and stop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use sdpvis::{LiveConnection, RefreshRate, VisualiserConfig};
//!
//! #[tokio::main]
//! async fn main() -> sdpvis::Result<()> {
//!     let config = VisualiserConfig::load("heat.yaml")?;
//!     let connection = LiveConnection::start(&config).await?;
//!     let mut views = Box::pin(connection.views(RefreshRate::Max(25)));
//!
//!     while let Some(view) = views.next().await {
//!         println!("{} cells defined", view.defined_cells());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod config;
mod error;
pub mod mapping;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Payload interpretation and display state
pub mod decoders;
pub mod store;

// Stream-based receive architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod sender;
pub mod stream;

// Capture and replay files
pub mod capture;

// Core exports
pub use error::*;
pub use types::*;

pub use capture::{CaptureFormat, CaptureReader, CaptureRecorder, CaptureSummary};
pub use config::VisualiserConfig;
pub use decoders::{DecodeContext, Decoder, Update, UpdateBatch};
pub use mapping::{CoordinateSpace, Transform};
pub use sender::{BoardEndpoint, EdgeValues, Sender};
pub use store::{DisplayState, DisplayView, StoreHandle, StoreSettings};

// Main API exports
pub use connection::live::{LiveConnection, ShutdownSummary};
pub use connection::replay::{ReplayConnection, ReplaySummary};
