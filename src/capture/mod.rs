//! Capture files: recording incoming telemetry and reading it back for replay.

pub mod format;
pub mod reader;
pub mod recorder;

pub use format::{CaptureFormat, CaptureRecord, default_file_name};
pub use reader::CaptureReader;
pub use recorder::{CaptureRecorder, CaptureSummary, RecorderState};
