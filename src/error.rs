//! Error types for SDP telemetry processing.
//!
//! Every fallible operation in the crate returns [`VisError`]. Errors carry
//! structured context and classify themselves so the receive loop can decide
//! whether to skip the offending frame or stop.
//!
//! ## Error Categories
//!
//! - **Transport Errors**: socket bind/receive/send failures (fatal to the loop)
//! - **Decode Errors**: truncated or oversized frames, out-of-range indices
//!   derived from wire data (recoverable, the frame or update is skipped)
//! - **File Errors**: capture/replay file access (fatal to that subsystem only)
//! - **Configuration Errors**: grid geometry that does not tile exactly
//! - **Recorder Errors**: illegal capture state transitions
//!
//! ## Recovery
//!
//! ```rust
//! use sdpvis::VisError;
//!
//! let error = VisError::truncated_frame(26, 12);
//! assert!(error.is_recoverable());
//! for suggestion in error.recovery_suggestions() {
//!     println!("  - {}", suggestion);
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for visualiser operations.
pub type Result<T, E = VisError> = std::result::Result<T, E>;

/// Main error type for visualiser operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum VisError {
    #[error("Transport failure: {reason}")]
    Transport {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Capture file error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Truncated frame: need {needed} bytes, got {actual}")]
    TruncatedFrame { needed: usize, actual: usize },

    #[error("Oversized frame: {len} bytes exceeds {max}")]
    OversizedFrame { len: usize, max: usize },

    #[error("Index {index} outside [0, {len})")]
    IndexOutOfRange { index: i64, len: usize },

    #[error("Decode error in {context}: {details}")]
    Decode { context: String, details: String },

    #[error("Invalid configuration: {reason}")]
    Config { reason: String },

    #[error("Capture format error at record {record}: {details}")]
    Capture { record: usize, details: String },

    #[error("Recorder cannot {operation} while {state}")]
    Recorder { operation: &'static str, state: String },
}

impl VisError {
    /// Returns whether the receive loop may skip this error and carry on.
    pub fn is_recoverable(&self) -> bool {
        match self {
            VisError::TruncatedFrame { .. } => true,
            VisError::OversizedFrame { .. } => true,
            VisError::IndexOutOfRange { .. } => true,
            VisError::Decode { .. } => true,
            VisError::Recorder { .. } => true,
            VisError::Transport { .. } => false,
            VisError::File { .. } => false,
            VisError::Config { .. } => false,
            VisError::Capture { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            VisError::Transport { .. } => vec![
                "Check that no other process is bound to the SDP port",
                "Verify the board is reachable on the network",
                "Restart the receiver",
            ],
            VisError::File { .. } => vec![
                "Check the capture file exists and is readable",
                "Ensure sufficient disk space for recording",
                "Check file permissions",
            ],
            VisError::TruncatedFrame { .. } | VisError::OversizedFrame { .. } => vec![
                "Check the sender produces SDP or raw SpiNNaker frames",
                "Verify nothing else is transmitting to the SDP port",
            ],
            VisError::IndexOutOfRange { .. } => vec![
                "Check the configured grid dimensions match the simulation",
                "Verify the simulation mode matches the running application",
            ],
            VisError::Decode { .. } => vec![
                "Verify the simulation mode matches the running application",
                "Check the payload layout produced by the board",
            ],
            VisError::Config { .. } => vec![
                "Make dimensions an exact multiple of the per-chip tile size",
                "Check every size in the configuration is non-zero",
            ],
            VisError::Capture { .. } => vec![
                "Check the file was written in raw capture format",
                "Re-record the capture if it was truncated",
            ],
            VisError::Recorder { .. } => vec![
                "Open the recorder before writing",
                "Resume a paused recorder before closing it again",
            ],
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        VisError::File { path: path.into(), source }
    }

    /// Helper constructor for transport errors.
    pub fn transport(reason: impl Into<String>) -> Self {
        VisError::Transport { reason: reason.into(), source: None }
    }

    /// Helper constructor for transport errors with an I/O source.
    pub fn transport_with_source(reason: impl Into<String>, source: std::io::Error) -> Self {
        VisError::Transport { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for truncated frames.
    pub fn truncated_frame(needed: usize, actual: usize) -> Self {
        VisError::TruncatedFrame { needed, actual }
    }

    /// Helper constructor for indices derived from wire data.
    pub fn index_out_of_range(index: i64, len: usize) -> Self {
        VisError::IndexOutOfRange { index, len }
    }

    /// Helper constructor for decode failures.
    pub fn decode(context: impl Into<String>, details: impl Into<String>) -> Self {
        VisError::Decode { context: context.into(), details: details.into() }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        VisError::Config { reason: reason.into() }
    }

    /// Helper constructor for malformed capture files.
    pub fn capture(record: usize, details: impl Into<String>) -> Self {
        VisError::Capture { record, details: details.into() }
    }
}

impl From<std::io::Error> for VisError {
    fn from(err: std::io::Error) -> Self {
        VisError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn messages_carry_their_context(
            reason in "[a-z ]{1,40}",
            index in -1000i64..100_000i64,
            len in 1usize..100_000usize,
            needed in 1usize..64usize,
            actual in 0usize..64usize,
        ) {
            let transport = VisError::transport(reason.clone());
            prop_assert!(transport.to_string().contains(&reason));

            let range = VisError::index_out_of_range(index, len);
            let msg = range.to_string();
            prop_assert!(msg.contains(&index.to_string()));
            prop_assert!(msg.contains(&len.to_string()));

            let truncated = VisError::truncated_frame(needed, actual);
            let msg = truncated.to_string();
            prop_assert!(msg.contains(&needed.to_string()));
            prop_assert!(msg.contains(&actual.to_string()));
        }
    }

    #[test]
    fn decode_errors_are_recoverable_transport_errors_are_not() {
        assert!(VisError::truncated_frame(26, 3).is_recoverable());
        assert!(VisError::index_out_of_range(1024, 1024).is_recoverable());
        assert!(VisError::decode("heatmap", "bad word").is_recoverable());
        assert!(!VisError::transport("socket gone").is_recoverable());
        assert!(!VisError::config("bad tiling").is_recoverable());
        assert!(
            !VisError::file_error(
                "/tmp/none.spinn",
                std::io::Error::new(std::io::ErrorKind::NotFound, "missing")
            )
            .is_recoverable()
        );
    }

    #[test]
    fn every_category_has_suggestions() {
        let errors = [
            VisError::transport("x"),
            VisError::truncated_frame(1, 0),
            VisError::index_out_of_range(-1, 4),
            VisError::config("x"),
            VisError::capture(3, "short record"),
            VisError::Recorder { operation: "pause", state: "closed".into() },
        ];
        for error in &errors {
            let suggestions = error.recovery_suggestions();
            assert!(!suggestions.is_empty(), "{error} has no suggestions");
            assert!(suggestions.iter().all(|s| s.len() > 5));
        }
    }

    #[test]
    fn io_errors_convert_to_file_errors() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "capture.spinn");
        match VisError::from(io_err) {
            VisError::File { source, .. } => assert_eq!(source.to_string(), "capture.spinn"),
            other => panic!("Expected File error, got {other:?}"),
        }
    }

    #[test]
    fn error_is_send_sync_static() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<VisError>();
    }

    #[test]
    fn transport_source_is_chained() {
        let err = VisError::transport_with_source(
            "recv failed",
            std::io::Error::other("connection reset"),
        );
        let source = std::error::Error::source(&err).expect("source should be kept");
        assert!(source.to_string().contains("connection reset"));
    }
}
