//! Capture recorder
//!
//! One recorder serves both capture formats. Its state machine:
//!
//! ```text
//! Closed --open--> OpenIdle --write--> OpenBusy --done--> OpenIdle
//!                  OpenIdle --pause--> OpenPaused --resume--> OpenIdle
//!                  OpenIdle | OpenPaused --close--> Closed
//! ```
//!
//! Writes and close share one mutex, so a close issued while a record is in
//! flight waits for it. A paused recorder accepts records and drops them.

use super::format::{
    CaptureFormat, CaptureRecord, NEURO_HEADER, PLACEHOLDER_OFFSETS, placeholder_value,
    spike_line,
};
use crate::{Result, VisError};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Lifecycle state of a [`CaptureRecorder`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecorderState {
    Closed,
    OpenIdle,
    OpenBusy,
    OpenPaused,
}

impl std::fmt::Display for RecorderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RecorderState::Closed => "closed",
            RecorderState::OpenIdle => "open",
            RecorderState::OpenBusy => "writing",
            RecorderState::OpenPaused => "paused",
        };
        f.write_str(name)
    }
}

/// What a finished capture contained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSummary {
    pub format: CaptureFormat,
    pub path: PathBuf,
    pub records: u64,
    pub dropped: u64,
    /// Lowest and highest neuron id written (NeuroTools only)
    pub id_range: Option<(u32, u32)>,
}

#[derive(Debug)]
struct Sink {
    format: CaptureFormat,
    path: PathBuf,
    file: File,
    records: u64,
    dropped: u64,
    id_range: Option<(u32, u32)>,
}

impl Sink {
    fn io_error(&self, source: std::io::Error) -> VisError {
        VisError::file_error(&self.path, source)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let result = self.file.write_all(bytes).and_then(|()| self.file.flush());
        result.map_err(|e| self.io_error(e))
    }

    /// Fill in the NeuroTools header placeholders.
    fn finalise_neuro_header(&mut self) -> Result<()> {
        let (first, last) = self.id_range.unwrap_or((0, 0));
        let range = last as i64 - first as i64;
        let values = [first as i64, range, range, last as i64];
        for (offset, value) in PLACEHOLDER_OFFSETS.into_iter().zip(values) {
            let result = self
                .file
                .seek(SeekFrom::Start(offset))
                .and_then(|_| self.file.write_all(&placeholder_value(value)));
            result.map_err(|e| self.io_error(e))?;
        }
        self.file.flush().map_err(|e| self.io_error(e))
    }
}

#[derive(Debug)]
struct Inner {
    state: RecorderState,
    sink: Option<Sink>,
}

/// Writes incoming frames or spikes to a capture file.
#[derive(Debug)]
pub struct CaptureRecorder {
    inner: Mutex<Inner>,
}

impl Default for CaptureRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self { inner: Mutex::new(Inner { state: RecorderState::Closed, sink: None }) }
    }

    pub fn state(&self) -> RecorderState {
        self.inner.lock().state
    }

    /// Format of the open capture, if any.
    pub fn active_format(&self) -> Option<CaptureFormat> {
        self.inner.lock().sink.as_ref().map(|sink| sink.format)
    }

    /// Create (or truncate) `path` and start capturing.
    pub fn open(&self, format: CaptureFormat, path: impl AsRef<Path>) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != RecorderState::Closed {
            return Err(VisError::Recorder { operation: "open", state: inner.state.to_string() });
        }

        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| VisError::file_error(&path, e))?;
        let mut sink = Sink { format, path, file, records: 0, dropped: 0, id_range: None };
        if format == CaptureFormat::NeuroTools {
            sink.write_all(NEURO_HEADER.as_bytes())?;
        }

        info!(path = %sink.path.display(), ?format, "Capture opened");
        inner.sink = Some(sink);
        inner.state = RecorderState::OpenIdle;
        Ok(())
    }

    /// Append a datagram to a raw capture. Returns whether it was written.
    pub fn record_frame(&self, payload: &[u8], offset_us: i64) -> Result<bool> {
        let bytes = CaptureRecord { offset_us, payload: payload.to_vec() }.to_bytes()?;
        self.write(CaptureFormat::Raw, "record a frame", |sink| {
            sink.write_all(&bytes)?;
            Ok(())
        })
    }

    /// Append a spike to a NeuroTools capture. Returns whether it was written.
    pub fn record_spike(&self, time_ms: i64, neuron: u32) -> Result<bool> {
        self.write(CaptureFormat::NeuroTools, "record a spike", |sink| {
            sink.write_all(spike_line(time_ms, neuron).as_bytes())?;
            sink.id_range = Some(match sink.id_range {
                Some((low, high)) => (low.min(neuron), high.max(neuron)),
                None => (neuron, neuron),
            });
            Ok(())
        })
    }

    fn write(
        &self,
        format: CaptureFormat,
        operation: &'static str,
        body: impl FnOnce(&mut Sink) -> Result<()>,
    ) -> Result<bool> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        match (inner.state, inner.sink.as_mut()) {
            (RecorderState::OpenPaused, Some(sink)) => {
                sink.dropped += 1;
                Ok(false)
            }
            (RecorderState::OpenIdle, Some(sink)) if sink.format == format => {
                inner.state = RecorderState::OpenBusy;
                let result = body(sink);
                inner.state = RecorderState::OpenIdle;
                if result.is_ok() {
                    sink.records += 1;
                }
                result.map(|()| true)
            }
            (state, _) => Err(VisError::Recorder { operation, state: state.to_string() }),
        }
    }

    pub fn pause(&self) -> Result<()> {
        self.transition("pause", RecorderState::OpenIdle, RecorderState::OpenPaused)
    }

    pub fn resume(&self) -> Result<()> {
        self.transition("resume", RecorderState::OpenPaused, RecorderState::OpenIdle)
    }

    fn transition(
        &self,
        operation: &'static str,
        from: RecorderState,
        to: RecorderState,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.state != from {
            return Err(VisError::Recorder { operation, state: inner.state.to_string() });
        }
        inner.state = to;
        debug!(%from, %to, "Recorder state changed");
        Ok(())
    }

    /// Finish the capture, completing the NeuroTools header if needed.
    pub fn close(&self) -> Result<CaptureSummary> {
        let mut inner = self.inner.lock();
        let closable = matches!(inner.state, RecorderState::OpenIdle | RecorderState::OpenPaused);
        let sink = match inner.sink.take() {
            Some(sink) if closable => sink,
            other => {
                inner.sink = other;
                let state = inner.state.to_string();
                return Err(VisError::Recorder { operation: "close", state });
            }
        };
        inner.state = RecorderState::Closed;
        drop(inner);

        let mut sink = sink;
        if sink.format == CaptureFormat::NeuroTools {
            sink.finalise_neuro_header()?;
        }
        sink.file.sync_all().map_err(|e| sink.io_error(e))?;

        info!(path = %sink.path.display(), records = sink.records, "Capture closed");
        Ok(CaptureSummary {
            format: sink.format,
            path: sink.path,
            records: sink.records,
            dropped: sink.dropped,
            id_range: sink.id_range,
        })
    }
}
