//! Raw capture reader for replay
//!
//! ```rust,no_run
//! use sdpvis::capture::CaptureReader;
//!
//! fn summarise() -> sdpvis::Result<()> {
//!     let reader = CaptureReader::open("packets-2024Mar05_1412.spinn")?;
//!     println!("{} frames over {:?}", reader.len(), reader.duration());
//!     for record in reader.records() {
//!         println!("+{}us {} bytes", record.offset_us, record.payload.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! The whole file is loaded at open time so that replay timing is never
//! disturbed by disk reads.

use super::format::{CaptureRecord, parse_records};
use crate::{Result, VisError};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// All records of a raw capture file, in file order.
#[derive(Debug, Clone)]
pub struct CaptureReader {
    path: PathBuf,
    records: Vec<CaptureRecord>,
}

impl CaptureReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let data = std::fs::read(&path).map_err(|e| VisError::file_error(&path, e))?;
        Self::from_bytes_with_path(&data, path)
    }

    /// Parse a capture held in memory.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_path(data, PathBuf::from("<memory>"))
    }

    fn from_bytes_with_path(data: &[u8], path: PathBuf) -> Result<Self> {
        let records = parse_records(data)?;
        let reader = Self { path, records };
        debug!(
            path = %reader.path.display(),
            frames = reader.len(),
            duration_s = reader.duration().as_secs_f64(),
            "Loaded capture"
        );
        Ok(reader)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Earliest record offset in the file.
    pub fn first_offset_us(&self) -> Option<i64> {
        self.records.iter().map(|r| r.offset_us).min()
    }

    /// Time between the earliest and latest record.
    pub fn duration(&self) -> Duration {
        let first = self.first_offset_us();
        let last = self.records.iter().map(|r| r.offset_us).max();
        match (first, last) {
            (Some(first), Some(last)) => Duration::from_micros(last.saturating_sub(first) as u64),
            _ => Duration::ZERO,
        }
    }

    pub fn records(&self) -> &[CaptureRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<CaptureRecord> {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn capture_bytes(offsets: &[i64]) -> Vec<u8> {
        offsets
            .iter()
            .enumerate()
            .flat_map(|(i, &offset_us)| {
                CaptureRecord { offset_us, payload: vec![i as u8; 30] }.to_bytes().unwrap()
            })
            .collect()
    }

    #[test]
    fn reports_count_and_duration() {
        let reader = CaptureReader::from_bytes(&capture_bytes(&[0, 250_000, 1_000_000])).unwrap();
        assert_eq!(reader.len(), 3);
        assert_eq!(reader.duration(), Duration::from_secs(1));
        assert_eq!(reader.records()[1].payload, vec![1u8; 30]);
    }

    #[test]
    fn empty_capture_has_no_duration() {
        let reader = CaptureReader::from_bytes(&[]).unwrap();
        assert!(reader.is_empty());
        assert_eq!(reader.duration(), Duration::ZERO);
    }

    #[test]
    fn opens_files_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&capture_bytes(&[5, 10])).unwrap();
        let reader = CaptureReader::open(file.path()).unwrap();
        assert_eq!(reader.len(), 2);
        assert_eq!(reader.first_offset_us(), Some(5));
    }

    #[test]
    fn missing_file_is_a_file_error() {
        let err = CaptureReader::open("/nonexistent/capture.spinn").unwrap_err();
        assert!(matches!(err, VisError::File { .. }));
        assert!(!err.is_recoverable());
    }
}
