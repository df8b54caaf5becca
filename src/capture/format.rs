//! On-disk capture formats
//!
//! ## Raw capture (`.spinn`)
//!
//! A sequence of records, little-endian, with no file header:
//!
//! ```text
//! length:i16  offset_us:i64  payload[length]
//! ```
//!
//! `offset_us` is the arrival time of the datagram in microseconds since the
//! first captured datagram. The payload is the datagram exactly as received.
//!
//! ## NeuroTools spike list (`.neuro`)
//!
//! A text file with a five line header followed by one `time\tid` line per
//! spike. The header carries fixed-width placeholders that are overwritten in
//! place when the capture is closed, once the neuron id range is known.

use crate::{Result, VisError};
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Size of a raw record header: `i16` length plus `i64` offset.
pub const RECORD_HEADER_LEN: usize = 10;

/// NeuroTools header written when a spike capture opens.
pub const NEURO_HEADER: &str = "# first_id =          \n\
# n =          \n\
# dt = 1.0\n\
# dimensions = [          ]\n\
# last_id =          \n";

/// Width of each header placeholder, after the space that follows `=` or `[`.
pub const PLACEHOLDER_WIDTH: usize = 9;
/// Byte offsets of the first id, neuron count, dimensions and last id placeholders.
pub const PLACEHOLDER_OFFSETS: [u64; 4] = [13, 29, 67, 90];

/// Which capture file to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureFormat {
    /// Every datagram with its arrival offset
    Raw,
    /// Spike times and neuron ids
    NeuroTools,
}

impl CaptureFormat {
    pub fn extension(self) -> &'static str {
        match self {
            CaptureFormat::Raw => "spinn",
            CaptureFormat::NeuroTools => "neuro",
        }
    }
}

/// Timestamped capture file name, e.g. `packets-2024Mar05_1412.spinn`.
pub fn default_file_name<Tz: TimeZone>(format: CaptureFormat, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("{}.{}", now.format("packets-%Y%b%d_%H%M"), format.extension())
}

/// One captured datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    /// Microseconds since the first captured datagram
    pub offset_us: i64,
    pub payload: Vec<u8>,
}

impl CaptureRecord {
    /// Serialise into the raw record layout.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let length = i16::try_from(self.payload.len()).map_err(|_| {
            VisError::capture(0, format!("payload of {} bytes does not fit", self.payload.len()))
        })?;
        let mut out = Vec::with_capacity(RECORD_HEADER_LEN + self.payload.len());
        out.extend_from_slice(&length.to_le_bytes());
        out.extend_from_slice(&self.offset_us.to_le_bytes());
        out.extend_from_slice(&self.payload);
        Ok(out)
    }
}

/// Parse every record in a raw capture.
///
/// A record cut short at the end of the file is dropped with a warning, as
/// happens when a recording process is killed mid-write. A negative length
/// means the file is not a raw capture.
pub fn parse_records(data: &[u8]) -> Result<Vec<CaptureRecord>> {
    let mut records = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let index = records.len();
        let Some(header) = data.get(pos..pos + RECORD_HEADER_LEN) else {
            warn!(record = index, "Capture ends inside a record header, ignoring tail");
            break;
        };
        let length = i16::from_le_bytes([header[0], header[1]]);
        let offset_us = i64::from_le_bytes([
            header[2], header[3], header[4], header[5], header[6], header[7], header[8], header[9],
        ]);
        let length = usize::try_from(length)
            .map_err(|_| VisError::capture(index, format!("negative record length {length}")))?;

        let start = pos + RECORD_HEADER_LEN;
        let Some(payload) = data.get(start..start + length) else {
            warn!(
                record = index,
                needed = length,
                available = data.len() - start,
                "Capture ends inside a record payload, ignoring tail"
            );
            break;
        };
        records.push(CaptureRecord { offset_us, payload: payload.to_vec() });
        pos = start + length;
    }
    Ok(records)
}

/// Format a header value into its fixed-width placeholder.
pub fn placeholder_value(value: i64) -> [u8; PLACEHOLDER_WIDTH] {
    let mut field = [b' '; PLACEHOLDER_WIDTH];
    let text = value.to_string();
    let len = text.len().min(PLACEHOLDER_WIDTH);
    field[..len].copy_from_slice(&text.as_bytes()[..len]);
    field
}

/// One NeuroTools spike line: milliseconds and neuron id.
pub fn spike_line(time_ms: i64, neuron: u32) -> String {
    format!("{time_ms}.0\t{neuron}.0\n")
}
