//! Time-windowed history ring.

use super::watermark::NOT_DEFINED;
use std::time::Duration;
use tracing::trace;

/// A backward jump shorter than this many rows is a display-width glitch,
/// not a wrap of the ring.
const GLITCH_ROWS: usize = 500;

/// `rows` contiguous rows of `width` grid values plus a parallel raster
/// buffer of `raster_width` neuron counts per row.
#[derive(Debug, Clone)]
pub struct HistoryRing {
    rows: usize,
    width: usize,
    raster_width: usize,
    values: Vec<f32>,
    raster: Vec<f32>,
    last_row: usize,
    quantum: Duration,
    fill: f32,
}

impl HistoryRing {
    /// Create a ring whose rows each cover `quantum` of wall time.
    ///
    /// With `init_zero`, cleared cells hold 0.0 instead of the sentinel.
    pub fn new(
        rows: usize,
        width: usize,
        raster_width: usize,
        quantum: Duration,
        init_zero: bool,
    ) -> Self {
        let rows = rows.max(1);
        let fill = if init_zero { 0.0 } else { NOT_DEFINED };
        Self {
            rows,
            width,
            raster_width,
            values: vec![fill; rows * width],
            raster: vec![fill; rows * raster_width],
            last_row: 0,
            quantum,
            fill,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn raster_width(&self) -> usize {
        self.raster_width
    }

    /// Row most recently advanced to.
    pub fn last_row(&self) -> usize {
        self.last_row
    }

    /// Row covering `elapsed` time since the epoch.
    pub fn row_at(&self, elapsed: Duration) -> usize {
        let quantum = self.quantum.as_secs_f64();
        if quantum <= 0.0 {
            return 0;
        }
        ((elapsed.as_secs_f64() / quantum) as u64 % self.rows as u64) as usize
    }

    /// Move to `new_row`, clearing every row passed over without data.
    ///
    /// Returns the number of rows cleared. A short backward jump clears
    /// nothing; a longer one is treated as a wrap of the ring.
    pub fn advance_and_clear(&mut self, new_row: usize) -> usize {
        let new_row = new_row % self.rows;
        let last = self.last_row;
        let to_clear = if new_row >= last {
            new_row - last
        } else {
            let backward = last - new_row;
            let forward = new_row + self.rows - last;
            if backward < GLITCH_ROWS && backward < forward { 0 } else { forward }
        };

        for i in 0..to_clear.min(self.rows) {
            let row = (last + 1 + i) % self.rows;
            let fill = self.fill;
            self.values[row * self.width..(row + 1) * self.width].fill(fill);
            self.raster[row * self.raster_width..(row + 1) * self.raster_width].fill(fill);
        }
        if to_clear > 0 {
            trace!(from = last, to = new_row, cleared = to_clear, "Advanced history");
        }
        self.last_row = new_row;
        to_clear
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        (row < self.rows).then(|| &self.values[row * self.width..(row + 1) * self.width])
    }

    pub fn raster_row(&self, row: usize) -> Option<&[f32]> {
        (row < self.rows)
            .then(|| &self.raster[row * self.raster_width..(row + 1) * self.raster_width])
    }

    pub fn get(&self, row: usize, index: usize) -> Option<f32> {
        self.row(row).and_then(|r| r.get(index).copied())
    }

    pub(super) fn set(&mut self, row: usize, index: usize, value: f32) {
        if row < self.rows && index < self.width {
            self.values[row * self.width + index] = value;
        }
    }

    pub(super) fn raster_cell_mut(&mut self, row: usize, neuron: usize) -> Option<&mut f32> {
        if row < self.rows && neuron < self.raster_width {
            Some(&mut self.raster[row * self.raster_width + neuron])
        } else {
            None
        }
    }

    /// Row written before `row`, wrapping at the start of the ring.
    pub fn previous_row(&self, row: usize) -> usize {
        if row == 0 { self.rows - 1 } else { row - 1 }
    }

    pub(super) fn reset(&mut self) {
        self.values.fill(self.fill);
        self.raster.fill(self.fill);
        self.last_row = 0;
    }
}
