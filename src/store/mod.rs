//! Snapshot and history store.
//!
//! [`DisplayState`] owns every buffer a renderer reads: the latest-value
//! snapshot, the bias currents, the history ring with its raster companion,
//! the watermarks and the transform flags. It is shared through
//! [`StoreHandle`], which serialises access with one mutex and publishes a
//! revision counter on a `watch` channel so consumers can wait for changes
//! instead of polling.
//!
//! The receive loop takes the lock once per frame: advance the ring, apply
//! the decoded batch, release. Readers copy what they need under the lock
//! ([`StoreHandle::view`]) or borrow it for the length of a closure
//! ([`StoreHandle::with_state`]).

mod history;
mod watermark;

pub use history::HistoryRing;
pub use watermark::{
    HI_WATER, LO_WATER, MAX_DATA, MIN_DATA, NOT_DEFINED, Watermarks, clamp_data, is_defined,
};

use crate::decoders::{Update, UpdateBatch, integrator_decay};
use crate::mapping::{CoordinateSpace, Transform, checked_index};
use crate::{Result, VisError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

/// Sizing and defaults for a [`DisplayState`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StoreSettings {
    pub space: CoordinateSpace,
    pub history_rows: usize,
    pub max_rasterised_neurons: usize,
    /// Wall time covered by one history row
    pub quantum: Duration,
    pub init_zero: bool,
    pub hi_water: f32,
    pub lo_water: f32,
    pub transform: Transform,
}

impl StoreSettings {
    /// Stock settings: 3500 rows, each 3.5 s / 630 px wide.
    pub fn new(space: CoordinateSpace) -> Self {
        Self {
            space,
            history_rows: 3500,
            max_rasterised_neurons: 1024,
            quantum: Duration::from_secs_f64(3.5 / 630.0),
            init_zero: false,
            hi_water: HI_WATER,
            lo_water: LO_WATER,
            transform: Transform::default(),
        }
    }
}

/// What applying one batch did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    pub row: usize,
    pub applied: usize,
    pub skipped: usize,
    pub cleared_rows: usize,
    /// Neuron ids observed firing, in arrival order
    pub spikes: Vec<u32>,
}

/// Owned copy of what a renderer needs for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayView {
    pub snapshot: Vec<f32>,
    pub bias: Vec<f32>,
    pub watermarks: Watermarks,
    pub transform: Transform,
    pub frozen: bool,
    pub current_row: usize,
    /// Lowest and highest neuron id seen firing
    pub spike_range: Option<(u32, u32)>,
    pub revision: u64,
}

impl DisplayView {
    /// Number of cells holding data.
    pub fn defined_cells(&self) -> usize {
        self.snapshot.iter().filter(|v| is_defined(**v)).count()
    }
}

/// All display buffers, owned by one place.
#[derive(Debug)]
pub struct DisplayState {
    settings: StoreSettings,
    snapshot: Vec<f32>,
    bias: Vec<f32>,
    history: HistoryRing,
    watermarks: Watermarks,
    transform: Transform,
    frozen: bool,
    spike_range: Option<(u32, u32)>,
    epoch: Instant,
}

impl DisplayState {
    pub fn new(settings: StoreSettings) -> Self {
        Self::with_epoch(settings, Instant::now())
    }

    /// Create a state whose history rows are counted from `epoch`.
    pub fn with_epoch(settings: StoreSettings, epoch: Instant) -> Self {
        let len = settings.space.len();
        Self {
            snapshot: vec![NOT_DEFINED; len],
            bias: vec![NOT_DEFINED; len],
            history: HistoryRing::new(
                settings.history_rows,
                len,
                settings.max_rasterised_neurons,
                settings.quantum,
                settings.init_zero,
            ),
            watermarks: Watermarks::new(settings.hi_water, settings.lo_water),
            transform: settings.transform,
            frozen: false,
            spike_range: None,
            epoch,
            settings,
        }
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.settings.space
    }

    pub fn snapshot(&self) -> &[f32] {
        &self.snapshot
    }

    pub fn bias(&self) -> &[f32] {
        &self.bias
    }

    pub fn history(&self) -> &HistoryRing {
        &self.history
    }

    pub fn watermarks(&self) -> Watermarks {
        self.watermarks
    }

    pub fn transform(&self) -> Transform {
        self.transform
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn spike_range(&self) -> Option<(u32, u32)> {
        self.spike_range
    }

    /// History row for wall time `now`.
    pub fn current_row(&self, now: Instant) -> usize {
        self.history.row_at(now.saturating_duration_since(self.epoch))
    }

    /// Advance the ring to `new_row`, clearing rows passed over.
    pub fn advance_and_clear(&mut self, new_row: usize) -> usize {
        self.history.advance_and_clear(new_row)
    }

    /// Write one value to the snapshot and to history row `row`.
    pub fn write(&mut self, row: usize, index: i64, value: f32) -> Result<()> {
        let index = checked_index(index, self.snapshot.len())?;
        if row >= self.history.rows() {
            return Err(VisError::index_out_of_range(row as i64, self.history.rows()));
        }
        self.store(row, index, value);
        Ok(())
    }

    fn store(&mut self, row: usize, index: usize, value: f32) {
        let value = clamp_data(value);
        self.snapshot[index] = value;
        self.history.set(row, index, value);
        self.watermarks.observe(value);
    }

    /// Apply every update of a batch to history row `row`.
    pub fn apply(&mut self, row: usize, batch: &UpdateBatch) -> ApplyReport {
        let mut report = ApplyReport { row, skipped: batch.skipped, ..ApplyReport::default() };
        let len = self.snapshot.len();

        for update in &batch.updates {
            let outcome = match *update {
                Update::Set { index, value } => {
                    checked_index(index as i64, len).map(|i| self.store(row, i, value))
                }
                Update::Count { index } => checked_index(index as i64, len).map(|i| {
                    let current = self.snapshot[i];
                    let base = if is_defined(current) { current } else { 0.0 };
                    self.store(row, i, base + 1.0);
                }),
                Update::Bias { index, value } => {
                    checked_index(index as i64, len).map(|i| self.bias[i] = value)
                }
                Update::Overlay { index, value } => checked_index(index as i64, len).map(|i| {
                    let value = clamp_data(value);
                    self.snapshot[i] = value;
                    self.watermarks.observe(value);
                }),
                Update::Raster { neuron } => {
                    let width = self.history.raster_width();
                    match self.history.raster_cell_mut(row, neuron) {
                        Some(cell) => {
                            *cell = if is_defined(*cell) { *cell + 1.0 } else { 1.0 };
                            Ok(())
                        }
                        None => Err(VisError::index_out_of_range(neuron as i64, width)),
                    }
                }
                Update::Spike { neuron } => {
                    self.spike_range = Some(match self.spike_range {
                        Some((low, high)) => (low.min(neuron), high.max(neuron)),
                        None => (neuron, neuron),
                    });
                    report.spikes.push(neuron);
                    Ok(())
                }
                Update::Integrate { index, input } => checked_index(index as i64, len).map(|i| {
                    let previous = self.history.previous_row(row);
                    let past = self.history.get(previous, i).filter(|v| is_defined(*v));
                    self.store(row, i, input + past.unwrap_or(0.0) * integrator_decay());
                }),
            };
            match outcome {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    warn!(%error, ?update, "Skipping update");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Advance to the row for `now` unless frozen, then apply the batch.
    pub fn ingest(&mut self, now: Instant, batch: &UpdateBatch) -> ApplyReport {
        let row = self.current_row(now);
        let cleared_rows = if self.frozen { 0 } else { self.advance_and_clear(row) };
        ApplyReport { cleared_rows, ..self.apply(row, batch) }
    }

    /// Reset the snapshot, watermarks and transform to their defaults.
    pub fn clear_down(&mut self) {
        self.snapshot.fill(NOT_DEFINED);
        self.watermarks.reset();
        self.transform = self.settings.transform;
    }

    /// Discard history and the spike range as well as the snapshot.
    pub fn reset(&mut self) {
        self.clear_down();
        self.bias.fill(NOT_DEFINED);
        self.history.reset();
        self.spike_range = None;
    }

    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
    }

    fn view(&self, now: Instant, revision: u64) -> DisplayView {
        DisplayView {
            snapshot: self.snapshot.clone(),
            bias: self.bias.clone(),
            watermarks: self.watermarks,
            transform: self.transform,
            frozen: self.frozen,
            current_row: self.current_row(now),
            spike_range: self.spike_range,
            revision,
        }
    }
}

/// Shared, lock-guarded access to a [`DisplayState`].
#[derive(Debug, Clone)]
pub struct StoreHandle {
    state: Arc<Mutex<DisplayState>>,
    revision: Arc<watch::Sender<u64>>,
}

impl StoreHandle {
    pub fn new(state: DisplayState) -> Self {
        let (revision, _) = watch::channel(0);
        Self { state: Arc::new(Mutex::new(state)), revision: Arc::new(revision) }
    }

    /// Owned copy of the display buffers.
    pub fn view(&self) -> DisplayView {
        let revision = *self.revision.borrow();
        self.state.lock().view(Instant::now(), revision)
    }

    /// Run `f` with the lock held.
    pub fn with_state<R>(&self, f: impl FnOnce(&DisplayState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Copy of one history row, if it exists.
    pub fn history_row(&self, row: usize) -> Option<Vec<f32>> {
        self.state.lock().history.row(row).map(<[f32]>::to_vec)
    }

    /// Copy of one raster row, if it exists.
    pub fn raster_row(&self, row: usize) -> Option<Vec<f32>> {
        self.state.lock().history.raster_row(row).map(<[f32]>::to_vec)
    }

    pub fn watermarks(&self) -> Watermarks {
        self.state.lock().watermarks
    }

    pub fn is_frozen(&self) -> bool {
        self.state.lock().frozen
    }

    pub fn set_frozen(&self, frozen: bool) {
        self.state.lock().set_frozen(frozen);
        debug!(frozen, "Display freeze changed");
        self.bump();
    }

    pub fn clear_down(&self) {
        self.state.lock().clear_down();
        self.bump();
    }

    pub fn set_transform(&self, transform: Transform) {
        self.state.lock().set_transform(transform);
        self.bump();
    }

    /// Advance and apply a decoded batch under a single lock.
    pub fn ingest(&self, now: Instant, batch: &UpdateBatch) -> ApplyReport {
        let report = self.state.lock().ingest(now, batch);
        if report.applied > 0 || report.cleared_rows > 0 {
            self.bump();
        }
        report
    }

    /// Current revision; it increases whenever the display changes.
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Receiver notified on every revision change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn bump(&self) {
        self.revision.send_modify(|revision| *revision += 1);
    }
}
