//! Replay connection for raw capture files
//!
//! A replay reads a `.spinn` capture and re-sends every record through the
//! [`Sender`], preserving the recorded spacing scaled by the replay speed.
//! Pointed at our own listening port, the replayed frames flow through the
//! normal receive loop exactly as live traffic would.

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{CaptureReader, CaptureRecord};
use crate::sender::Sender;
use crate::store::StoreHandle;
use crate::types::ReplaySpeed;
use crate::{Result, VisError};

/// How far behind schedule a send may fall before we warn.
const DESYNC_THRESHOLD: Duration = Duration::from_secs(1);

/// Outcome of a replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Records handed to the socket
    pub sent: u64,
    /// Records dropped because no endpoint was known
    pub unsent: u64,
    /// Records sent more than a second late
    pub late: u64,
    /// False when the replay was stopped before the last record
    pub completed: bool,
    pub elapsed: Duration,
}

/// Replay connection from a capture file
pub struct ReplayConnection {
    path: PathBuf,
    records: usize,
    duration: Duration,
    speed: ReplaySpeed,
    finished: watch::Receiver<bool>,
    task: Mutex<Option<JoinHandle<Result<ReplaySummary>>>>,
    /// Cancellation token for stopping the replay task
    cancel: CancellationToken,
}

impl ReplayConnection {
    /// Load a capture file and start replaying it.
    ///
    /// The file is read completely before this returns, so open and parse
    /// errors reach the caller. The display is frozen once the last record
    /// has been sent.
    pub async fn start<P: AsRef<Path>>(
        path: P,
        speed: ReplaySpeed,
        sender: Arc<Sender>,
        store: StoreHandle,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = CaptureReader::open(&path)?;
        let records = reader.len();
        let duration = reader.duration();
        info!(
            path = %path.display(),
            records,
            seconds = duration.as_secs_f64(),
            speed = speed.multiplier(),
            "Replaying capture"
        );

        let (finished_tx, finished) = watch::channel(false);
        let cancel = CancellationToken::new();
        let cancel_task = cancel.clone();

        let task = tokio::spawn(async move {
            let result =
                Self::replay_task(reader.into_records(), speed, &sender, &store, &cancel_task)
                    .await;
            finished_tx.send_replace(true);
            result
        });

        Ok(Self {
            path,
            records,
            duration,
            speed,
            finished,
            task: Mutex::new(Some(task)),
            cancel,
        })
    }

    async fn replay_task(
        records: Vec<CaptureRecord>,
        speed: ReplaySpeed,
        sender: &Sender,
        store: &StoreHandle,
        cancel: &CancellationToken,
    ) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();
        let started = Instant::now();
        let first_offset = records.first().map_or(0, |r| r.offset_us);

        for record in &records {
            if cancel.is_cancelled() {
                break;
            }

            let offset = record.offset_us.saturating_sub(first_offset);
            let target = speed.scale_micros(offset).max(0) as u64;
            let now = Instant::now();

            // A deadline past the clock's range is treated as already late
            match started.checked_add(Duration::from_micros(target)) {
                Some(deadline) if deadline > now => {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep_until(deadline) => {}
                    }
                }
                Some(deadline) if now - deadline <= DESYNC_THRESHOLD => {}
                _ => {
                    if summary.late == 0 {
                        warn!("Having trouble keeping up, replay timing may be inaccurate");
                    }
                    summary.late += 1;
                }
            }

            if sender.send_raw(&record.payload).await? {
                summary.sent += 1;
            } else {
                summary.unsent += 1;
            }
        }

        summary.elapsed = started.elapsed();
        summary.completed = summary.sent + summary.unsent == records.len() as u64;
        if summary.completed {
            store.set_frozen(true);
            info!(sent = summary.sent, "All records in the capture were sent");
        } else {
            info!(sent = summary.sent, "Replay stopped early");
        }
        Ok(summary)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records in the capture.
    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    /// Recorded span of the capture at normal speed.
    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn speed(&self) -> ReplaySpeed {
        self.speed
    }

    /// Ask the replay task to stop after the current record.
    pub fn stop(&self) {
        debug!("Stopping replay");
        self.cancel.cancel();
    }

    pub fn finished(&self) -> bool {
        *self.finished.borrow()
    }

    /// Wait for the replay task to end.
    ///
    /// Only the first call observes the task; later calls report a
    /// transport error.
    pub async fn wait(&self) -> Result<ReplaySummary> {
        let task = self.task.lock().take();
        match task {
            Some(task) => task
                .await
                .map_err(|e| VisError::transport(format!("replay task failed to join: {e}")))?,
            None => Err(VisError::transport("replay already awaited")),
        }
    }
}

impl Drop for ReplayConnection {
    fn drop(&mut self) {
        debug!("Dropping replay connection");
        self.cancel.cancel();
    }
}
