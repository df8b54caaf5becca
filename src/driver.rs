//! Driver spawns and manages the receive loop

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::capture::{CaptureFormat, CaptureRecorder};
use crate::decoders::{DecodeContext, Decoder};
use crate::provider::{Datagram, Provider};
use crate::sender::Sender;
use crate::store::StoreHandle;
use crate::types::WireFrame;
use crate::Result;

/// Everything the receive loop writes to.
#[derive(Clone)]
pub struct DriverContext {
    pub store: StoreHandle,
    pub decoder: Decoder,
    pub ctx: DecodeContext,
    /// Learns the board endpoint from inbound frames when present
    pub sender: Option<Arc<Sender>>,
    pub recorder: Arc<CaptureRecorder>,
}

/// Running totals for the receive loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    pub frames: u64,
    pub discovery: u64,
    /// Datagrams that could not be parsed as frames
    pub malformed: u64,
    pub updates_applied: u64,
    pub updates_skipped: u64,
    pub truncated_payloads: u64,
    pub recorded: u64,
}

/// Result of spawning the driver
pub struct DriverChannels {
    /// Latest totals, updated after every datagram
    pub stats: watch::Receiver<DriverStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Resolves to the final totals, or the transport error that stopped the loop
    pub task: JoinHandle<Result<DriverStats>>,
}

/// Driver spawns the task that owns the provider
pub struct Driver;

impl Driver {
    /// Spawn the receive loop for the given provider
    pub fn spawn<P>(provider: P, context: DriverContext) -> DriverChannels
    where
        P: Provider,
    {
        let (stats_tx, stats_rx) = watch::channel(DriverStats::default());
        let cancel = CancellationToken::new();
        let cancel_loop = cancel.clone();

        let task = tokio::spawn(async move {
            Self::receive_task(provider, ReceiveLoop::new(context), stats_tx, cancel_loop).await
        });

        DriverChannels { stats: stats_rx, cancel, task }
    }

    async fn receive_task<P>(
        mut provider: P,
        mut receiver: ReceiveLoop,
        stats_tx: watch::Sender<DriverStats>,
        cancel: CancellationToken,
    ) -> Result<DriverStats>
    where
        P: Provider,
    {
        info!(listening = ?provider.local_addr(), "Receive loop started");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Receive loop cancelled");
                    break;
                }
                result = provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    if let Err(e) = receiver.handle(&datagram) {
                        error!("Receive loop stopped: {}", e);
                        return Err(e);
                    }
                    stats_tx.send_replace(receiver.stats);
                }
                Ok(None) => {
                    info!("Provider closed");
                    break;
                }
                Err(e) => {
                    error!("Provider error: {}", e);
                    for suggestion in e.recovery_suggestions() {
                        debug!("  suggestion: {}", suggestion);
                    }
                    return Err(e);
                }
            }
        }

        info!(frames = receiver.stats.frames, "Receive loop finished");
        Ok(receiver.stats)
    }
}

/// Per-datagram processing, separate from the task so it can run synchronously.
struct ReceiveLoop {
    context: DriverContext,
    first_receive: Option<Instant>,
    stats: DriverStats,
}

impl ReceiveLoop {
    fn new(context: DriverContext) -> Self {
        Self { context, first_receive: None, stats: DriverStats::default() }
    }

    /// Decode, apply and record one datagram.
    ///
    /// Malformed datagrams are counted and skipped; only unrecoverable errors
    /// are returned.
    fn handle(&mut self, datagram: &Datagram) -> Result<()> {
        let frame = match WireFrame::decode(&datagram.payload) {
            Ok(frame) => frame,
            Err(e) if e.is_recoverable() => {
                self.stats.malformed += 1;
                warn!(source = %datagram.source, "Skipping datagram: {}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        if frame.is_discovery() {
            self.stats.discovery += 1;
            trace!(source = %datagram.source, "Discovery frame");
            return Ok(());
        }

        if let Some(sender) = &self.context.sender {
            sender.learn_endpoint(datagram.source);
        }

        let now = datagram.received_at;
        let first = *self.first_receive.get_or_insert(now);
        self.stats.frames += 1;

        let ctx = self.context.ctx.with_frozen(self.context.store.is_frozen());
        let batch = self.context.decoder.decode(&frame, &ctx);
        if batch.truncated {
            self.stats.truncated_payloads += 1;
            debug!(cmd_rc = frame.cmd_rc, words = frame.data.len(), "Truncated payload");
        }
        let report = self.context.store.ingest(now, &batch);
        self.stats.updates_applied += report.applied as u64;
        self.stats.updates_skipped += (batch.skipped + report.skipped) as u64;
        trace!(
            frame = self.stats.frames,
            row = report.row,
            applied = report.applied,
            "Frame applied"
        );

        let since_first = now.saturating_duration_since(first);
        self.record(&datagram.payload, since_first.as_micros() as i64, &report.spikes);
        Ok(())
    }

    fn record(&mut self, payload: &[u8], offset_us: i64, spikes: &[u32]) {
        let result = match self.context.recorder.active_format() {
            None => return,
            Some(CaptureFormat::Raw) => {
                self.context.recorder.record_frame(payload, offset_us).map(u64::from)
            }
            Some(CaptureFormat::NeuroTools) => self.record_spikes(offset_us / 1000, spikes),
        };
        match result {
            Ok(written) => self.stats.recorded += written,
            // The recorder can be closed between the format check and the write
            Err(e) if e.is_recoverable() => debug!("Capture write skipped: {}", e),
            Err(e) => warn!("Capture write failed: {}", e),
        }
    }

    fn record_spikes(&self, time_ms: i64, spikes: &[u32]) -> Result<u64> {
        let mut written = 0;
        for &neuron in spikes {
            if self.context.recorder.record_spike(time_ms, neuron)? {
                written += 1;
            }
        }
        Ok(written)
    }
}
