//! Live connection to a board streaming SDP telemetry

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{CaptureFormat, CaptureRecorder, CaptureSummary};
use crate::config::VisualiserConfig;
use crate::connection::replay::ReplayConnection;
use crate::decoders::Decoder;
use crate::driver::{Driver, DriverContext, DriverStats};
use crate::provider::Provider;
use crate::providers::UdpProvider;
use crate::sender::{ControlCommand, Edge, EdgeValues, Sender};
use crate::store::{DisplayState, DisplayView, StoreHandle};
use crate::stream::ThrottleExt;
use crate::types::{RefreshRate, ReplaySpeed};
use crate::{Result, VisError};

/// What a live session amounted to once it was shut down.
#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownSummary {
    pub stats: DriverStats,
    /// Present when a capture was still open at shutdown
    pub capture: Option<CaptureSummary>,
}

/// Live connection: receive loop, display store, sender and recorder.
pub struct LiveConnection {
    store: StoreHandle,
    sender: Arc<Sender>,
    recorder: Arc<CaptureRecorder>,
    stats: watch::Receiver<DriverStats>,
    task: Mutex<Option<JoinHandle<Result<DriverStats>>>>,
    edges: Mutex<EdgeValues>,
    alter_step: f32,
    max_frame_rate: u32,
    local_addr: Option<SocketAddr>,
    /// Cancellation token for stopping the receive loop
    cancel: CancellationToken,
}

impl LiveConnection {
    /// Listen on the configured SDP port and start the receive loop.
    pub async fn start(config: &VisualiserConfig) -> Result<Self> {
        let listen = SocketAddr::from((Ipv4Addr::UNSPECIFIED, config.sdp_port));
        let provider = UdpProvider::bind(listen).await?;
        let space = config.validate()?;
        let sender = Sender::bind(
            SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            space,
            config.broadcast_to_all_chips,
        )
        .await?;
        Self::with_provider(provider, config, Arc::new(sender))
    }

    /// Start the receive loop on an arbitrary provider.
    pub fn with_provider<P: Provider>(
        provider: P,
        config: &VisualiserConfig,
        sender: Arc<Sender>,
    ) -> Result<Self> {
        if let Some(ip) = config.board_address {
            sender.pin_ip(ip);
        }
        let store = StoreHandle::new(DisplayState::new(config.store_settings()?));
        let recorder = Arc::new(CaptureRecorder::new());
        let local_addr = provider.local_addr();

        let context = DriverContext {
            store: store.clone(),
            decoder: Decoder::from(config.mode),
            ctx: config.decode_context()?,
            sender: Some(Arc::clone(&sender)),
            recorder: Arc::clone(&recorder),
        };
        let channels = Driver::spawn(provider, context);

        info!(mode = ?config.mode, title = %config.title, "Live connection started");

        Ok(Self {
            store,
            sender,
            recorder,
            stats: channels.stats,
            task: Mutex::new(Some(channels.task)),
            edges: Mutex::new(config.edges),
            alter_step: config.alter_step,
            max_frame_rate: config.max_frame_rate,
            local_addr,
            cancel: channels.cancel,
        })
    }

    /// Shared display state for renderers.
    pub fn store(&self) -> &StoreHandle {
        &self.store
    }

    pub fn sender(&self) -> &Arc<Sender> {
        &self.sender
    }

    pub fn recorder(&self) -> &Arc<CaptureRecorder> {
        &self.recorder
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Latest receive-loop totals.
    pub fn stats(&self) -> DriverStats {
        *self.stats.borrow()
    }

    /// Stream of display views, one per store change, throttled to `rate`.
    ///
    /// The rate is capped at the configured maximum frame rate. The stream
    /// yields the current view immediately.
    pub fn views(&self, rate: RefreshRate) -> impl Stream<Item = DisplayView> + 'static {
        let store = self.store.clone();
        let changes = WatchStream::new(self.store.subscribe());

        match rate.capped(self.max_frame_rate).interval() {
            None => changes.map(move |_| store.view()).boxed(),
            Some(interval) => changes.throttle(interval).map(move |_| store.view()).boxed(),
        }
    }

    pub fn edges(&self) -> EdgeValues {
        *self.edges.lock()
    }

    /// Send new boundary values to every target chip.
    pub async fn push_edges(&self, edges: EdgeValues) -> Result<usize> {
        *self.edges.lock() = edges;
        let sent = self.sender.control_all(ControlCommand::SetEdges, edges).await?;
        debug!(?edges, sent, "Edge values pushed");
        Ok(sent)
    }

    /// Move one edge by the configured step and push the result.
    pub async fn nudge_edge(&self, edge: Edge, raise: bool) -> Result<usize> {
        let edges = {
            let mut edges = self.edges.lock();
            let step = if raise { self.alter_step } else { -self.alter_step };
            edges.nudge(edge, step);
            *edges
        };
        self.push_edges(edges).await
    }

    /// Pause the simulation and freeze the display.
    pub async fn freeze(&self) -> Result<usize> {
        let sent = self.sender.control_all(ControlCommand::Pause, self.edges()).await?;
        self.store.set_frozen(true);
        info!("Display frozen");
        Ok(sent)
    }

    /// Resume the simulation and unfreeze the display.
    pub async fn unfreeze(&self) -> Result<usize> {
        let sent = self.sender.control_all(ControlCommand::Resume, self.edges()).await?;
        self.store.set_frozen(false);
        info!("Display unfrozen");
        Ok(sent)
    }

    /// Start recording incoming traffic.
    pub fn start_capture(&self, format: CaptureFormat, path: impl AsRef<Path>) -> Result<()> {
        self.recorder.open(format, path)
    }

    pub fn pause_capture(&self) -> Result<()> {
        self.recorder.pause()
    }

    pub fn resume_capture(&self) -> Result<()> {
        self.recorder.resume()
    }

    pub fn stop_capture(&self) -> Result<CaptureSummary> {
        self.recorder.close()
    }

    /// Replay a capture into our own listener, as though the board sent it.
    ///
    /// The sender is pointed at the listening port on loopback, or on the
    /// board IP already known to the sender, whether pinned or learned.
    pub async fn replay(
        &self,
        path: impl AsRef<Path>,
        speed: ReplaySpeed,
    ) -> Result<ReplayConnection> {
        let port = self
            .local_addr
            .map(|addr| addr.port())
            .ok_or_else(|| VisError::config("replay needs a listening socket"))?;
        let ip = self.sender.endpoint().ip.unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        self.sender.preseed(SocketAddr::new(ip, port));
        ReplayConnection::start(path, speed, Arc::clone(&self.sender), self.store.clone()).await
    }

    /// Stop the simulation, close any capture and wait for the receive loop.
    pub async fn shutdown(&self) -> Result<ShutdownSummary> {
        if let Err(e) = self.sender.control_all(ControlCommand::Stop, self.edges()).await {
            warn!("Failed to send stop to the board: {}", e);
        }

        let capture = match self.recorder.active_format() {
            Some(_) => Some(self.recorder.close()?),
            None => None,
        };

        self.cancel.cancel();
        let task = self.task.lock().take();
        let stats = match task {
            Some(task) => task
                .await
                .map_err(|e| VisError::transport(format!("receive loop failed to join: {e}")))??,
            None => self.stats(),
        };

        info!(frames = stats.frames, "Live connection shut down");
        Ok(ShutdownSummary { stats, capture })
    }
}

impl Drop for LiveConnection {
    fn drop(&mut self) {
        debug!("Dropping live connection");
        self.cancel.cancel();
    }
}
