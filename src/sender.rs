//! Outbound SDP commands to the board.
//!
//! The board is never configured up front in the usual case: its address is
//! learned from the first telemetry frame that arrives. Until then every send
//! is a no-op that reports `Ok(false)`.

use crate::mapping::CoordinateSpace;
use crate::types::WireFrame;
use crate::{Result, VisError};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use tokio::net::UdpSocket;
use tracing::{debug, info, trace};

/// SDP port (and core) the heat-map application listens on for control.
pub const CONTROL_PORT: u8 = 0x21;

const FLAGS_NO_REPLY: u8 = 7;
const TAG_NONE: u8 = 255;
const SOURCE_PORT: u8 = 0xFF;

/// Control commands understood on [`CONTROL_PORT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ControlCommand {
    Stop = 0,
    SetEdges = 1,
    Pause = 2,
    Resume = 3,
}

/// Where the board is, as far as we know.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BoardEndpoint {
    pub ip: Option<IpAddr>,
    pub port: Option<u16>,
}

impl BoardEndpoint {
    /// Fill in whatever is still unknown from a frame's source address.
    ///
    /// Returns `true` when something was learned. An unknown IP takes the
    /// port along with it; a pinned IP only learns the port.
    pub fn learn(&mut self, addr: SocketAddr) -> bool {
        match (self.ip, self.port) {
            (None, _) => {
                self.ip = Some(addr.ip());
                self.port = Some(addr.port());
                true
            }
            (Some(_), None) => {
                self.port = Some(addr.port());
                true
            }
            (Some(_), Some(_)) => false,
        }
    }

    pub fn socket_addr(&self) -> Option<SocketAddr> {
        Some(SocketAddr::new(self.ip?, self.port?))
    }

    pub fn is_known(&self) -> bool {
        self.socket_addr().is_some()
    }
}

/// Boundary values driven into the heat-map simulation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EdgeValues {
    pub north: f32,
    pub east: f32,
    pub south: f32,
    pub west: f32,
}

impl Default for EdgeValues {
    fn default() -> Self {
        Self { north: 40.0, east: 10.0, south: 10.0, west: 40.0 }
    }
}

/// One side of the heat-map boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    North,
    East,
    South,
    West,
}

impl EdgeValues {
    /// Payload words: each value in 16.16 fixed point, north first.
    pub fn words(&self) -> [u32; 4] {
        [self.north, self.east, self.south, self.west].map(|v| (v * 65536.0) as i32 as u32)
    }

    pub fn nudge(&mut self, edge: Edge, delta: f32) {
        let value = match edge {
            Edge::North => &mut self.north,
            Edge::East => &mut self.east,
            Edge::South => &mut self.south,
            Edge::West => &mut self.west,
        };
        *value += delta;
    }
}

/// UDP sender for SDP frames, shared by the live and replay paths.
#[derive(Debug)]
pub struct Sender {
    socket: UdpSocket,
    endpoint: Mutex<BoardEndpoint>,
    space: CoordinateSpace,
    broadcast: bool,
}

impl Sender {
    /// Bind an outbound socket at `local`.
    ///
    /// With `broadcast` set, control commands go to every chip instead of
    /// a single one.
    pub async fn bind(local: SocketAddr, space: CoordinateSpace, broadcast: bool) -> Result<Self> {
        let socket = UdpSocket::bind(local).await.map_err(|e| {
            VisError::transport_with_source(format!("failed to bind sender to {local}"), e)
        })?;
        Ok(Self::with_socket(socket, space, broadcast))
    }

    pub fn with_socket(socket: UdpSocket, space: CoordinateSpace, broadcast: bool) -> Self {
        Self { socket, endpoint: Mutex::new(BoardEndpoint::default()), space, broadcast }
    }

    pub fn endpoint(&self) -> BoardEndpoint {
        *self.endpoint.lock()
    }

    pub fn space(&self) -> &CoordinateSpace {
        &self.space
    }

    /// Learn the board's address from an inbound frame.
    pub fn learn_endpoint(&self, addr: SocketAddr) -> bool {
        let learned = self.endpoint.lock().learn(addr);
        if learned {
            info!(%addr, "Packet received from board");
        }
        learned
    }

    /// Point the sender at a fixed address, replacing anything learned.
    pub fn preseed(&self, addr: SocketAddr) {
        *self.endpoint.lock() = BoardEndpoint { ip: Some(addr.ip()), port: Some(addr.port()) };
        debug!(%addr, "Sender endpoint preseeded");
    }

    /// Fix the board IP; the port is still learned from traffic.
    pub fn pin_ip(&self, ip: IpAddr) {
        self.endpoint.lock().ip = Some(ip);
        debug!(%ip, "Board IP pinned");
    }

    /// Tiles that control commands are addressed to.
    pub fn targets(&self) -> Vec<usize> {
        let chips = self.space.chip_count();
        if self.broadcast {
            (0..chips).collect()
        } else {
            vec![1.min(chips - 1)]
        }
    }

    /// Send an SDP frame to the chip holding tile `tile`.
    ///
    /// Returns `Ok(false)` without sending while the endpoint is unknown.
    pub async fn send(
        &self,
        tile: usize,
        port: u8,
        command: u16,
        args: [u32; 3],
        data: &[u32],
    ) -> Result<bool> {
        let chip = self
            .space
            .chip_of(tile)
            .ok_or_else(|| VisError::index_out_of_range(tile as i64, self.space.chip_count()))?;
        let mut frame = WireFrame::addressed(command, args, data.to_vec());
        frame.flags = FLAGS_NO_REPLY;
        frame.tag = TAG_NONE;
        frame.dest_port = port;
        frame.srce_port = SOURCE_PORT;
        frame.dest_addr = chip;
        trace!(%chip, port, command, words = data.len(), "Sending SDP frame");
        self.send_raw(&frame.encode()).await
    }

    /// Send already-encoded bytes to the board.
    pub async fn send_raw(&self, bytes: &[u8]) -> Result<bool> {
        let Some(addr) = self.endpoint().socket_addr() else {
            trace!(len = bytes.len(), "No board endpoint yet, dropping outbound frame");
            return Ok(false);
        };
        self.socket
            .send_to(bytes, addr)
            .await
            .map_err(|e| VisError::transport_with_source(format!("send to {addr} failed"), e))?;
        Ok(true)
    }

    async fn control(&self, tile: usize, command: ControlCommand, words: [u32; 4]) -> Result<bool> {
        self.send(tile, CONTROL_PORT, command as u16, [0; 3], &words).await
    }

    pub async fn set_edges(&self, tile: usize, edges: EdgeValues) -> Result<bool> {
        self.control(tile, ControlCommand::SetEdges, edges.words()).await
    }

    pub async fn stop(&self, tile: usize) -> Result<bool> {
        self.control(tile, ControlCommand::Stop, [0; 4]).await
    }

    pub async fn pause(&self, tile: usize) -> Result<bool> {
        self.control(tile, ControlCommand::Pause, [0; 4]).await
    }

    pub async fn resume(&self, tile: usize) -> Result<bool> {
        self.control(tile, ControlCommand::Resume, [0; 4]).await
    }

    /// Send `command` to every target, returning how many frames went out.
    pub async fn control_all(&self, command: ControlCommand, edges: EdgeValues) -> Result<usize> {
        let words = match command {
            ControlCommand::SetEdges => edges.words(),
            _ => [0; 4],
        };
        let mut sent = 0;
        for tile in self.targets() {
            if self.control(tile, command, words).await? {
                sent += 1;
            }
        }
        Ok(sent)
    }
}
