//! Integration tests for the connection layer
//!
//! These drive a [`LiveConnection`] through an in-process provider or a
//! loopback socket and check what reaches the store, the board and disk.

use super::live::LiveConnection;
use crate::capture::{CaptureFormat, CaptureReader};
use crate::config::VisualiserConfig;
use crate::driver::DriverStats;
use crate::provider::Datagram;
use crate::providers::{ChannelProvider, UdpProvider};
use crate::sender::{Edge, EdgeValues, Sender};
use crate::test_utils::{capture_bytes, fixed, heat_datagram, small_grid};
use crate::types::{ChipAddress, RefreshRate, ReplaySpeed, WireFrame};
use futures::StreamExt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::info;

fn config() -> VisualiserConfig {
    let space = small_grid();
    VisualiserConfig {
        x_dimensions: space.x_dim(),
        y_dimensions: space.y_dim(),
        each_chip_x: space.each_chip_x(),
        each_chip_y: space.each_chip_y(),
        history_size: 64,
        max_frame_rate: 0,
        ..VisualiserConfig::default()
    }
}

fn board_addr() -> SocketAddr {
    "10.1.2.3:40000".parse().unwrap()
}

async fn sender(config: &VisualiserConfig) -> Arc<Sender> {
    let space = config.validate().unwrap();
    Arc::new(Sender::bind("127.0.0.1:0".parse().unwrap(), space, false).await.unwrap())
}

async fn live() -> (mpsc::Sender<Datagram>, LiveConnection) {
    let config = config();
    let (tx, provider) = ChannelProvider::new(16);
    let sender = sender(&config).await;
    let connection = LiveConnection::with_provider(provider, &config, sender).unwrap();
    (tx, connection)
}

/// Poll until the receive loop has handled `frames` frames.
async fn wait_for_frames(connection: &LiveConnection, frames: u64) -> DriverStats {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let stats = connection.stats();
            if stats.frames >= frames {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("receive loop should catch up")
}

async fn receive_frame(board: &UdpSocket) -> WireFrame {
    let mut buf = [0u8; 1600];
    let (len, _) = tokio::time::timeout(Duration::from_secs(2), board.recv_from(&mut buf))
        .await
        .expect("board should receive a command")
        .unwrap();
    WireFrame::decode(&buf[..len]).unwrap()
}

#[tokio::test]
async fn views_follow_incoming_frames() {
    let _ = tracing_subscriber::fmt::try_init();
    let (tx, connection) = live().await;
    let mut views = Box::pin(connection.views(RefreshRate::EveryFrame));

    let initial = tokio::time::timeout(Duration::from_secs(1), views.next())
        .await
        .expect("current view should be yielded immediately")
        .unwrap();
    assert_eq!(initial.defined_cells(), 0);

    let frame = heat_datagram(0, 1, vec![fixed(2.0), fixed(4.0)]);
    tx.send(Datagram::new(frame, board_addr())).await.unwrap();

    let view = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let view = views.next().await.expect("view stream should stay open");
            if view.defined_cells() > 0 {
                return view;
            }
        }
    })
    .await
    .expect("frame should reach the view stream");

    info!(revision = view.revision, "View updated");
    // chip (0, 1) is tile 1, cells 4..8
    assert_eq!(view.snapshot[4], 2.0);
    assert_eq!(view.snapshot[5], 4.0);
    assert_eq!(connection.sender().endpoint().socket_addr(), Some(board_addr()));
}

#[tokio::test]
async fn freeze_pauses_the_board_and_the_display() {
    let (tx, connection) = live().await;
    let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    connection.sender().preseed(board.local_addr().unwrap());

    assert_eq!(connection.freeze().await.unwrap(), 1);
    let pause = receive_frame(&board).await;
    assert_eq!(pause.cmd_rc, 2);
    assert_eq!(pause.dest_addr, ChipAddress::new(0, 1));
    assert!(connection.store().is_frozen());

    tx.send(Datagram::new(heat_datagram(0, 0, vec![1 << 16]), board_addr())).await.unwrap();
    let stats = wait_for_frames(&connection, 1).await;
    assert_eq!(stats.updates_applied, 0);
    assert_eq!(connection.store().view().defined_cells(), 0);

    connection.unfreeze().await.unwrap();
    assert_eq!(receive_frame(&board).await.cmd_rc, 3);
    tx.send(Datagram::new(heat_datagram(0, 0, vec![1 << 16]), board_addr())).await.unwrap();
    wait_for_frames(&connection, 2).await;
    assert_eq!(connection.store().view().snapshot[0], 1.0);
}

#[tokio::test]
async fn edges_are_pushed_and_nudged() {
    let (_tx, connection) = live().await;
    let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    connection.sender().preseed(board.local_addr().unwrap());

    let edges = EdgeValues { north: 1.0, east: 2.0, south: 3.0, west: 4.0 };
    connection.push_edges(edges).await.unwrap();
    let frame = receive_frame(&board).await;
    assert_eq!(frame.cmd_rc, 1);
    assert_eq!(frame.dest_port, 0x21);
    assert_eq!(frame.data, vec![1 << 16, 2 << 16, 3 << 16, 4 << 16]);

    connection.nudge_edge(Edge::North, true).await.unwrap();
    assert_eq!(connection.edges().north, 2.0);
    assert_eq!(receive_frame(&board).await.data[0], 2 << 16);
}

#[tokio::test]
async fn shutdown_stops_the_board_and_closes_the_capture() {
    let (tx, connection) = live().await;
    let board = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    connection.sender().preseed(board.local_addr().unwrap());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.spinn");
    connection.start_capture(CaptureFormat::Raw, &path).unwrap();

    for y in 0..2 {
        tx.send(Datagram::new(heat_datagram(1, y, vec![7 << 16]), board_addr())).await.unwrap();
    }
    wait_for_frames(&connection, 2).await;

    let summary = connection.shutdown().await.unwrap();
    assert_eq!(summary.stats.frames, 2);
    let capture = summary.capture.expect("open capture should be closed");
    assert_eq!(capture.records, 2);
    assert_eq!(receive_frame(&board).await.cmd_rc, 0);

    let reader = CaptureReader::open(&path).unwrap();
    assert_eq!(reader.len(), 2);
    assert_eq!(reader.records()[0].offset_us, 0);
}

#[tokio::test]
async fn replay_feeds_the_live_listener() {
    let _ = tracing_subscriber::fmt::try_init();
    let config = config();
    let provider = UdpProvider::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let sender = sender(&config).await;
    let connection = LiveConnection::with_provider(provider, &config, sender).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("replay.spinn");
    let bytes = capture_bytes(&[
        (0, heat_datagram(1, 1, vec![fixed(5.0)])),
        (400_000, heat_datagram(1, 1, vec![fixed(6.0)])),
    ]);
    std::fs::write(&path, bytes).unwrap();

    let replay = connection.replay(&path, ReplaySpeed::new(2.0)).await.unwrap();
    let summary = replay.wait().await.unwrap();
    assert_eq!(summary.sent, 2);
    assert!(summary.elapsed >= Duration::from_millis(200));

    wait_for_frames(&connection, 1).await;
    assert!(connection.store().is_frozen());
    // chip (1, 1) is tile 3, cell 12
    assert!(connection.store().view().snapshot[12] >= 5.0);
}
