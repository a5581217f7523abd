//! End-to-end client/server exchanges over real loopback sockets.

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wirebench::{
    client,
    config::{Discipline, RunConfig, TransportKind},
    metrics::RunMetrics,
    server::{self, StopReason},
    transport::{ClientSession, ServerSession, ACK, FILLER},
};

fn run_config(
    transport: TransportKind,
    discipline: Discipline,
    total_size: u64,
    block_size: u64,
) -> RunConfig {
    RunConfig {
        transport,
        discipline,
        host: "127.0.0.1".into(),
        port: 0,
        marker: "FIN".into(),
        total_size,
        block_size,
        ack_timeout_ms: 1_000,
    }
}

/// Binds a server on an ephemeral port, points the client at it, and runs
/// both to completion.
async fn run_pair(mut config: RunConfig) -> (RunMetrics, (RunMetrics, StopReason)) {
    let session = ServerSession::bind(&config).await.expect("bind server");
    config.port = session.local_addr().expect("local addr").port();

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        server::run_with_session(&server_config, session)
            .await
            .expect("server run")
    });

    let client_metrics = client::run(&config).await.expect("client run");
    let server_outcome = tokio::time::timeout(Duration::from_secs(20), server)
        .await
        .expect("server timed out")
        .expect("server task panicked");
    (client_metrics, server_outcome)
}

#[tokio::test]
async fn tcp_stop_and_wait_round_trip() {
    let config = run_config(TransportKind::Tcp, Discipline::StopAndWait, 20 * 1024, 1024);
    let (client_metrics, (server_metrics, reason)) = run_pair(config).await;

    assert_eq!(client_metrics.blocks(), 20);
    assert_eq!(client_metrics.bytes(), 20 * 1024);
    assert_eq!(server_metrics.blocks(), 20);
    assert_eq!(server_metrics.bytes(), 20 * 1024);
    assert_eq!(reason, StopReason::MarkerSeen);
}

#[tokio::test]
async fn udp_streaming_counts_every_datagram() {
    // Datagram boundaries are preserved on loopback, so streaming yields
    // exact per-block counts here.
    let config = run_config(TransportKind::Udp, Discipline::Streaming, 50 * 512, 512);
    let (client_metrics, (server_metrics, reason)) = run_pair(config).await;

    assert_eq!(client_metrics.blocks(), 50);
    assert_eq!(client_metrics.bytes(), 50 * 512);
    assert_eq!(server_metrics.blocks(), 50);
    assert_eq!(server_metrics.bytes(), 50 * 512);
    assert_eq!(reason, StopReason::MarkerSeen);
}

#[tokio::test]
async fn udp_stop_and_wait_end_to_end() {
    let config = run_config(TransportKind::Udp, Discipline::StopAndWait, 5_000, 1_000);
    let (client_metrics, (server_metrics, reason)) = run_pair(config).await;

    assert_eq!(client_metrics.blocks(), 5);
    assert_eq!(client_metrics.bytes(), 5_000);
    assert_eq!(client_metrics.failed(), 0);
    assert_eq!(server_metrics.blocks(), 5);
    assert_eq!(server_metrics.bytes(), 5_000);
    assert_eq!(reason, StopReason::MarkerSeen);
}

#[tokio::test]
async fn quic_stop_and_wait_round_trip() {
    let config = run_config(TransportKind::Quic, Discipline::StopAndWait, 5 * 1024, 1024);
    let (client_metrics, (server_metrics, reason)) = run_pair(config).await;

    assert_eq!(client_metrics.blocks(), 5);
    assert_eq!(client_metrics.bytes(), 5 * 1024);
    assert_eq!(server_metrics.blocks(), 5);
    assert_eq!(server_metrics.bytes(), 5 * 1024);
    assert_eq!(reason, StopReason::MarkerSeen);
}

#[tokio::test]
async fn termination_marker_is_not_counted_as_data() {
    let mut config = run_config(TransportKind::Tcp, Discipline::Streaming, 1_024, 1_024);
    let session = ServerSession::bind(&config).await.expect("bind server");
    config.port = session.local_addr().expect("local addr").port();

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        server::run_with_session(&server_config, session)
            .await
            .expect("server run")
    });

    // Degenerate zero-block run: the marker is the sole payload.
    let mut client = ClientSession::connect(&config).await.expect("connect");
    client
        .send(config.marker.as_bytes())
        .await
        .expect("send marker");
    client.close().await.expect("close");

    let (metrics, reason) = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server timed out")
        .expect("server task panicked");
    assert_eq!(metrics.blocks(), 0);
    assert_eq!(metrics.bytes(), 0);
    assert_eq!(reason, StopReason::MarkerSeen);
}

#[tokio::test]
async fn premature_close_reports_partial_metrics() {
    let mut config = run_config(TransportKind::Tcp, Discipline::Streaming, 4_096, 1_024);
    let session = ServerSession::bind(&config).await.expect("bind server");
    config.port = session.local_addr().expect("local addr").port();

    let server_config = config.clone();
    let server = tokio::spawn(async move {
        server::run_with_session(&server_config, session)
            .await
            .expect("server run")
    });

    // One block, then the peer vanishes without a marker.
    let mut client = ClientSession::connect(&config).await.expect("connect");
    client
        .send(&vec![FILLER; 1_024])
        .await
        .expect("send block");
    client.close().await.expect("close");

    let (metrics, reason) = tokio::time::timeout(Duration::from_secs(10), server)
        .await
        .expect("server timed out")
        .expect("server task panicked");
    assert_eq!(metrics.blocks(), 1);
    assert_eq!(metrics.bytes(), 1_024);
    assert_eq!(reason, StopReason::PeerClosed);
}

#[tokio::test]
async fn stop_and_wait_keeps_at_most_one_block_in_flight() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind harness");
    let port = listener.local_addr().expect("local addr").port();

    // A hand-rolled server that withholds the acknowledgment and checks
    // that the client does not run ahead of it.
    let harness = tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.expect("accept");
        let mut block = vec![0u8; 1_024];
        stream.read_exact(&mut block).await.expect("first block");

        tokio::time::sleep(Duration::from_millis(200)).await;
        let mut probe = [0u8; 1];
        match stream.try_read(&mut probe) {
            Err(e) => assert_eq!(e.kind(), std::io::ErrorKind::WouldBlock),
            Ok(n) => panic!("client sent {n} byte(s) before the acknowledgment"),
        }
        stream.write_all(&ACK).await.expect("first ack");

        stream.read_exact(&mut block).await.expect("second block");
        stream.write_all(&ACK).await.expect("second ack");

        let mut marker = [0u8; 3];
        stream.read_exact(&mut marker).await.expect("marker");
        assert_eq!(&marker, b"FIN");
        stream.write_all(&ACK).await.expect("final ack");
    });

    let mut config = run_config(TransportKind::Tcp, Discipline::StopAndWait, 2_048, 1_024);
    config.port = port;
    let metrics = client::run(&config).await.expect("client run");
    assert_eq!(metrics.blocks(), 2);
    assert_eq!(metrics.bytes(), 2_048);
    harness.await.expect("harness panicked");
}
