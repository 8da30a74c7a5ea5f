//! Message exchange, framing rules and close semantics over loopback TCP.

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use proptest::prelude::*;
use proptest::test_runner::{Config, TestRunner};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use ws_transport::{ConnectionState, Error, ErrorKind, TransportConfig, WebSocketTransport};

/// Performs the client handshake by hand and returns the bare socket.
async fn raw_client(addr: std::net::SocketAddr) -> anyhow::Result<TcpStream> {
    let mut tcp = TcpStream::connect(addr).await?;
    tcp.write_all(
        b"GET /engine/ HTTP/1.1\r\n\
          Host: localhost\r\n\
          Connection: Upgrade\r\n\
          Upgrade: websocket\r\n\
          Sec-WebSocket-Version: 13\r\n\
          Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
    )
    .await?;

    let mut response = Vec::new();
    while !response.ends_with(b"\r\n\r\n") {
        response.push(tcp.read_u8().await?);
    }
    anyhow::ensure!(
        response.starts_with(b"HTTP/1.1 101"),
        "unexpected response: {}",
        String::from_utf8_lossy(&response)
    );
    Ok(tcp)
}

#[tokio::test]
async fn text_round_trips_both_ways() -> anyhow::Result<()> {
    let (server, client) = common::connected_pair(TransportConfig::default()).await?;

    client.send_message("from client").await?;
    assert_eq!(server.receive_message().await?, "from client");

    server.send_message("from server ✓").await?;
    assert_eq!(client.receive_message().await?, "from server ✓");
    Ok(())
}

#[tokio::test]
async fn message_up_to_buffer_size_round_trips() -> anyhow::Result<()> {
    let config = TransportConfig::default().with_buffer_size(1024);
    let (server, client) = common::connected_pair(config).await?;

    let message = "x".repeat(1024);
    client.send_message(&message).await?;
    assert_eq!(server.receive_message().await?, message);
    Ok(())
}

#[tokio::test]
async fn binary_frame_is_rejected_and_connection_stays_open() -> anyhow::Result<()> {
    common::init_logging();
    let (listener, addr) = common::listen().await?;
    let transport = WebSocketTransport::default();

    let (server, raw) = tokio::join!(
        common::accept_one(&listener, &transport),
        connect_async(common::ws_url(addr))
    );
    let server = server?;
    let (mut raw, _) = raw?;

    raw.send(Message::binary(vec![0xde_u8, 0xad])).await?;
    raw.send(Message::text("still here")).await?;

    let err = server.receive_message().await.unwrap_err();
    assert!(matches!(err, Error::BinaryMessage));
    assert_eq!(err.kind(), ErrorKind::BinaryMessage);
    assert_eq!(server.state(), ConnectionState::Open);

    assert_eq!(server.receive_message().await?, "still here");
    Ok(())
}

#[tokio::test]
async fn empty_text_frame_is_packet_wrong() -> anyhow::Result<()> {
    let (listener, addr) = common::listen().await?;
    let transport = WebSocketTransport::default();

    let (server, raw) = tokio::join!(
        common::accept_one(&listener, &transport),
        connect_async(common::ws_url(addr))
    );
    let server = server?;
    let (mut raw, _) = raw?;

    raw.send(Message::text("")).await?;
    let err = server.receive_message().await.unwrap_err();
    assert!(matches!(err, Error::PacketWrong));
    Ok(())
}

#[tokio::test]
async fn invalid_utf8_text_frame_is_bad_buffer() -> anyhow::Result<()> {
    let (listener, addr) = common::listen().await?;
    let transport = WebSocketTransport::default();

    let (server, raw) = tokio::join!(common::accept_one(&listener, &transport), raw_client(addr));
    let server = server?;
    let mut raw = raw?;

    // FIN + text, masked with a zero key, payload 0xff 0xfe.
    raw.write_all(&[0x81, 0x82, 0, 0, 0, 0, 0xff, 0xfe]).await?;

    let err = server.receive_message().await.unwrap_err();
    assert!(matches!(err, Error::BadBuffer { source: WsError::Utf8(_) }), "{err:?}");
    assert_eq!(err.kind(), ErrorKind::BadBuffer);
    Ok(())
}

#[tokio::test]
async fn message_over_size_limit_is_bad_buffer() -> anyhow::Result<()> {
    let (listener, addr) = common::listen().await?;
    let config = TransportConfig::default()
        .with_buffer_size(256)
        .with_max_message_size(1024);
    let transport = WebSocketTransport::try_new(config)?;

    let (server, raw) = tokio::join!(
        common::accept_one(&listener, &transport),
        connect_async(common::ws_url(addr))
    );
    let server = server?;
    let (mut raw, _) = raw?;

    raw.send(Message::text("y".repeat(4096))).await?;

    let err = server.receive_message().await.unwrap_err();
    assert!(matches!(err, Error::BadBuffer { source: WsError::Capacity(_) }), "{err:?}");
    Ok(())
}

#[test]
fn oversized_buffer_config_is_rejected_before_dialing() {
    let config = TransportConfig::default().with_buffer_size(usize::MAX);
    let err = WebSocketTransport::try_new(config).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Config);
}

#[tokio::test]
async fn unvalidated_oversized_buffer_still_connects() -> anyhow::Result<()> {
    let config = TransportConfig::default().with_buffer_size(usize::MAX);
    let (server, client) = common::connected_pair(config).await?;

    client.send_message("clamped").await?;
    assert_eq!(server.receive_message().await?, "clamped");
    Ok(())
}

#[tokio::test]
async fn receive_deadline_surfaces_timeout() -> anyhow::Result<()> {
    let config = TransportConfig::default().with_receive_timeout(Duration::from_millis(100));
    let (server, _client) = common::connected_pair(config).await?;

    let err = server.receive_message().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(server.state(), ConnectionState::Open);
    Ok(())
}

#[tokio::test]
async fn close_twice_is_a_no_op() -> anyhow::Result<()> {
    let (server, client) = common::connected_pair(TransportConfig::default()).await?;

    client.close().await?;
    client.close().await?;
    assert!(client.is_closed());

    server.close().await.ok();
    server.close().await?;
    Ok(())
}

#[tokio::test]
async fn peer_close_ends_receive() -> anyhow::Result<()> {
    let (server, client) = common::connected_pair(TransportConfig::default()).await?;

    client.close().await?;
    let err = server.receive_message().await.unwrap_err();
    assert!(matches!(err, Error::ConnectionClosed));
    assert!(!server.is_closed());
    Ok(())
}

#[tokio::test]
async fn close_from_another_task_unblocks_reader() -> anyhow::Result<()> {
    let (server, _client) = common::connected_pair(TransportConfig::default()).await?;
    let server = Arc::new(server);

    let reader = Arc::clone(&server);
    let pending = tokio::spawn(async move { reader.receive_message().await });

    tokio::time::sleep(Duration::from_millis(50)).await;
    server.close().await?;

    let result = timeout(Duration::from_secs(2), pending).await??;
    assert!(matches!(result, Err(Error::ConnectionClosed)));
    Ok(())
}

#[tokio::test]
async fn concurrent_reader_and_writer() -> anyhow::Result<()> {
    const COUNT: usize = 200;

    let (server, client) = common::connected_pair(TransportConfig::default()).await?;
    let server = Arc::new(server);
    let client = Arc::new(client);

    // Server echoes; its reader and writer run as separate tasks.
    let (tx, mut rx) = tokio::sync::mpsc::channel::<String>(16);
    let server_reader = Arc::clone(&server);
    let reading = tokio::spawn(async move {
        for _ in 0..COUNT {
            let message = server_reader.receive_message().await?;
            if tx.send(message).await.is_err() {
                break;
            }
        }
        Ok::<_, Error>(())
    });
    let server_writer = Arc::clone(&server);
    let writing = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            server_writer.send_message(&message).await?;
        }
        Ok::<_, Error>(())
    });

    let client_writer = Arc::clone(&client);
    let sending = tokio::spawn(async move {
        for i in 0..COUNT {
            client_writer.send_message(&format!("msg-{i}")).await?;
        }
        Ok::<_, Error>(())
    });

    for i in 0..COUNT {
        assert_eq!(client.receive_message().await?, format!("msg-{i}"));
    }

    sending.await??;
    reading.await??;
    writing.await??;
    Ok(())
}

#[test]
fn any_non_empty_text_round_trips() {
    let rt = Runtime::new().unwrap();
    let (server, client) = rt
        .block_on(common::connected_pair(TransportConfig::default()))
        .unwrap();

    let mut runner = TestRunner::new(Config::with_cases(64));
    runner
        .run(&"\\PC{1,512}", |text| {
            rt.block_on(async {
                client.send_message(&text).await.unwrap();
                let received = server.receive_message().await.unwrap();
                prop_assert_eq!(received, text);
                Ok(())
            })
        })
        .unwrap();
}
