//! Contract: byte delivery
//!
//! Constraints verified:
//! - every inbound chunk is delivered as one Data event, in arrival order,
//!   sized to exactly the bytes read
//! - concatenating Data payloads reproduces the peer's byte stream
//! - `send` reaches the peer while connected
//! - `send` while disconnected is silently dropped

mod common;

use std::time::Duration;

use common::*;
use relink_core::LinkEvent;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_test::assert_ok;

#[tokio::test]
async fn chunks_arrive_in_order_with_exact_payloads() {
    let peer = TestPeer::bind().await;
    let link = test_link("127.0.0.1", peer.port());
    let mut events = link.subscribe();

    link.start();
    let mut server_side = peer.accept().await;
    assert_eq!(expect_event(&mut events).await, LinkEvent::Connected);

    tokio_test::assert_ok!(server_side.write_all(&[0x01, 0x02, 0x03]).await);
    assert_eq!(
        expect_event(&mut events).await,
        LinkEvent::Data(vec![0x01, 0x02, 0x03])
    );
    assert!(link.is_connected());

    // A gap between writes keeps the chunks distinct on the wire.
    tokio::time::sleep(Duration::from_millis(100)).await;

    tokio_test::assert_ok!(server_side.write_all(&[0x04, 0x05]).await);
    assert_eq!(expect_event(&mut events).await, LinkEvent::Data(vec![0x04, 0x05]));
    assert!(link.is_connected());

    link.stop().await;
}

#[tokio::test]
async fn concatenated_payloads_reproduce_the_peer_stream() {
    let peer = TestPeer::bind().await;
    let link = test_link("127.0.0.1", peer.port());
    let mut events = link.subscribe();

    link.start();
    let mut server_side = peer.accept().await;
    assert_eq!(expect_event(&mut events).await, LinkEvent::Connected);

    let sent: Vec<u8> = (0u16..600).map(|n| (n % 251) as u8).collect();
    for chunk in sent.chunks(200) {
        tokio_test::assert_ok!(server_side.write_all(chunk).await);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let mut received = Vec::new();
    while received.len() < sent.len() {
        match expect_event(&mut events).await {
            LinkEvent::Data(payload) => {
                assert!(!payload.is_empty(), "empty chunks are never delivered");
                received.extend_from_slice(&payload);
            }
            event => panic!("unexpected event while receiving: {:?}", event),
        }
    }
    assert_eq!(received, sent);

    link.stop().await;
}

#[tokio::test]
async fn send_reaches_the_peer_while_connected() {
    let peer = TestPeer::bind().await;
    let link = test_link("127.0.0.1", peer.port());
    let mut events = link.subscribe();

    link.start();
    let mut server_side = peer.accept().await;
    assert_eq!(expect_event(&mut events).await, LinkEvent::Connected);

    link.send(b"hello");

    let mut inbound = [0u8; 5];
    tokio::time::timeout(EVENT_WAIT, server_side.read_exact(&mut inbound))
        .await
        .expect("payload should arrive within the wait budget")
        .expect("peer read");
    assert_eq!(&inbound, b"hello");

    link.stop().await;
}

#[tokio::test]
async fn send_while_disconnected_is_silently_dropped() {
    let peer = TestPeer::bind().await;
    let port = peer.port();
    drop(peer);

    let link = test_link("127.0.0.1", port);
    let mut events = link.subscribe();

    // Never started: dropped.
    link.send(b"into the void");

    // Started but unable to connect: still dropped, still silent.
    link.start();
    link.send(b"into the void");
    expect_silence(&mut events).await;
    assert!(!link.is_connected());

    link.stop().await;
    link.send(b"after stop");
    expect_silence(&mut events).await;
}
