//! Contract: hostname resolution
//!
//! Constraints verified:
//! - an unresolvable hostname never produces Connected and keeps the link
//!   retrying until stop
//! - stop lands promptly even while the link is stuck in resolution retries
//! - a resolvable name connects and the IPv4 result is used

mod common;

use std::time::Duration;

use common::*;
use relink_core::LinkEvent;

#[tokio::test]
async fn unresolvable_hostname_never_connects() {
    // The .invalid TLD is reserved and guaranteed not to resolve.
    let link = test_link("relink-test.invalid", 9000);
    let mut events = link.subscribe();

    link.start();
    assert!(link.is_started());

    expect_silence(&mut events).await;
    assert!(!link.is_connected());

    // The supervisor is mid-retry; stop must still land promptly.
    tokio::time::timeout(EVENT_WAIT, link.stop())
        .await
        .expect("stop should land promptly during resolution retries");
    assert!(!link.is_started());
    expect_silence(&mut events).await;
}

#[tokio::test]
async fn restart_after_failed_resolution_is_clean() {
    let link = test_link("relink-test.invalid", 9000);
    let mut events = link.subscribe();

    for _ in 0..2 {
        link.start();
        tokio::time::sleep(Duration::from_millis(120)).await;
        link.stop().await;
    }

    expect_silence(&mut events).await;
}

#[tokio::test]
async fn resolvable_name_connects_over_ipv4() {
    let peer = TestPeer::bind().await;

    // "localhost" commonly resolves to ::1 first; the link must pick the
    // IPv4 result, which is where the peer listens.
    let link = test_link("localhost", peer.port());
    let mut events = link.subscribe();

    link.start();
    let _server_side = peer.accept().await;
    assert_eq!(expect_event(&mut events).await, LinkEvent::Connected);
    assert!(link.is_connected());

    link.stop().await;
}
