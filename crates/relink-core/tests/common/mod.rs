//! Shared helpers for the link contract tests
//!
//! Provides a loopback stand-in for the server side of the link plus
//! event-stream expectations with explicit time bounds, so no contract
//! test can hang silently.

#![allow(dead_code)]

use std::time::Duration;

use relink_core::{LinkConfig, LinkEvent, TcpLink, TuningConfig};
use tokio::net::{TcpListener, TcpStream};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::UnboundedReceiverStream;

/// Upper bound for anything that should happen promptly
pub const EVENT_WAIT: Duration = Duration::from_secs(5);

/// How long "nothing happens" must hold before we believe it
pub const SILENCE_WAIT: Duration = Duration::from_millis(300);

/// Loopback listener playing the server role.
pub struct TestPeer {
    listener: TcpListener,
}

impl TestPeer {
    pub async fn bind() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback listener");
        Self { listener }
    }

    pub fn port(&self) -> u16 {
        self.listener.local_addr().expect("listener address").port()
    }

    /// Accept the link's next connection, bounded by [`EVENT_WAIT`].
    pub async fn accept(&self) -> TcpStream {
        let (stream, _) = tokio::time::timeout(EVENT_WAIT, self.listener.accept())
            .await
            .expect("link should connect within the wait budget")
            .expect("accept link connection");
        stream
    }
}

/// Link configuration with a fast retry delay so contract tests do not sit
/// out the production two-second backoff.
pub fn test_config(host: &str, port: u16) -> LinkConfig {
    LinkConfig::new(host, port).with_tuning(TuningConfig {
        retry_delay_ms: 50,
        recv_buffer_bytes: 1024,
    })
}

pub fn test_link(host: &str, port: u16) -> TcpLink {
    TcpLink::new(test_config(host, port)).expect("link construction succeeds")
}

/// Wait for the next event, failing the test on timeout.
pub async fn expect_event(events: &mut UnboundedReceiverStream<LinkEvent>) -> LinkEvent {
    tokio::time::timeout(EVENT_WAIT, events.next())
        .await
        .expect("an event should arrive within the wait budget")
        .expect("event stream should stay open")
}

/// Assert that no event arrives for [`SILENCE_WAIT`].
pub async fn expect_silence(events: &mut UnboundedReceiverStream<LinkEvent>) {
    let outcome = tokio::time::timeout(SILENCE_WAIT, events.next()).await;
    assert!(
        outcome.is_err(),
        "expected no event, got {:?}",
        outcome.expect("timeout already ruled out")
    );
}
