// # Comm Trait
//
// Defines the interface a byte-oriented, self-healing transport exposes to
// embedders. `TcpLink` is the TCP implementation; tests and embedders can
// substitute their own.
//
// ## Usage
//
// ```rust,ignore
// use relink_core::{Comm, LinkEvent};
// use tokio_stream::StreamExt;
//
// async fn watch(link: &dyn Comm) {
//     let mut events = link.subscribe();
//     link.start();
//     while let Some(event) = events.next().await {
//         println!("link event: {:?}", event);
//     }
// }
// ```

use std::pin::Pin;

use async_trait::async_trait;
use tokio_stream::Stream;

use crate::event::LinkEvent;

/// Trait for self-healing transport implementations
///
/// Implementations own their connection lifecycle entirely: callers start
/// the transport once, may send any number of payloads, and stop it once.
/// Failure recovery never surfaces through this interface; callers observe
/// the Connected/Disconnected/Data notification stream instead.
#[async_trait]
pub trait Comm: Send + Sync {
    /// Begin the resolve/connect/receive cycle. Idempotent; returns
    /// immediately.
    fn start(&self);

    /// Tear the transport down. Idempotent. After this returns, no further
    /// notification is delivered until a new `start`.
    async fn stop(&self);

    /// Best-effort write. Dropped silently while not connected.
    fn send(&self, payload: &[u8]);

    /// True between a `start` and the matching `stop`.
    fn is_started(&self) -> bool;

    /// True only while a connection is established.
    fn is_connected(&self) -> bool;

    /// Register a subscriber and return its notification stream.
    ///
    /// Per-subscriber delivery order matches occurrence order: Data events
    /// arrive in socket read order, and Connected/Disconnected strictly
    /// alternate starting with Connected.
    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = LinkEvent> + Send + 'static>>;
}
