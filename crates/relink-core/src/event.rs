//! Link notifications and the subscriber fan-out registry
//!
//! Every notification flows through [`EventHub`]. The hub is gated by a run
//! epoch plus an open flag: `start()` opens a new epoch, `stop()` closes the
//! hub, and an emission whose epoch is stale or that arrives after close is
//! discarded. This is what makes "no notification fires after `stop`
//! returns" hold even while a superseded supervising task is still winding
//! down.
//!
//! The connected flag is mutated only while the hub lock is held, alongside
//! the matching Connected/Disconnected emission, so `is_connected()` and the
//! event stream can never disagree about the transition order.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;

/// Events emitted by a link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// A connection to the server was established
    Connected,

    /// The connection was lost, or the link was stopped while connected
    Disconnected,

    /// One inbound chunk, exactly as read from the socket
    Data(Vec<u8>),
}

struct HubInner {
    /// Bumped by every `begin`; emissions carry the epoch of their run
    epoch: u64,
    /// False between `close` and the next `begin`
    open: bool,
    /// Fan-out targets, in registration order
    subscribers: Vec<mpsc::UnboundedSender<LinkEvent>>,
}

/// Gated subscriber registry shared by the handle and the supervising task.
pub(crate) struct EventHub {
    connected: AtomicBool,
    inner: Mutex<HubInner>,
}

impl EventHub {
    pub(crate) fn new() -> Self {
        Self {
            connected: AtomicBool::new(false),
            inner: Mutex::new(HubInner {
                epoch: 0,
                open: false,
                subscribers: Vec::new(),
            }),
        }
    }

    /// Register a subscriber. Allowed at any point in the lifecycle.
    pub(crate) fn subscribe(&self) -> mpsc::UnboundedReceiver<LinkEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.inner.lock().unwrap().subscribers.push(tx);
        rx
    }

    /// Open a new run and return its epoch.
    pub(crate) fn begin(&self) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        inner.epoch += 1;
        inner.open = true;
        inner.epoch
    }

    /// Close the hub. Emits the final Disconnected if the link was
    /// connected. After this returns, nothing is delivered until `begin`.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.open = false;
        if self.connected.swap(false, Ordering::SeqCst) {
            fan_out(&mut inner.subscribers, LinkEvent::Disconnected);
        }
    }

    /// Mark the link connected and emit Connected.
    ///
    /// Returns false when the run is superseded or closed; the caller must
    /// wind down without side effects.
    pub(crate) fn connected(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.open || inner.epoch != epoch {
            return false;
        }
        self.connected.store(true, Ordering::SeqCst);
        fan_out(&mut inner.subscribers, LinkEvent::Connected);
        true
    }

    /// Mark the link disconnected and emit Disconnected.
    pub(crate) fn disconnected(&self, epoch: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.open || inner.epoch != epoch {
            return false;
        }
        self.connected.store(false, Ordering::SeqCst);
        fan_out(&mut inner.subscribers, LinkEvent::Disconnected);
        true
    }

    /// Deliver one inbound chunk.
    pub(crate) fn data(&self, epoch: u64, payload: Vec<u8>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if !inner.open || inner.epoch != epoch {
            return false;
        }
        fan_out(&mut inner.subscribers, LinkEvent::Data(payload));
        true
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Deliver to every live subscriber, pruning the ones that went away.
fn fan_out(subscribers: &mut Vec<mpsc::UnboundedSender<LinkEvent>>, event: LinkEvent) {
    subscribers.retain(|tx| tx.send(event.clone()).is_ok());
}
