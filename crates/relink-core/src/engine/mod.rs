//! Self-healing TCP link engine
//!
//! The engine owns the whole socket lifecycle: hostname resolution,
//! connection, the receive loop, and transparent reconnection after any
//! failure. Callers never manage retries; they observe the link through
//! the subscriber event stream.
//!
//! ## Architecture
//!
//! ```text
//!                 start/stop/send
//!  caller ──────────────────────────► TcpLink (handle)
//!                                        │ command channel
//!                                        ▼
//!                                  supervising task ── owns the socket
//!                                        │
//!                                        ▼
//!                                    EventHub ──► subscribers
//! ```
//!
//! The supervising task is an explicit state machine:
//!
//! ```text
//! Resolving ──ok──► Connecting ──ok──► Connected
//!    ▲ │ backoff       ▲ │ backoff        │
//!    └─┘               └─┘ ◄──────────────┘  peer closed / peer reset
//! ```
//!
//! Resolution retries indefinitely. Reconnection after a lost connection
//! targets the endpoint resolved at start; the hostname is not re-resolved
//! until the link is stopped and started again.
//!
//! ## Threading
//!
//! The socket is owned exclusively by the supervising task. `start`, `stop`
//! and `send` communicate with it over an unbounded command channel, so no
//! lock is ever held across network I/O. Dropping the command channel is the
//! stop signal; every suspension point observes it and winds down without
//! side effects.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpStream, lookup_host};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::Stream;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, info, trace, warn};

use crate::config::LinkConfig;
use crate::error::{Disruption, LinkError, Result};
use crate::event::{EventHub, LinkEvent};
use crate::traits::Comm;

/// Commands accepted by the supervising task
enum Command {
    /// Write a payload to the socket
    Send(Vec<u8>),
}

/// Handle to a self-healing TCP link.
///
/// ## Lifecycle
///
/// 1. Create with [`TcpLink::new()`]
/// 2. Register subscribers with [`TcpLink::subscribe()`]
/// 3. [`TcpLink::start()`] spawns the supervising task and returns
/// 4. The link reconnects on its own until [`TcpLink::stop()`]
/// 5. A later `start()` opens a fresh cycle from scratch
///
/// `start` and `stop` are idempotent; `send` is fire-and-forget and is
/// silently dropped while the link is not connected.
pub struct TcpLink {
    config: LinkConfig,
    hub: Arc<EventHub>,
    active: Mutex<Option<Active>>,
}

/// Per-run state held by the handle between `start` and `stop`
struct Active {
    command_tx: mpsc::UnboundedSender<Command>,
    supervisor: JoinHandle<()>,
}

impl TcpLink {
    /// Create a link for the given endpoint.
    ///
    /// The endpoint is fixed for the lifetime of the link. Fails if the
    /// configuration does not validate.
    pub fn new(config: LinkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            hub: Arc::new(EventHub::new()),
            active: Mutex::new(None),
        })
    }

    /// The configuration this link was created with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Register a subscriber and return its event stream.
    ///
    /// Subscribers may register at any point; each receives every
    /// notification emitted after registration, in occurrence order.
    pub fn subscribe(&self) -> UnboundedReceiverStream<LinkEvent> {
        UnboundedReceiverStream::new(self.hub.subscribe())
    }

    /// Start the link. No-op if already started.
    ///
    /// Returns immediately; resolution, connection and receiving all happen
    /// on the spawned supervising task. Must be called from within a Tokio
    /// runtime.
    pub fn start(&self) {
        let mut active = self.active.lock().unwrap();
        if active.is_some() {
            return;
        }

        let epoch = self.hub.begin();
        let (command_tx, commands) = mpsc::unbounded_channel();
        let supervisor = tokio::spawn(
            Supervisor {
                config: self.config.clone(),
                hub: Arc::clone(&self.hub),
                epoch,
                commands,
            }
            .run(),
        );

        *active = Some(Active {
            command_tx,
            supervisor,
        });
        info!("link to {}:{} started", self.config.host, self.config.port);
    }

    /// Stop the link. No-op if not started.
    ///
    /// Emits the final Disconnected if currently connected, then awaits the
    /// supervising task, so the socket is closed and released by the time
    /// this returns. After it returns, no further notification fires until
    /// a new `start()`.
    pub async fn stop(&self) {
        let active = self.active.lock().unwrap().take();
        let Some(active) = active else {
            return;
        };

        // Closing the hub first makes post-stop delivery impossible even
        // while the supervisor is still unwinding.
        self.hub.close();
        drop(active.command_tx);
        let _ = active.supervisor.await;
        info!("link to {}:{} stopped", self.config.host, self.config.port);
    }

    /// Queue a payload for the socket, best effort.
    ///
    /// Silently dropped while the link is not connected; this transport
    /// offers no synchronous delivery guarantee, so no error surfaces.
    pub fn send(&self, payload: &[u8]) {
        let active = self.active.lock().unwrap();
        let Some(active) = active.as_ref() else {
            trace!("send dropped: link not started");
            return;
        };
        if !self.hub.is_connected() {
            trace!("send dropped: link not connected");
            return;
        }
        if active.command_tx.send(Command::Send(payload.to_vec())).is_err() {
            trace!("send dropped: supervisor already gone");
        }
    }

    /// True between a `start()` and the matching `stop()`.
    pub fn is_started(&self) -> bool {
        self.active.lock().unwrap().is_some()
    }

    /// True only while a connection is established.
    pub fn is_connected(&self) -> bool {
        self.hub.is_connected()
    }
}

#[async_trait]
impl Comm for TcpLink {
    fn start(&self) {
        TcpLink::start(self);
    }

    async fn stop(&self) {
        TcpLink::stop(self).await;
    }

    fn send(&self, payload: &[u8]) {
        TcpLink::send(self, payload);
    }

    fn is_started(&self) -> bool {
        TcpLink::is_started(self)
    }

    fn is_connected(&self) -> bool {
        TcpLink::is_connected(self)
    }

    fn subscribe(&self) -> Pin<Box<dyn Stream<Item = LinkEvent> + Send + 'static>> {
        Box::pin(TcpLink::subscribe(self))
    }
}

/// Where the state machine goes after one step
enum Next {
    /// Enter the phase immediately
    Advance(Phase),
    /// Wait out the retry delay, then enter the phase
    Backoff(Phase),
    /// Stop requested or run superseded; wind down
    Halt,
}

/// One step of the link state machine
enum Phase {
    Resolving,
    Connecting(SocketAddr),
    Connected { addr: SocketAddr, stream: TcpStream },
}

/// The supervising task. Owns the socket; drives one asynchronous step at a
/// time so the retry logic stays linear.
struct Supervisor {
    config: LinkConfig,
    hub: Arc<EventHub>,
    epoch: u64,
    commands: mpsc::UnboundedReceiver<Command>,
}

impl Supervisor {
    async fn run(mut self) {
        debug!(
            "supervisor for {}:{} entering resolve",
            self.config.host, self.config.port
        );

        let mut phase = Phase::Resolving;
        loop {
            let next = match phase {
                Phase::Resolving => self.resolve().await,
                Phase::Connecting(addr) => self.connect(addr).await,
                Phase::Connected { addr, stream } => self.pump(addr, stream).await,
            };
            phase = match next {
                Next::Advance(next_phase) => next_phase,
                Next::Backoff(next_phase) => {
                    if !self.backoff().await {
                        break;
                    }
                    next_phase
                }
                Next::Halt => break,
            };
        }

        debug!(
            "supervisor for {}:{} exited",
            self.config.host, self.config.port
        );
    }

    /// One resolution attempt. Picks the first IPv4 result; an empty result
    /// set counts as a failure and is retried like any other.
    async fn resolve(&mut self) -> Next {
        let host = self.config.host.clone();
        let port = self.config.port;

        match until_stopped(&mut self.commands, lookup_host((host.clone(), port))).await {
            None => Next::Halt,
            Some(Ok(mut addrs)) => match addrs.find(SocketAddr::is_ipv4) {
                Some(addr) => {
                    debug!("resolved {} to {}", host, addr.ip());
                    Next::Advance(Phase::Connecting(addr))
                }
                None => {
                    let err = LinkError::NoAddress { host };
                    warn!("{}; retrying in {} ms", err, self.retry_delay_ms());
                    Next::Backoff(Phase::Resolving)
                }
            },
            Some(Err(source)) => {
                let err = LinkError::Resolution { host, source };
                warn!("{}; retrying in {} ms", err, self.retry_delay_ms());
                Next::Backoff(Phase::Resolving)
            }
        }
    }

    /// One connection attempt against the resolved endpoint.
    async fn connect(&mut self, addr: SocketAddr) -> Next {
        match until_stopped(&mut self.commands, TcpStream::connect(addr)).await {
            None => Next::Halt,
            Some(Ok(stream)) => {
                if !self.hub.connected(self.epoch) {
                    return Next::Halt;
                }
                info!(
                    "link to {}:{} connected ({})",
                    self.config.host, self.config.port, addr
                );
                Next::Advance(Phase::Connected { addr, stream })
            }
            Some(Err(source)) => {
                let err = LinkError::Connect { addr, source };
                warn!("{}; retrying in {} ms", err, self.retry_delay_ms());
                Next::Backoff(Phase::Connecting(addr))
            }
        }
    }

    /// The connected phase: receive continuously, write queued sends, watch
    /// for stop.
    ///
    /// Every successful read delivers a fresh copy of exactly the bytes
    /// received, then immediately rearms the next read. No acknowledgment
    /// is awaited from subscribers.
    async fn pump(&mut self, addr: SocketAddr, stream: TcpStream) -> Next {
        let (mut reader, mut writer) = stream.into_split();
        let mut scratch = vec![0u8; self.config.tuning.recv_buffer_bytes];
        let mut receiving = true;

        loop {
            tokio::select! {
                read = reader.read(&mut scratch), if receiving => match read {
                    Ok(0) => {
                        return teardown(&self.hub, self.epoch, writer, addr, Disruption::PeerClosed).await;
                    }
                    Ok(count) => {
                        if !self.hub.data(self.epoch, scratch[..count].to_vec()) {
                            return Next::Halt;
                        }
                    }
                    Err(err) => match Disruption::from_error(&err) {
                        disruption @ (Disruption::PeerReset | Disruption::PeerClosed) => {
                            return teardown(&self.hub, self.epoch, writer, addr, disruption).await;
                        }
                        Disruption::Unclassified => {
                            // Policy: an unclassified read error halts the
                            // receive arm only. The link stays up and the
                            // send path remains the liveness detector.
                            error!("receive from {} failed, receive loop halted: {}", addr, err);
                            receiving = false;
                        }
                    }
                },
                command = self.commands.recv() => match command {
                    Some(Command::Send(payload)) => {
                        if let Err(err) = writer.write_all(&payload).await {
                            match Disruption::from_error(&err) {
                                disruption @ (Disruption::PeerReset | Disruption::PeerClosed) => {
                                    return teardown(&self.hub, self.epoch, writer, addr, disruption).await;
                                }
                                Disruption::Unclassified => {
                                    error!("send to {} failed: {}", addr, err);
                                }
                            }
                        }
                    }
                    None => return Next::Halt,
                },
            }
        }
    }

    /// Race the retry delay against stop. Returns false when stop won.
    async fn backoff(&mut self) -> bool {
        let delay = tokio::time::sleep(Duration::from_millis(self.retry_delay_ms()));
        until_stopped(&mut self.commands, delay).await.is_some()
    }

    fn retry_delay_ms(&self) -> u64 {
        self.config.tuning.retry_delay_ms
    }
}

/// Leave the connected phase after a detected disconnect: shut the socket
/// down gracefully, emit Disconnected, and re-enter Connecting against the
/// same endpoint.
async fn teardown(
    hub: &EventHub,
    epoch: u64,
    mut writer: OwnedWriteHalf,
    addr: SocketAddr,
    cause: Disruption,
) -> Next {
    info!("link to {} lost: {:?}", addr, cause);
    let _ = writer.shutdown().await;
    if hub.disconnected(epoch) {
        Next::Advance(Phase::Connecting(addr))
    } else {
        Next::Halt
    }
}

/// Drive `work` to completion unless stop is requested first.
///
/// Sends arriving while the link is between connections are dropped here.
async fn until_stopped<T>(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    work: impl Future<Output = T>,
) -> Option<T> {
    tokio::pin!(work);
    loop {
        tokio::select! {
            out = &mut work => return Some(out),
            command = commands.recv() => match command {
                Some(Command::Send(_)) => {
                    trace!("send dropped: link not connected");
                }
                None => return None,
            },
        }
    }
}
