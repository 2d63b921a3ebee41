//! Per-client relay: "subscribe once, forward forever".
//!
//! Each browser connection owns one [`RelaySession`].  The session owns its
//! [`BridgeConnection`] exclusively and walks an explicit state machine:
//!
//! ```text
//! Connecting ──open+subscribe──▶ Relaying ──bus closed / cancel / client gone──▶ Closed
//! ```
//!
//! Two flavours exist ([`RelayKind`]):
//!
//! | Kind | Payload sent to the client | Bus closes |
//! |---|---|---|
//! | `Bridge { convert_units: true }` | message after [`transform::apply`] | `Err(BridgeError::Closed)` |
//! | `Bridge { convert_units: false }` | raw bus text | `Err(BridgeError::Closed)` |
//! | `Log` | `{"log": <message>}` | client closed, `Ok(RelayExit::BusClosed)` |
//!
//! Messages are forwarded strictly in the order they arrive from the bus.
//! There is no backpressure: the client sink absorbs whatever the bus sends.

use std::fmt::Display;

use futures_util::{Sink, SinkExt};
use kinebridge_types::{BridgeError, LogEnvelope};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::bridge::{BridgeConnection, BusFrame};
use crate::transform;

/// Which relay flavour a session runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayKind {
    /// Sensor stream.  When `convert_units` is set each message goes through
    /// [`transform::apply`]; otherwise the raw bus text is forwarded.
    Bridge { convert_units: bool },
    /// Behaviour log stream; every message is wrapped in a [`LogEnvelope`].
    Log,
}

/// Where a session's bus connection points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub url: String,
    pub topic: String,
}

impl Upstream {
    pub fn new(url: impl Into<String>, topic: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            topic: topic.into(),
        }
    }
}

/// Why a relay stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    /// The bus closed (log relay only; the client was closed in turn).
    BusClosed,
    /// Sending to the client failed.
    ClientGone,
    /// The owner asked the relay to stop (client disconnect).
    Cancelled,
}

/// Lifecycle of a [`RelaySession`].
pub enum RelayState {
    /// No bus connection yet.
    Connecting,
    /// Subscribed and forwarding.
    Relaying(BridgeConnection),
    /// Finished; the bus connection has been released.
    Closed(RelayExit),
}

impl RelayState {
    pub fn name(&self) -> &'static str {
        match self {
            RelayState::Connecting => "connecting",
            RelayState::Relaying(_) => "relaying",
            RelayState::Closed(_) => "closed",
        }
    }
}

/// What woke the relaying state up.
enum Wake {
    Cancelled,
    Frame(Result<BusFrame, BridgeError>),
}

/// Per-connection relay state, owned by exactly one task.
pub struct RelaySession {
    id: Uuid,
    kind: RelayKind,
    upstream: Upstream,
    state: RelayState,
}

impl RelaySession {
    /// Create a session in the [`RelayState::Connecting`] state.
    pub fn new(kind: RelayKind, upstream: Upstream) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            upstream,
            state: RelayState::Connecting,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> RelayKind {
        self.kind
    }

    pub fn state(&self) -> &RelayState {
        &self.state
    }

    /// Open the bus connection and subscribe (`Connecting → Relaying`).
    ///
    /// Calling this in any other state is a no-op.  The bridge endpoint uses
    /// it to connect before accepting the client; the log endpoint lets
    /// [`run`](Self::run) do it after accepting.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Connect`] when the bus is unreachable.  The session
    /// stays in `Connecting`; no retry is attempted.
    pub async fn connect(&mut self) -> Result<(), BridgeError> {
        if matches!(self.state, RelayState::Connecting) {
            let bus = open_bus(&self.upstream, self.id).await?;
            self.state = RelayState::Relaying(bus);
        }
        Ok(())
    }

    /// Turn one bus text frame into the text sent to the client.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Decode`] when a decoding relay receives non-JSON.
    pub fn prepare(&self, text: &str) -> Result<String, BridgeError> {
        match self.kind {
            RelayKind::Bridge {
                convert_units: false,
            } => Ok(text.to_owned()),
            RelayKind::Bridge {
                convert_units: true,
            } => {
                let mut message = decode(text)?;
                transform::apply(&mut message);
                serde_json::to_string(&message).map_err(|e| BridgeError::Encode(e.to_string()))
            }
            RelayKind::Log => {
                let envelope = LogEnvelope::wrap(decode(text)?);
                serde_json::to_string(&envelope).map_err(|e| BridgeError::Encode(e.to_string()))
            }
        }
    }

    /// Drive the session until it reaches [`RelayState::Closed`].
    ///
    /// `cancel` firing (or its sender being dropped) stops the relay and
    /// closes the bus connection.  The bus connection is released on every
    /// exit path, including errors.
    ///
    /// # Errors
    ///
    /// * [`BridgeError::Connect`] – opening the bus failed.
    /// * [`BridgeError::Closed`] – the bus closed under a bridge relay.
    /// * [`BridgeError::Decode`] – a decoding relay received non-JSON; the
    ///   relay stops rather than skipping the frame.
    /// * [`BridgeError::Transport`] – the bus socket failed.
    pub async fn run<S>(
        mut self,
        client: &mut S,
        mut cancel: oneshot::Receiver<()>,
    ) -> Result<RelayExit, BridgeError>
    where
        S: Sink<String> + Unpin,
        S::Error: Display,
    {
        loop {
            let state = std::mem::replace(&mut self.state, RelayState::Closed(RelayExit::Cancelled));
            self.state = match state {
                RelayState::Connecting => {
                    tokio::select! {
                        _ = &mut cancel => RelayState::Closed(RelayExit::Cancelled),
                        opened = open_bus(&self.upstream, self.id) => RelayState::Relaying(opened?),
                    }
                }
                RelayState::Relaying(mut bus) => {
                    let wake = tokio::select! {
                        _ = &mut cancel => Wake::Cancelled,
                        frame = bus.next_frame() => Wake::Frame(frame),
                    };
                    match self.handle(wake, client).await {
                        Ok(None) => RelayState::Relaying(bus),
                        Ok(Some(exit)) => {
                            release(&mut bus, self.id).await;
                            self.finish(exit, client).await?
                        }
                        Err(e) => {
                            release(&mut bus, self.id).await;
                            warn!(session = %self.id, error = %e, "relay terminated");
                            return Err(e);
                        }
                    }
                }
                RelayState::Closed(exit) => {
                    info!(session = %self.id, exit = ?exit, "relay closed");
                    return Ok(exit);
                }
            };
        }
    }

    /// Act on one wake-up.  `Ok(None)` keeps relaying.
    async fn handle<S>(&self, wake: Wake, client: &mut S) -> Result<Option<RelayExit>, BridgeError>
    where
        S: Sink<String> + Unpin,
        S::Error: Display,
    {
        match wake {
            Wake::Cancelled => Ok(Some(RelayExit::Cancelled)),
            Wake::Frame(frame) => match frame? {
                BusFrame::Closed => Ok(Some(RelayExit::BusClosed)),
                BusFrame::Text(text) => {
                    let out = self.prepare(&text)?;
                    if let Err(e) = client.send(out).await {
                        debug!(session = %self.id, error = %e, "client send failed");
                        return Ok(Some(RelayExit::ClientGone));
                    }
                    Ok(None)
                }
            },
        }
    }

    /// Map a clean exit to the next state, applying the per-kind policy for
    /// a closed bus.
    async fn finish<S>(&self, exit: RelayExit, client: &mut S) -> Result<RelayState, BridgeError>
    where
        S: Sink<String> + Unpin,
        S::Error: Display,
    {
        match (self.kind, exit) {
            (RelayKind::Bridge { .. }, RelayExit::BusClosed) => Err(BridgeError::Closed),
            (RelayKind::Log, RelayExit::BusClosed) => {
                if let Err(e) = client.close().await {
                    debug!(session = %self.id, error = %e, "client already closed");
                }
                Ok(RelayState::Closed(exit))
            }
            _ => Ok(RelayState::Closed(exit)),
        }
    }
}

async fn open_bus(upstream: &Upstream, session: Uuid) -> Result<BridgeConnection, BridgeError> {
    let bus = BridgeConnection::open(&upstream.url, &upstream.topic).await?;
    info!(
        session = %session,
        url = %upstream.url,
        topic = %upstream.topic,
        "relay subscribed"
    );
    Ok(bus)
}

fn decode(text: &str) -> Result<Value, BridgeError> {
    serde_json::from_str(text).map_err(|e| BridgeError::Decode(e.to_string()))
}

async fn release(bus: &mut BridgeConnection, session: Uuid) {
    if let Err(e) = bus.close().await {
        debug!(session = %session, error = %e, "bus close failed");
    }
}
