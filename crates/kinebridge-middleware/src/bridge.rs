//! Outbound connection to the rosbridge bus.
//!
//! A [`BridgeConnection`] wraps exactly one WebSocket to the configured bus
//! URL.  It is owned by a single relay task (or a single one-shot command)
//! and is never shared, pooled, or reconnected.

use std::io::ErrorKind;

use futures_util::{SinkExt, StreamExt};
use kinebridge_types::{BridgeError, BusOp};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

type BusStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One inbound unit from the bus as seen by a relay.
#[derive(Debug, Clone, PartialEq)]
pub enum BusFrame {
    /// A text payload, still undecoded.
    Text(String),
    /// The bus closed the connection (close frame, EOF, or a reset).
    Closed,
}

/// A single WebSocket connection to the bus.
pub struct BridgeConnection {
    url: String,
    stream: Option<BusStream>,
}

impl BridgeConnection {
    /// Open a connection without subscribing to anything.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Connect`] if the bus is unreachable or the
    /// handshake fails.  No retry is attempted.
    pub async fn connect(url: &str) -> Result<Self, BridgeError> {
        let (stream, _) = connect_async(url).await.map_err(|e| BridgeError::Connect {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        debug!(url = %url, "bus connection open");
        Ok(Self {
            url: url.to_string(),
            stream: Some(stream),
        })
    }

    /// Open a connection and immediately send one subscribe request for
    /// `topic`.  No acknowledgement is awaited.
    pub async fn open(url: &str, topic: &str) -> Result<Self, BridgeError> {
        let mut conn = Self::connect(url).await?;
        conn.send(&BusOp::subscribe(topic)).await?;
        debug!(url = %url, topic = %topic, "subscribed");
        Ok(conn)
    }

    /// `false` once the connection has been closed by either side.
    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Send one protocol operation as a text frame.
    pub async fn send(&mut self, op: &BusOp) -> Result<(), BridgeError> {
        let frame = op.to_frame()?;
        let stream = self.stream.as_mut().ok_or(BridgeError::Closed)?;
        match stream.send(Message::Text(frame.into())).await {
            Ok(()) => Ok(()),
            Err(e) if is_closed_signal(&e) => {
                self.stream = None;
                Err(BridgeError::Closed)
            }
            Err(e) => Err(BridgeError::Transport(e.to_string())),
        }
    }

    /// Wait for the next payload from the bus.
    ///
    /// Control frames are handled transparently.  Once the bus has closed,
    /// every further call returns [`BusFrame::Closed`].
    ///
    /// # Errors
    ///
    /// * [`BridgeError::Decode`] – a binary frame that is not UTF-8.
    /// * [`BridgeError::Transport`] – any other socket failure.
    pub async fn next_frame(&mut self) -> Result<BusFrame, BridgeError> {
        loop {
            let Some(stream) = self.stream.as_mut() else {
                return Ok(BusFrame::Closed);
            };
            match stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(BusFrame::Text(text.as_str().to_owned()));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec())
                        .map(BusFrame::Text)
                        .map_err(|e| BridgeError::Decode(e.to_string()));
                }
                Some(Ok(Message::Close(_))) => {
                    // Flush the queued close reply before dropping the socket.
                    let _ = self.close().await;
                    return Ok(BusFrame::Closed);
                }
                Some(Ok(_)) => continue,
                Some(Err(e)) if is_closed_signal(&e) => {
                    self.stream = None;
                    return Ok(BusFrame::Closed);
                }
                Some(Err(e)) => return Err(BridgeError::Transport(e.to_string())),
                None => {
                    self.stream = None;
                    return Ok(BusFrame::Closed);
                }
            }
        }
    }

    /// Close the connection.  Closing an already-closed connection is a
    /// no-op.
    pub async fn close(&mut self) -> Result<(), BridgeError> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        match stream.close(None).await {
            Ok(()) => {
                debug!(url = %self.url, "bus connection closed");
                Ok(())
            }
            Err(e) if is_closed_signal(&e) => Ok(()),
            Err(e) => Err(BridgeError::Transport(e.to_string())),
        }
    }
}

/// Errors meaning "the peer is gone" rather than "the transport broke".
/// An abrupt TCP reset counts as a close.
fn is_closed_signal(e: &WsError) -> bool {
    match e {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => true,
        WsError::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
                | ErrorKind::UnexpectedEof
        ),
        _ => false,
    }
}
