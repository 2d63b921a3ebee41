//! WebSocket endpoints.
//!
//! Each accepted client gets its own [`RelaySession`] running on its own
//! task.  The handler task watches the client side: a close frame, end of
//! stream, or read error cancels the relay, which then releases its bus
//! connection.  Text the client sends is ignored.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt, future};
use kinebridge_middleware::{RelayKind, RelaySession};
use kinebridge_types::BridgeError;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::api::ApiError;
use crate::state::AppState;

/// How long a cancelled relay gets to close its bus connection.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// `/ws/bridge/` – connects to the bus before accepting the client.
pub async fn bridge_ws(
    State(state): State<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let mut session = RelaySession::new(state.relay.bridge_kind(), state.relay.bridge_upstream());
    if let Err(e) = session.connect().await {
        warn!(session = %session.id(), error = %e, "bridge connect failed; refusing upgrade");
        return Err(ApiError::BadGateway(e.to_string()));
    }
    Ok(ws.on_upgrade(move |socket| serve_relay(socket, session)))
}

/// `/ws/flexbelogs/` – accepts the client, then connects to the bus.
pub async fn log_ws(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> Response {
    let session = RelaySession::new(RelayKind::Log, state.relay.log_upstream());
    ws.on_upgrade(move |socket| serve_relay(socket, session))
}

async fn serve_relay(socket: WebSocket, session: RelaySession) {
    let id = session.id();
    info!(session = %id, kind = ?session.kind(), "client connected");

    let (sink, mut incoming) = socket.split();
    let mut client =
        sink.with(|text: String| future::ready(Ok::<_, axum::Error>(Message::Text(text))));
    let (cancel_tx, cancel_rx) = oneshot::channel();

    let mut relay = tokio::spawn(async move {
        let result = session.run(&mut client, cancel_rx).await;
        if let Err(e) = client.close().await {
            debug!(session = %id, error = %e, "client already closed");
        }
        result
    });

    let finished = loop {
        tokio::select! {
            joined = &mut relay => break Some(joined),
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
                Some(Ok(_)) => {}
            },
        }
    };

    let joined = match finished {
        Some(joined) => joined,
        None => {
            debug!(session = %id, "client disconnected; stopping relay");
            let _ = cancel_tx.send(());
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut relay).await {
                Ok(joined) => joined,
                Err(_) => {
                    warn!(session = %id, "relay did not stop in time; aborting");
                    relay.abort();
                    return;
                }
            }
        }
    };

    match joined {
        Ok(Ok(exit)) => info!(session = %id, exit = ?exit, "relay finished"),
        Ok(Err(BridgeError::Closed)) => info!(session = %id, "bus closed the stream"),
        Ok(Err(e)) => warn!(session = %id, error = %e, "relay failed"),
        Err(e) => error!(session = %id, error = %e, "relay task panicked"),
    }
}
