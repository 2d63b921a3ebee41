//! [`KineServer`] – the axum application and its listener.
//!
//! Listens on `0.0.0.0:8000` (configurable via [`KineServer::with_port`]).

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::state::AppState;
use crate::{api, ws};

/// Default TCP port for the HTTP/WebSocket server.
pub const DEFAULT_PORT: u16 = 8000;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("bind error on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the full route table.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(api::health))
        // ── Project hierarchy ─────────────────────────────────────────────
        .route(
            "/api/projects/",
            get(api::list_projects).post(api::create_project),
        )
        .route(
            "/api/projects/:project/subjects/",
            get(api::list_subjects).post(api::create_subject),
        )
        .route(
            "/api/projects/:project/subjects/:subject/sessions/",
            get(api::list_sessions).post(api::create_session),
        )
        .route(
            "/api/projects/:project/subjects/:subject/sessions/:session/datafiles/",
            get(api::list_datafiles).post(api::create_datafile),
        )
        // ── Motion files ──────────────────────────────────────────────────
        .route("/get_filenames/", get(api::get_filenames))
        .route("/get_file_data/", post(api::post_file_data))
        .route("/get_file_data/:filename/", get(api::get_file_data))
        // ── One-shot bus commands ─────────────────────────────────────────
        .route("/publish/", post(api::publish_topic))
        .route("/set_name_and_path/", post(api::set_name_and_path))
        // ── Relays ────────────────────────────────────────────────────────
        .route("/ws/bridge/", get(ws::bridge_ws))
        .route("/ws/flexbelogs/", get(ws::log_ws))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve `router(state)` on an already-bound listener until `shutdown`
/// resolves.
pub async fn serve<F>(listener: TcpListener, state: Arc<AppState>, shutdown: F) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// HTTP + WebSocket server for the browser client.
pub struct KineServer {
    state: Arc<AppState>,
    port: u16,
}

impl KineServer {
    /// Create a server on the [`DEFAULT_PORT`].
    pub fn new(state: Arc<AppState>) -> Self {
        Self {
            state,
            port: DEFAULT_PORT,
        }
    }

    /// Override the listening port (builder-style).
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bind `0.0.0.0:<port>` and serve until `shutdown` resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the TCP listener cannot bind.
    pub async fn run<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        info!(
            addr = %addr,
            rosbridge = %self.state.relay.rosbridge_url,
            "kinebridge listening"
        );
        serve(listener, self.state, shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RelayConfig;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn make_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().expect("tmp dir");
        let state = AppState::new(
            RelayConfig::default(),
            dir.path().join("Projects"),
            dir.path().join("tmp0"),
        )
        .expect("state");
        (dir, state)
    }

    #[test]
    fn default_port_is_8000() {
        let (_dir, state) = make_state();
        assert_eq!(KineServer::new(state).port(), DEFAULT_PORT);
    }

    #[test]
    fn with_port_overrides_default() {
        let (_dir, state) = make_state();
        assert_eq!(KineServer::new(state).with_port(9999).port(), 9999);
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (_dir, state) = make_state();
        let response = router(state)
            .oneshot(Request::builder().uri("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn serve_stops_on_shutdown_signal() {
        let (_dir, state) = make_state();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, state, async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
            .await
            .expect("server should stop")
            .unwrap();
        assert!(result.is_ok());
    }
}
