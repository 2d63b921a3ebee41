//! `kinebridge-server` – HTTP + WebSocket front end.
//!
//! Serves the browser client:
//!
//! 1. **Relays** the rosbridge bus over two WebSocket endpoints:
//!    - `/ws/bridge/` – sensor stream, optionally unit-converted.
//!    - `/ws/flexbelogs/` – behaviour logs wrapped as `{"log": …}`.
//!
//!    Every connection gets its own [`RelaySession`] and bus connection.
//!
//! 2. **Manages** the project / subject / session / datafile tree under
//!    `/api/projects/…`.
//!
//! 3. **Reads** motion-capture files (`/get_filenames/`, `/get_file_data/…`).
//!
//! 4. **Forwards** one-shot commands to the bus (`/publish/`,
//!    `/set_name_and_path/`).
//!
//! # Usage
//!
//! ```rust,no_run
//! use kinebridge_server::{AppState, KineServer, RelayConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let state = AppState::new(RelayConfig::default(), "./data/Projects", "./data/tmp0")
//!         .expect("project store");
//!     KineServer::new(state)
//!         .run(async { let _ = tokio::signal::ctrl_c().await; })
//!         .await
//!         .expect("server failed");
//! }
//! ```
//!
//! [`RelaySession`]: kinebridge_middleware::RelaySession

pub mod api;
pub mod server;
pub mod state;
pub mod ws;

pub use server::{DEFAULT_PORT, KineServer, ServerError};
pub use state::{AppState, RelayConfig};
