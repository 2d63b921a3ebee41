//! Shared, read-only server state.

use std::path::PathBuf;
use std::sync::Arc;

use kinebridge_middleware::{CommandPublisher, RelayKind, Upstream};
use kinebridge_store::{MotionFileReader, ProjectStore, StoreError};

/// Where and how the relays reach the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayConfig {
    /// `ws://host:port` of the rosbridge server.
    pub rosbridge_url: String,
    /// Topic streamed on `/ws/bridge/`.
    pub bridge_topic: String,
    /// Topic streamed on `/ws/flexbelogs/`.
    pub log_topic: String,
    /// Apply the radians→degrees / timestamp conversions on `/ws/bridge/`.
    pub convert_units: bool,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rosbridge_url: "ws://localhost:9090".to_string(),
            bridge_topic: "/sensor_data".to_string(),
            log_topic: "/flexbe/log".to_string(),
            convert_units: true,
        }
    }
}

impl RelayConfig {
    pub fn bridge_kind(&self) -> RelayKind {
        RelayKind::Bridge {
            convert_units: self.convert_units,
        }
    }

    pub fn bridge_upstream(&self) -> Upstream {
        Upstream::new(&self.rosbridge_url, &self.bridge_topic)
    }

    pub fn log_upstream(&self) -> Upstream {
        Upstream::new(&self.rosbridge_url, &self.log_topic)
    }
}

/// Everything a handler needs.  Cloned per request via [`Arc`].
#[derive(Debug)]
pub struct AppState {
    pub relay: RelayConfig,
    pub projects: ProjectStore,
    pub motion: MotionFileReader,
    pub commands: CommandPublisher,
}

impl AppState {
    /// Build the state, creating `projects_dir` if it does not exist.
    pub fn new(
        relay: RelayConfig,
        projects_dir: impl Into<PathBuf>,
        data_dir: impl Into<PathBuf>,
    ) -> Result<Arc<Self>, StoreError> {
        let commands = CommandPublisher::new(&relay.rosbridge_url);
        Ok(Arc::new(Self {
            relay,
            projects: ProjectStore::open(projects_dir)?,
            motion: MotionFileReader::new(data_dir),
            commands,
        }))
    }
}
