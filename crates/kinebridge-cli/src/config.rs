//! Configuration – reads `~/.kinebridge/config.toml`.

use kinebridge_server::RelayConfig;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Persisted configuration.  Every field falls back to its default when
/// absent from the file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Config {
    /// rosbridge server the relays and commands connect to.
    #[serde(default = "default_rosbridge_url")]
    pub rosbridge_url: String,

    /// Topic streamed on `/ws/bridge/`.
    #[serde(default = "default_bridge_topic")]
    pub bridge_topic: String,

    /// Topic streamed on `/ws/flexbelogs/`.
    #[serde(default = "default_log_topic")]
    pub log_topic: String,

    /// HTTP / WebSocket listening port.
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_projects_dir")]
    pub projects_dir: PathBuf,

    /// Flat directory of motion-capture exports.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Convert joint angles and timestamps on `/ws/bridge/`.
    #[serde(default = "default_convert_units")]
    pub convert_units: bool,
}

fn default_rosbridge_url() -> String {
    "ws://localhost:9090".to_string()
}
fn default_bridge_topic() -> String {
    "/sensor_data".to_string()
}
fn default_log_topic() -> String {
    "/flexbe/log".to_string()
}
fn default_port() -> u16 {
    kinebridge_server::DEFAULT_PORT
}
fn default_projects_dir() -> PathBuf {
    PathBuf::from("./data/Projects")
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("./data/tmp0")
}
fn default_convert_units() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rosbridge_url: default_rosbridge_url(),
            bridge_topic: default_bridge_topic(),
            log_topic: default_log_topic(),
            port: default_port(),
            projects_dir: default_projects_dir(),
            data_dir: default_data_dir(),
            convert_units: default_convert_units(),
        }
    }
}

impl Config {
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            rosbridge_url: self.rosbridge_url.clone(),
            bridge_topic: self.bridge_topic.clone(),
            log_topic: self.log_topic.clone(),
            convert_units: self.convert_units,
        }
    }
}

/// Return the path to `~/.kinebridge/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".kinebridge").join("config.toml")
}

/// Load the config from disk and apply environment overrides.  A missing
/// file yields the defaults.
pub fn load() -> Result<Config, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Config, String> {
    let mut cfg = if path.exists() {
        let raw = fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?
    } else {
        Config::default()
    };
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `KINEBRIDGE_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `KINEBRIDGE_ROSBRIDGE_URL` | `rosbridge_url` |
/// | `KINEBRIDGE_BRIDGE_TOPIC` | `bridge_topic` |
/// | `KINEBRIDGE_LOG_TOPIC` | `log_topic` |
/// | `KINEBRIDGE_PORT` | `port` |
/// | `KINEBRIDGE_PROJECTS_DIR` | `projects_dir` |
/// | `KINEBRIDGE_DATA_DIR` | `data_dir` |
/// | `KINEBRIDGE_CONVERT_UNITS` | `convert_units` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

pub(crate) fn apply_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("KINEBRIDGE_ROSBRIDGE_URL") {
        cfg.rosbridge_url = v;
    }
    if let Some(v) = var("KINEBRIDGE_BRIDGE_TOPIC") {
        cfg.bridge_topic = v;
    }
    if let Some(v) = var("KINEBRIDGE_LOG_TOPIC") {
        cfg.log_topic = v;
    }
    if let Some(v) = var("KINEBRIDGE_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.port = port;
    }
    if let Some(v) = var("KINEBRIDGE_PROJECTS_DIR") {
        cfg.projects_dir = PathBuf::from(v);
    }
    if let Some(v) = var("KINEBRIDGE_DATA_DIR") {
        cfg.data_dir = PathBuf::from(v);
    }
    if let Some(v) = var("KINEBRIDGE_CONVERT_UNITS")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.convert_units = flag;
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
