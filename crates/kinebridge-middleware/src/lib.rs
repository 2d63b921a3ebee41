//! `kinebridge-middleware` – the rosbridge relay core.
//!
//! Moves JSON between the browser-facing sockets and the rosbridge bus
//! without caring what the messages mean, apart from a couple of unit
//! conversions.
//!
//! # Modules
//!
//! - [`bridge`] – [`BridgeConnection`], one outbound WebSocket to the bus.
//! - [`transform`] – pure radians→degrees and timestamp formatting helpers.
//! - [`relay`] – [`RelaySession`], the per-client "subscribe once, forward
//!   forever" state machine, in bridge and log flavours.
//! - [`command`] – [`CommandPublisher`], one-shot publish / service calls.

pub mod bridge;
pub mod command;
pub mod relay;
pub mod transform;

pub use bridge::{BridgeConnection, BusFrame};
pub use command::CommandPublisher;
pub use relay::{RelayExit, RelayKind, RelaySession, RelayState, Upstream};
