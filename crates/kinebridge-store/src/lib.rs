//! `kinebridge-store` – filesystem-backed data for the web client.
//!
//! # Modules
//!
//! - [`projects`] – [`ProjectStore`][projects::ProjectStore]: the nested
//!   `project / subject / session / datafile` directory tree.
//! - [`motion`] – [`MotionFileReader`][motion::MotionFileReader]: lists
//!   motion-capture exports and pulls named columns out of them.
//! - [`error`] – [`StoreError`], shared by both.

pub mod error;
pub mod motion;
pub mod projects;

pub use error::{Level, StoreError};
pub use motion::{MotionColumns, MotionFileReader};
pub use projects::{ProjectStore, SubjectInfo};
