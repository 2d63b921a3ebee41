use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A level of the project hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Project,
    Subject,
    Session,
    Datafile,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Project => write!(f, "Project"),
            Level::Subject => write!(f, "Subject"),
            Level::Session => write!(f, "Session"),
            Level::Datafile => write!(f, "Datafile"),
        }
    }
}

/// Errors from the project tree and motion file reader.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid name: {0:?}")]
    InvalidName(String),

    #[error("{0} not found")]
    NotFound(Level),

    #[error("{0} already exists")]
    AlreadyExists(Level),

    #[error("Directory {} does not exist", .0.display())]
    DirectoryMissing(PathBuf),

    #[error("File not found")]
    FileNotFound(String),

    #[error("Some columns are missing in the file")]
    MissingColumns(Vec<String>),
}
