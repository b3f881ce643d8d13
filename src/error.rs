//! Error types for romsync.
//!
//! The first four variants are fatal and abort a run before any entry is
//! processed. `UnreadableFile` and `WriteFailure` are per-entry: the engine
//! folds them into an [`Outcome`](crate::types::Outcome) and carries on.

use std::io;
use std::path::PathBuf;

/// Result type for romsync operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Catalog unavailable at {path}: {source}")]
    CatalogUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Source root unavailable at {path}: {reason}")]
    SourceRootUnavailable { path: PathBuf, reason: String },

    #[error("Destination unavailable at {path}: {source}")]
    DestinationUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Could not write report to {path}: {source}")]
    ReportUnwritable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unreadable file {path}: {source}")]
    UnreadableFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Write failed at {path}: {source}")]
    WriteFailure {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl Error {
    pub fn unreadable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::UnreadableFile {
            path: path.into(),
            source,
        }
    }

    pub fn write_failure(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::WriteFailure {
            path: path.into(),
            source,
        }
    }
}
