//! Crate error types
//!
//! Startup and configuration failures. Per-request failures never surface
//! here; the delivery pipeline converts them to HTTP status codes.

use std::path::PathBuf;

use crate::cache::TranscodeError;

/// Result alias for fallible crate operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for startup, configuration and serving
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Config file could not be read
    #[error("cannot read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid JSON or has wrongly typed keys
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// `serverAddress`/`serverPort` did not resolve to a socket address
    #[error("cannot resolve listen address {0}")]
    Address(String),

    /// Master directory is missing or unreadable
    #[error("cannot list master directory {path}: {source}")]
    MasterDir {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    /// Scan found nothing to serve
    #[error("no image group under {0} has enough images, refusing to start")]
    EmptyRegistry(PathBuf),

    /// Group has no members to pick from
    #[error("group {0} has no images")]
    EmptyGroup(String),

    /// `init` would overwrite an existing config file
    #[error("{0} already exists, not overwriting")]
    TemplateExists(PathBuf),

    /// Transcoding failed
    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    /// Any other I/O failure
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
