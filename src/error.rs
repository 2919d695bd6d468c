//! Error types shared by the capture engine.
//!
//! `ApiError` describes a single failed REST request. `ExportError` is what the
//! job-level code returns. Most failed requests never become an `ExportError`:
//! they are logged and the run carries on without that artifact.

use std::path::PathBuf;
use thiserror::Error;

/// A failed request against the Guilded REST API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The session cookie was rejected (HTTP 401/403).
    #[error("credentials rejected by {endpoint} (HTTP {status})")]
    Unauthorized { endpoint: String, status: u16 },

    /// Any other non-success status.
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },

    /// Connection, TLS or timeout failure below HTTP.
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    /// The body was not the JSON shape we expected.
    #[error("could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
}

impl ApiError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}

/// Errors surfaced by an export run.
#[derive(Error, Debug)]
pub enum ExportError {
    /// Credentials rejected by the account profile request at job entry.
    /// Nothing has been written when this is returned.
    #[error("authentication failed: {0}")]
    Auth(#[source] ApiError),

    /// A required request failed.
    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A checkpoint file on disk belongs to a different server.
    #[error("checkpoint {} belongs to server {found}, expected {expected}", path.display())]
    CheckpointMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },
}

impl ExportError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ExportError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        ExportError::Json {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = ExportError> = std::result::Result<T, E>;
