//! Typed failures surfaced by the launch and download pipelines.
//!
//! Launch failures and download failures are reported as values (inside
//! [`LaunchResult`](crate::game::launcher::LaunchResult) and
//! [`TaskOutcome`](crate::game::installer::core::batch::TaskOutcome)) rather
//! than propagated, so every variant carries enough context to be shown to a
//! user without a backtrace.

use std::path::PathBuf;
use thiserror::Error;

/// Why a launch attempt did not produce a running process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("Invalid launch request: {0}")]
    InvalidRequest(String),

    #[error("No Java runtime is configured")]
    RuntimeMissing,

    #[error("Native library {native} not found at {path:?}")]
    NativeNotFound { native: String, path: PathBuf },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Arguments(#[from] ArgumentError),

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Internal launcher error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for LaunchError {
    fn from(err: anyhow::Error) -> Self {
        LaunchError::Internal(format!("{:#}", err))
    }
}

/// Failures while reading version manifests.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Version manifest not found: {0:?}")]
    NotFound(PathBuf),

    #[error("Failed to parse version manifest {id}: {source}")]
    Parse {
        id: String,
        source: serde_json::Error,
    },

    #[error("Version manifest {id} is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },

    #[error("Version inheritance cycle detected: {}", chain.join(" -> "))]
    InheritanceCycle { chain: Vec<String> },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Failures while turning a launch setting into a command line.
#[derive(Debug, Error)]
pub enum ArgumentError {
    #[error("Unresolved placeholder ${{{placeholder}}} in argument `{argument}`")]
    UnresolvedPlaceholder {
        placeholder: String,
        argument: String,
    },

    #[error("Invalid Maven coordinates: {0}")]
    InvalidCoordinates(String),

    #[error("Could not split advanced arguments: {0}")]
    MalformedArguments(String),
}

/// Per-task download failure.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("All {attempts} download sources failed for {name}")]
    Exhausted { name: String, attempts: usize },

    #[error("Download cancelled")]
    Cancelled,

    #[error("SHA1 mismatch for {url}: expected {expected}, got {actual}")]
    HashMismatch {
        url: String,
        expected: String,
        actual: String,
    },

    #[error("Size mismatch for {url}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP error {status}: {url}")]
    Status { url: String, status: u16 },

    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used by the metadata reader.
pub type MetadataResult<T> = Result<T, MetadataError>;
