//! Error types for the load test harness.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for load test operations.
pub type Result<T> = std::result::Result<T, LoadTestError>;

/// Errors raised by workload clients and by run setup.
///
/// Per-request variants end up as the error message of an [`Outcome`]
/// and never abort a run. `NoFixturesFound`, `Walk` and
/// `LivenessCheckFailed` only happen before any workload starts.
///
/// [`Outcome`]: crate::pool::Outcome
#[derive(Error, Debug)]
pub enum LoadTestError {
    // === Per-request errors ===
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status code: {code}")]
    UnexpectedStatus { code: u16 },

    #[error("download returned empty body")]
    EmptyBody,

    #[error("no download urls found")]
    NoDownloadTargets,

    #[error("page content does not match: {marker}")]
    ContentMismatch { marker: String },

    #[error("invalid JSON: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to read fixture: {0}")]
    Fixture(#[from] std::io::Error),

    // === Setup errors ===
    #[error("no image files found under {}", path.display())]
    NoFixturesFound { path: PathBuf },

    #[error("failed to scan fixtures: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("failed to check host {host}: {source}")]
    LivenessCheckFailed {
        host: String,
        #[source]
        source: Box<LoadTestError>,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl LoadTestError {
    /// Whether this error only occurs before a run starts.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NoFixturesFound { .. }
                | Self::Walk(_)
                | Self::LivenessCheckFailed { .. }
                | Self::InvalidConfig(_)
        )
    }
}
