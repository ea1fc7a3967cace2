use std::path::PathBuf;

use crate::pipeline::Stage;

pub type Result<T> = std::result::Result<T, BundleError>;

/// Errors produced while resolving assets or driving the packager.
/// Every variant is fatal to the build; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The library search path contained zero, or more than one,
    /// directory matching the marker.
    #[error(
        "expected exactly one dependency root containing '{marker}', found {}: {candidates:?}",
        .candidates.len()
    )]
    DependencyRootNotFound {
        marker: String,
        candidates: Vec<PathBuf>,
    },

    /// A required source path (or an unmatched glob pattern) was absent
    /// at manifest-build time.
    #[error("required asset missing: {}", .path.display())]
    MissingAsset { path: PathBuf },

    #[error("invalid glob pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        source: glob::PatternError,
    },

    /// A downstream packager stage signalled failure.
    #[error("packager stage '{stage}' failed: {message}")]
    ExternalTool { stage: Stage, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
