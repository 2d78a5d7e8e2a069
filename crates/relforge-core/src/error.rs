//! Error taxonomy for the release pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the release registry boundary.
///
/// "Release not found" is not an error; the registry contract returns
/// `Ok(None)` for it. Everything here is a real failure that must propagate
/// to the caller instead of being folded into a verdict.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("registry authentication failed: {0}")]
    Auth(String),

    #[error("registry rate limit exceeded")]
    RateLimited,

    #[error("registry request failed: {0}")]
    Http(String),

    #[error("registry returned status {status}: {message}")]
    Api { status: u16, message: String },
}

/// Errors produced by the pipeline core.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// The commit range could not be diffed (shallow clone, unknown ref).
    /// Never downgraded to a "no changes" verdict: that would silently skip
    /// a needed rebuild.
    #[error("history unavailable: {0}")]
    HistoryUnavailable(String),

    #[error("invalid path filter: {0}")]
    InvalidPathFilter(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("build failed: {cause}")]
    BuildFailed { cause: String },

    #[error("build reported success but artifact is missing: {0}")]
    ArtifactMissing(PathBuf),

    #[error("build cache error: {0}")]
    Cache(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_error_is_not_a_verdict() {
        let err = PipelineError::from(RegistryError::RateLimited);
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn history_unavailable_display() {
        let err = PipelineError::HistoryUnavailable("shallow clone".to_string());
        assert!(err.to_string().contains("history unavailable"));
        assert!(err.to_string().contains("shallow clone"));
    }
}
