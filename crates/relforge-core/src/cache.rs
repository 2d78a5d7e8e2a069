//! Persistent build cache keyed by reference name.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

/// Persistent incremental-build state, keyed by reference name.
///
/// Modeled as an explicit interface rather than ambient mutable state so the
/// pipeline stays testable without a real cache backend. Runs for different
/// references never contend; serializing concurrent runs for the *same*
/// reference is the invoking system's responsibility.
#[async_trait]
pub trait BuildCache: Send + Sync {
    /// Materialize the cache directory for `reference`, creating it if
    /// absent, and return its path. The build may freely mutate the
    /// directory; whatever it leaves behind is the next run's starting state.
    async fn entry(&self, reference: &str) -> Result<PathBuf>;
}

/// Filesystem-backed cache: one subdirectory per reference under a root.
#[derive(Debug, Clone)]
pub struct FsBuildCache {
    root: PathBuf,
}

impl FsBuildCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Map a reference name to a single path component. Tags like
/// `release/v1.2.0` must not escape the cache root.
fn sanitize_reference(reference: &str) -> String {
    reference
        .chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}

#[async_trait]
impl BuildCache for FsBuildCache {
    async fn entry(&self, reference: &str) -> Result<PathBuf> {
        let dir = self.root.join(sanitize_reference(reference));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::Cache(format!("{}: {e}", dir.display())))?;
        Ok(dir)
    }
}
