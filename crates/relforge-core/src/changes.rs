//! Change detection over a git commit range.

use std::path::Path;
use std::process::Stdio;

use glob::Pattern;
use tokio::process::Command;
use tracing::debug;

use crate::error::{PipelineError, Result};

/// A non-empty, immutable set of glob patterns identifying build-relevant
/// source paths.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<Pattern>,
}

impl PathFilter {
    /// Compile a set of glob patterns. Fails on an empty set or an invalid
    /// pattern; a filter that matches nothing would silently disable the
    /// rebuild trigger.
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|e| {
                    PipelineError::InvalidPathFilter(format!("{}: {}", p.as_ref(), e))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        if patterns.is_empty() {
            return Err(PipelineError::InvalidPathFilter(
                "path filter set must not be empty".to_string(),
            ));
        }

        Ok(Self { patterns })
    }

    /// Whether any pattern matches the given repository-relative path.
    pub fn matches(&self, path: &str) -> bool {
        self.patterns.iter().any(|p| p.matches(path))
    }
}

/// Computes whether any build-relevant path changed between two refs.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Diff `base_ref..head_ref` in `repo_dir` and report whether any touched
    /// path matches the filter.
    ///
    /// Runs `git diff --name-only --no-renames` so a rename surfaces as an
    /// add plus a delete and both sides are matched. A failed diff (shallow
    /// history, unknown ref) is `HistoryUnavailable`, never a silent `false`.
    pub async fn detect(
        repo_dir: &Path,
        base_ref: &str,
        head_ref: &str,
        filter: &PathFilter,
    ) -> Result<bool> {
        let output = Command::new("git")
            .args(["diff", "--name-only", "--no-renames", base_ref, head_ref])
            .current_dir(repo_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| PipelineError::HistoryUnavailable(format!("failed to run git: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::HistoryUnavailable(format!(
                "git diff {base_ref} {head_ref} failed: {}",
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        for path in stdout.lines().map(str::trim).filter(|l| !l.is_empty()) {
            if filter.matches(path) {
                debug!(path, "build-relevant path changed");
                return Ok(true);
            }
        }

        Ok(false)
    }
}
