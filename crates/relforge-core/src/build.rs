//! Build executor contract and the subprocess-backed implementation.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tracing::info;

use crate::error::{PipelineError, Result};

/// Inputs handed to the external build system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Reference name for this run; also the build-cache key.
    pub reference: String,

    /// Persistent cache directory for incremental state.
    pub cache_dir: PathBuf,
}

/// The archive produced by a successful build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildArtifact {
    /// Where the archive was written.
    pub path: PathBuf,

    /// SHA-256 of the archive contents.
    pub digest: String,

    /// Archive size in bytes.
    pub size_bytes: u64,
}

/// External build system invoked as an opaque step.
///
/// Invoked only when the trigger decision requires a build. Any nonzero exit
/// is a `BuildFailed` error; the pipeline never proceeds to publishing after
/// a failed build.
#[async_trait]
pub trait BuildExecutor: Send + Sync {
    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact>;
}

/// Runs the build as a subprocess and collects the artifact from a fixed,
/// documented path.
///
/// The command sees `RELFORGE_REF` and `RELFORGE_CACHE` in its environment.
#[derive(Debug, Clone)]
pub struct CommandBuildExecutor {
    /// Command to execute; first element is the executable.
    pub command: Vec<String>,

    /// Fixed path the build writes its artifact to.
    pub artifact_path: PathBuf,

    /// Timeout in seconds; 0 disables the timeout.
    pub timeout_secs: u64,
}

impl CommandBuildExecutor {
    pub fn new(command: Vec<String>, artifact_path: PathBuf, timeout_secs: u64) -> Self {
        Self {
            command,
            artifact_path,
            timeout_secs,
        }
    }
}

#[async_trait]
impl BuildExecutor for CommandBuildExecutor {
    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact> {
        if self.command.is_empty() {
            return Err(PipelineError::BuildFailed {
                cause: "empty build command".to_string(),
            });
        }

        let exe = &self.command[0];
        let args = &self.command[1..];

        info!(reference = %request.reference, command = %exe, "starting image build");

        let child = Command::new(exe)
            .args(args)
            .env("RELFORGE_REF", &request.reference)
            .env("RELFORGE_CACHE", &request.cache_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PipelineError::BuildFailed {
                cause: format!("failed to spawn {exe}: {e}"),
            })?;

        let output = if self.timeout_secs > 0 {
            tokio::time::timeout(
                std::time::Duration::from_secs(self.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| PipelineError::BuildFailed {
                cause: format!("build timed out after {} seconds", self.timeout_secs),
            })??
        } else {
            child.wait_with_output().await?
        };

        if !output.status.success() {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::BuildFailed {
                cause: format!("build exited with code {code}: {}", stderr.trim()),
            });
        }

        let bytes = tokio::fs::read(&self.artifact_path)
            .await
            .map_err(|_| PipelineError::ArtifactMissing(self.artifact_path.clone()))?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let digest = hex::encode(hasher.finalize());

        info!(
            reference = %request.reference,
            artifact = %self.artifact_path.display(),
            size = bytes.len(),
            "build produced artifact"
        );

        Ok(BuildArtifact {
            path: self.artifact_path.clone(),
            digest,
            size_bytes: bytes.len() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_build_digests_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("image.tar.xz");

        let executor = CommandBuildExecutor::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("printf rootfs > {}", artifact.display()),
            ],
            artifact.clone(),
            60,
        );

        let request = BuildRequest {
            reference: "v1.0.0".to_string(),
            cache_dir: dir.path().to_path_buf(),
        };

        let result = executor.build(&request).await.unwrap();
        assert_eq!(result.path, artifact);
        assert_eq!(result.size_bytes, 6);
        assert_eq!(result.digest.len(), 64);
    }

    #[tokio::test]
    async fn nonzero_exit_is_build_failed() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CommandBuildExecutor::new(
            vec!["false".to_string()],
            dir.path().join("image.tar.xz"),
            60,
        );

        let request = BuildRequest {
            reference: "v1.0.0".to_string(),
            cache_dir: dir.path().to_path_buf(),
        };

        let result = executor.build(&request).await;
        assert!(matches!(result, Err(PipelineError::BuildFailed { .. })));
    }

    #[tokio::test]
    async fn missing_artifact_after_success_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let executor = CommandBuildExecutor::new(
            vec!["true".to_string()],
            dir.path().join("never-written.tar.xz"),
            60,
        );

        let request = BuildRequest {
            reference: "v1.0.0".to_string(),
            cache_dir: dir.path().to_path_buf(),
        };

        let result = executor.build(&request).await;
        assert!(matches!(result, Err(PipelineError::ArtifactMissing(_))));
    }

    #[tokio::test]
    async fn build_sees_cache_and_reference_env() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("env.txt");

        let executor = CommandBuildExecutor::new(
            vec![
                "sh".to_string(),
                "-c".to_string(),
                format!("printf \"$RELFORGE_REF:$RELFORGE_CACHE\" > {}", artifact.display()),
            ],
            artifact.clone(),
            60,
        );

        let request = BuildRequest {
            reference: "v2.0.0".to_string(),
            cache_dir: dir.path().to_path_buf(),
        };

        executor.build(&request).await.unwrap();
        let written = std::fs::read_to_string(&artifact).unwrap();
        assert!(written.starts_with("v2.0.0:"));
    }
}
