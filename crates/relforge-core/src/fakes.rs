//! In-memory fakes for the pipeline's external collaborators (testing only).
//!
//! `MemoryReleaseRegistry`, `ScriptedBuildExecutor`, `MemoryBuildCache`, and
//! `ScriptedTests` satisfy the collaborator contracts without a network,
//! build system, or emulator.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::build::{BuildArtifact, BuildExecutor, BuildRequest};
use crate::cache::BuildCache;
use crate::error::{PipelineError, RegistryError, Result};
use crate::pipeline::HardwareTests;
use crate::registry::{RegistryResult, ReleaseInfo, ReleaseRegistry};
use crate::stage::StageStatus;

// ---------------------------------------------------------------------------
// MemoryReleaseRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ReleaseState {
    // asset name -> bytes; insertion overwrites, matching registry semantics
    assets: HashMap<String, Vec<u8>>,
}

/// In-memory release registry backed by a `HashMap<tag, ReleaseState>`.
///
/// `fail_with` arms a one-shot error returned by the next operation, for
/// exercising the error-propagation contract.
#[derive(Default)]
pub struct MemoryReleaseRegistry {
    releases: Mutex<HashMap<String, ReleaseState>>,
    fail_next: Mutex<Option<RegistryError>>,
    fail_upload: Mutex<Option<RegistryError>>,
}

impl MemoryReleaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an (asset-less) release for `tag`.
    pub fn seed_release(&self, tag: &str) {
        let mut releases = self.releases.lock().unwrap();
        releases.entry(tag.to_string()).or_default();
    }

    /// Make the next registry call return `error`.
    pub fn fail_with(&self, error: RegistryError) {
        *self.fail_next.lock().unwrap() = Some(error);
    }

    /// Make the next `upload_asset` call return `error`; lookups still work.
    pub fn fail_on_upload(&self, error: RegistryError) {
        *self.fail_upload.lock().unwrap() = Some(error);
    }

    /// Bytes stored for an asset, if present.
    pub fn asset_bytes(&self, tag: &str, asset_name: &str) -> Option<Vec<u8>> {
        let releases = self.releases.lock().unwrap();
        releases
            .get(tag)
            .and_then(|r| r.assets.get(asset_name).cloned())
    }

    fn take_failure(&self) -> Option<RegistryError> {
        self.fail_next.lock().unwrap().take()
    }
}

#[async_trait]
impl ReleaseRegistry for MemoryReleaseRegistry {
    async fn get_release(&self, tag: &str) -> RegistryResult<Option<ReleaseInfo>> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        let releases = self.releases.lock().unwrap();
        Ok(releases.get(tag).map(|state| ReleaseInfo {
            tag: tag.to_string(),
            assets: state.assets.keys().cloned().collect(),
            created_at: Utc::now(),
        }))
    }

    async fn upload_asset(
        &self,
        tag: &str,
        asset_name: &str,
        bytes: &[u8],
    ) -> RegistryResult<()> {
        if let Some(error) = self.take_failure() {
            return Err(error);
        }
        if let Some(error) = self.fail_upload.lock().unwrap().take() {
            return Err(error);
        }
        let mut releases = self.releases.lock().unwrap();
        let state = releases.entry(tag.to_string()).or_default();
        state.assets.insert(asset_name.to_string(), bytes.to_vec());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedBuildExecutor
// ---------------------------------------------------------------------------

/// Build executor with a scripted outcome.
///
/// On success it writes a small artifact file into the requested cache
/// directory and returns it; on failure it returns `BuildFailed`. Invocations
/// are counted so tests can assert the build stage was (not) entered.
pub struct ScriptedBuildExecutor {
    fail_with: Option<String>,
    invocations: AtomicUsize,
}

impl ScriptedBuildExecutor {
    pub fn succeeding() -> Self {
        Self {
            fail_with: None,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn failing(cause: &str) -> Self {
        Self {
            fail_with: Some(cause.to_string()),
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BuildExecutor for ScriptedBuildExecutor {
    async fn build(&self, request: &BuildRequest) -> Result<BuildArtifact> {
        self.invocations.fetch_add(1, Ordering::SeqCst);

        if let Some(cause) = &self.fail_with {
            return Err(PipelineError::BuildFailed {
                cause: cause.clone(),
            });
        }

        let path = request.cache_dir.join("image.tar.xz");
        let bytes = format!("image for {}", request.reference).into_bytes();
        tokio::fs::write(&path, &bytes).await?;

        Ok(BuildArtifact {
            path,
            digest: "0".repeat(64),
            size_bytes: bytes.len() as u64,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryBuildCache
// ---------------------------------------------------------------------------

/// Build cache rooted in a caller-owned scratch directory.
pub struct MemoryBuildCache {
    root: PathBuf,
}

impl MemoryBuildCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BuildCache for MemoryBuildCache {
    async fn entry(&self, reference: &str) -> Result<PathBuf> {
        let dir = self.root.join(reference.replace('/', "_"));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| PipelineError::Cache(e.to_string()))?;
        Ok(dir)
    }
}

// ---------------------------------------------------------------------------
// ScriptedTests
// ---------------------------------------------------------------------------

/// Test stage returning a scripted status, counting invocations.
pub struct ScriptedTests {
    status: StageStatus,
    invocations: AtomicUsize,
}

impl ScriptedTests {
    pub fn with_status(status: StageStatus) -> Self {
        Self {
            status,
            invocations: AtomicUsize::new(0),
        }
    }

    pub fn passing() -> Self {
        Self::with_status(StageStatus::Succeeded)
    }

    pub fn invocations(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HardwareTests for ScriptedTests {
    async fn run(&self) -> StageStatus {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.status.clone()
    }
}
