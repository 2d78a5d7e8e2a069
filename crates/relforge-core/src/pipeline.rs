//! Pipeline orchestration: decide, build, publish, test.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use futures::future::try_join;
use tracing::{info, warn};
use uuid::Uuid;

use crate::build::{BuildArtifact, BuildExecutor, BuildRequest};
use crate::cache::BuildCache;
use crate::changes::{ChangeDetector, PathFilter};
use crate::error::{PipelineError, Result};
use crate::registry::{release_exists, ReleaseRegistry};
use crate::stage::{RunReport, StageStatus};
use crate::trigger::TriggerInputs;

/// The hardware-in-the-loop test stage, implemented by `relforge-hil`.
///
/// Infrastructure failures inside the stage surface as `Failed(cause)`, so
/// the pipeline gates purely on stage status.
#[async_trait]
pub trait HardwareTests: Send + Sync {
    async fn run(&self) -> StageStatus;
}

/// Per-run configuration. Immutable for the duration of the run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Reference name: release lookup key, upload key, and cache key.
    pub reference: String,

    /// Base of the commit range to inspect.
    pub base_ref: String,

    /// Head of the commit range (the triggering commit).
    pub head_ref: String,

    /// Repository the commit range lives in.
    pub repo_dir: PathBuf,

    /// Build-relevant path patterns.
    pub path_filter: PathFilter,

    /// Fixed asset name the artifact is published under.
    pub asset_name: String,
}

/// Release pipeline: change detection and release lookup run concurrently,
/// feed the rebuild decision, and gate the build / publish / test sequence.
pub struct Pipeline {
    registry: Arc<dyn ReleaseRegistry>,
    executor: Arc<dyn BuildExecutor>,
    cache: Arc<dyn BuildCache>,
    tests: Arc<dyn HardwareTests>,
}

impl Pipeline {
    pub fn new(
        registry: Arc<dyn ReleaseRegistry>,
        executor: Arc<dyn BuildExecutor>,
        cache: Arc<dyn BuildCache>,
        tests: Arc<dyn HardwareTests>,
    ) -> Self {
        Self {
            registry,
            executor,
            cache,
            tests,
        }
    }

    /// Execute one pipeline run.
    ///
    /// Stage gating:
    /// - build runs iff the trigger decision requires it;
    /// - publish runs iff the build succeeded;
    /// - test runs whenever the build stage did not fail, including when the
    ///   build was skipped. A publish failure never blocks the test stage.
    ///
    /// A failed change detection or release lookup aborts the run with an
    /// error; those verdicts must never be guessed.
    pub async fn run(&self, config: &PipelineConfig) -> Result<RunReport> {
        let start = Instant::now();
        let run_id = Uuid::new_v4().to_string();

        info!(run_id = %run_id, reference = %config.reference, "starting pipeline run");

        // Both verdicts must resolve before the decision: a join, not a race.
        let (sources_changed, exists) = try_join(
            ChangeDetector::detect(
                &config.repo_dir,
                &config.base_ref,
                &config.head_ref,
                &config.path_filter,
            ),
            async {
                release_exists(self.registry.as_ref(), &config.reference)
                    .await
                    .map_err(PipelineError::from)
            },
        )
        .await?;

        let trigger = TriggerInputs {
            sources_changed,
            release_exists: exists,
        };
        let build_required = trigger.build_required();

        info!(
            sources_changed,
            release_exists = exists,
            build_required,
            "rebuild decision"
        );

        let (build, artifact) = if build_required {
            match self.execute_build(&config.reference).await {
                Ok(artifact) => (StageStatus::Succeeded, Some(artifact)),
                Err(e) => {
                    warn!(error = %e, "build stage failed");
                    (StageStatus::Failed(e.to_string()), None)
                }
            }
        } else {
            info!("build not required, skipping build and publish");
            (StageStatus::Skipped, None)
        };

        let publish = match (&build, artifact) {
            (StageStatus::Succeeded, Some(artifact)) => {
                match self.publish_artifact(config, &artifact).await {
                    Ok(()) => StageStatus::Succeeded,
                    Err(e) => {
                        // Terminal for the run, but testing still proceeds and
                        // the build-cache update stays valid.
                        warn!(error = %e, "publish stage failed");
                        StageStatus::Failed(e.to_string())
                    }
                }
            }
            _ => StageStatus::Skipped,
        };

        let test = if build.is_failed() {
            info!("build failed, skipping hardware tests");
            StageStatus::Skipped
        } else {
            info!("running hardware-in-the-loop tests");
            self.tests.run().await
        };

        let report = RunReport {
            run_id,
            reference: config.reference.clone(),
            trigger,
            build_required,
            build,
            publish,
            test,
            duration_ms: start.elapsed().as_millis() as u64,
        };

        info!(overall = %report.overall(), "pipeline run finished");
        Ok(report)
    }

    async fn execute_build(&self, reference: &str) -> Result<BuildArtifact> {
        let cache_dir = self.cache.entry(reference).await?;
        let request = BuildRequest {
            reference: reference.to_string(),
            cache_dir,
        };
        self.executor.build(&request).await
    }

    async fn publish_artifact(
        &self,
        config: &PipelineConfig,
        artifact: &BuildArtifact,
    ) -> Result<()> {
        let bytes = tokio::fs::read(&artifact.path)
            .await
            .map_err(|_| PipelineError::ArtifactMissing(artifact.path.clone()))?;

        self.registry
            .upload_asset(&config.reference, &config.asset_name, &bytes)
            .await?;

        info!(
            reference = %config.reference,
            asset = %config.asset_name,
            digest = %artifact.digest,
            "artifact published"
        );
        Ok(())
    }
}
