//! Stage statuses and the per-run report.

use serde::{Deserialize, Serialize};

use crate::trigger::TriggerInputs;

/// Outcome of one pipeline stage.
///
/// Explicitly tri-state: "nothing to do" (Skipped) is not the same as
/// "something went wrong" (Failed). Downstream gating reads only whether the
/// upstream stage failed, so a skipped build still allows the test stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "cause", rename_all = "snake_case")]
pub enum StageStatus {
    Skipped,
    Succeeded,
    Failed(String),
}

impl StageStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, StageStatus::Failed(_))
    }

    pub fn is_succeeded(&self) -> bool {
        matches!(self, StageStatus::Succeeded)
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageStatus::Skipped => write!(f, "skipped"),
            StageStatus::Succeeded => write!(f, "succeeded"),
            StageStatus::Failed(cause) => write!(f, "failed: {cause}"),
        }
    }
}

/// Result of a complete pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique identifier for this run.
    pub run_id: String,

    /// Reference name the run was keyed by.
    pub reference: String,

    /// The verdicts that fed the rebuild decision.
    pub trigger: TriggerInputs,

    /// Whether the decision required a build.
    pub build_required: bool,

    /// Build stage outcome.
    pub build: StageStatus,

    /// Publish stage outcome.
    pub publish: StageStatus,

    /// Hardware-in-the-loop test stage outcome.
    pub test: StageStatus,

    /// Total duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Final run status: the worst of build, publish, and test. The first
    /// failing stage's cause is reported.
    pub fn overall(&self) -> StageStatus {
        for stage in [&self.build, &self.publish, &self.test] {
            if let StageStatus::Failed(cause) = stage {
                return StageStatus::Failed(cause.clone());
            }
        }
        StageStatus::Succeeded
    }
}
