//! relforge-core - release pipeline decision and orchestration
//!
//! Provides the control logic of the release pipeline:
//! - Decides whether a costly image build must run (change detection joined
//!   with a release-registry lookup)
//! - Sequences build -> publish -> hardware-in-the-loop test with tri-state
//!   stage gating
//! - Defines the contracts for the external collaborators: release registry,
//!   build cache, build executor, and test harness

pub mod build;
pub mod cache;
pub mod changes;
pub mod error;
pub mod fakes;
pub mod pipeline;
pub mod registry;
pub mod stage;
pub mod trigger;

// Re-export key types
pub use build::{BuildArtifact, BuildExecutor, BuildRequest, CommandBuildExecutor};
pub use cache::{BuildCache, FsBuildCache};
pub use changes::{ChangeDetector, PathFilter};
pub use error::{PipelineError, RegistryError, Result};
pub use pipeline::{HardwareTests, Pipeline, PipelineConfig};
pub use registry::{release_exists, RegistryResult, ReleaseInfo, ReleaseRegistry};
pub use stage::{RunReport, StageStatus};
pub use trigger::TriggerInputs;
