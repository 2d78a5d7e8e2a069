//! End-to-end pipeline gating scenarios against in-memory fakes.
//!
//! The commit range comes from a real scratch git repository; the registry,
//! build executor, cache, and test stage are fakes.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use relforge_core::fakes::{
    MemoryBuildCache, MemoryReleaseRegistry, ScriptedBuildExecutor, ScriptedTests,
};
use relforge_core::{PathFilter, Pipeline, PipelineConfig, ReleaseRegistry, StageStatus};

fn run_git(repo_dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(repo_dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

/// A repo with two commits; the second touches `changed_path`.
fn make_repo_with_change(changed_path: &str) -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    run_git(dir.path(), &["init"]);
    run_git(dir.path(), &["config", "user.name", "test-user"]);
    run_git(dir.path(), &["config", "user.email", "test@example.com"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "initial"]);

    let full = dir.path().join(changed_path);
    std::fs::create_dir_all(full.parent().unwrap()).unwrap();
    std::fs::write(&full, "contents").unwrap();
    run_git(dir.path(), &["add", "."]);
    run_git(dir.path(), &["commit", "-m", "change"]);
    dir
}

fn config(repo_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        reference: "v1.0.0".to_string(),
        base_ref: "HEAD~1".to_string(),
        head_ref: "HEAD".to_string(),
        repo_dir: repo_dir.to_path_buf(),
        path_filter: PathFilter::new(["image/**", "kernel/**"]).unwrap(),
        asset_name: "image.tar.xz".to_string(),
    }
}

struct Harness {
    registry: Arc<MemoryReleaseRegistry>,
    executor: Arc<ScriptedBuildExecutor>,
    tests: Arc<ScriptedTests>,
    pipeline: Pipeline,
    _cache_root: tempfile::TempDir,
}

fn harness(executor: ScriptedBuildExecutor, tests: ScriptedTests) -> Harness {
    let cache_root = tempfile::tempdir().unwrap();
    let registry = Arc::new(MemoryReleaseRegistry::new());
    let executor = Arc::new(executor);
    let tests = Arc::new(tests);
    let pipeline = Pipeline::new(
        registry.clone(),
        executor.clone(),
        Arc::new(MemoryBuildCache::new(cache_root.path())),
        tests.clone(),
    );
    Harness {
        registry,
        executor,
        tests,
        pipeline,
        _cache_root: cache_root,
    }
}

/// Scenario 1: no filter match, release exists -> build and publish skipped,
/// tests still run.
#[tokio::test]
async fn existing_release_and_no_changes_skips_build_but_tests() {
    let repo = make_repo_with_change("docs/notes.md");
    let h = harness(ScriptedBuildExecutor::succeeding(), ScriptedTests::passing());
    h.registry.seed_release("v1.0.0");

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert!(!report.build_required);
    assert_eq!(report.build, StageStatus::Skipped);
    assert_eq!(report.publish, StageStatus::Skipped);
    assert_eq!(report.test, StageStatus::Succeeded);
    assert_eq!(h.executor.invocations(), 0, "build must not be invoked");
    assert_eq!(h.tests.invocations(), 1, "tests run even on build skip");
    assert_eq!(report.overall(), StageStatus::Succeeded);
}

/// Scenario 2: filter match with an existing release -> rebuild, publish
/// overwrites the prior asset, tests run.
#[tokio::test]
async fn changed_sources_rebuild_and_overwrite_existing_asset() {
    let repo = make_repo_with_change("image/rootfs/init");
    let h = harness(ScriptedBuildExecutor::succeeding(), ScriptedTests::passing());
    h.registry.seed_release("v1.0.0");
    h.registry
        .upload_asset("v1.0.0", "image.tar.xz", b"stale")
        .await
        .unwrap();

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert!(report.build_required);
    assert_eq!(report.build, StageStatus::Succeeded);
    assert_eq!(report.publish, StageStatus::Succeeded);
    assert_eq!(report.test, StageStatus::Succeeded);

    let release = h.registry.get_release("v1.0.0").await.unwrap().unwrap();
    let count = release
        .assets
        .iter()
        .filter(|a| a.as_str() == "image.tar.xz")
        .count();
    assert_eq!(count, 1, "re-publish must overwrite, not duplicate");
    assert_ne!(
        h.registry.asset_bytes("v1.0.0", "image.tar.xz").unwrap(),
        b"stale".to_vec()
    );
}

/// Scenario 3: no filter match but no release either -> forced first build.
#[tokio::test]
async fn missing_release_forces_first_build() {
    let repo = make_repo_with_change("docs/notes.md");
    let h = harness(ScriptedBuildExecutor::succeeding(), ScriptedTests::passing());

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert!(report.build_required, "missing release must force a build");
    assert_eq!(report.build, StageStatus::Succeeded);
    assert_eq!(report.publish, StageStatus::Succeeded);
    assert!(h
        .registry
        .asset_bytes("v1.0.0", "image.tar.xz")
        .is_some());
}

/// Scenario 4: build failure -> publish skipped, tests skipped, run failed.
#[tokio::test]
async fn build_failure_skips_publish_and_tests() {
    let repo = make_repo_with_change("image/rootfs/init");
    let h = harness(
        ScriptedBuildExecutor::failing("compiler exited with code 2"),
        ScriptedTests::passing(),
    );

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert!(report.build.is_failed());
    assert_eq!(report.publish, StageStatus::Skipped);
    assert_eq!(report.test, StageStatus::Skipped);
    assert_eq!(h.tests.invocations(), 0, "tests must not run after a failed build");
    assert!(report.overall().is_failed());
}

/// Scenario 5: everything succeeds except a test command -> run failed with
/// the failing command identified.
#[tokio::test]
async fn test_failure_is_reported_with_cause() {
    let repo = make_repo_with_change("image/rootfs/init");
    let h = harness(
        ScriptedBuildExecutor::succeeding(),
        ScriptedTests::with_status(StageStatus::Failed(
            "command `i2cdetect -y 0` exited with code 1".to_string(),
        )),
    );

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert_eq!(report.build, StageStatus::Succeeded);
    assert_eq!(report.publish, StageStatus::Succeeded);
    assert!(report.test.is_failed());
    match report.overall() {
        StageStatus::Failed(cause) => assert!(cause.contains("i2cdetect")),
        other => panic!("expected failure, got {other}"),
    }
}

/// Publish failure marks the run failed but never blocks the test stage.
#[tokio::test]
async fn publish_failure_does_not_block_tests() {
    let repo = make_repo_with_change("image/rootfs/init");
    let h = harness(ScriptedBuildExecutor::succeeding(), ScriptedTests::passing());
    h.registry
        .fail_on_upload(relforge_core::RegistryError::Http(
            "connection reset".to_string(),
        ));

    let report = h.pipeline.run(&config(repo.path())).await.unwrap();

    assert_eq!(report.build, StageStatus::Succeeded);
    assert!(report.publish.is_failed());
    assert_eq!(report.test, StageStatus::Succeeded, "tests still run");
    assert_eq!(h.tests.invocations(), 1);
    assert!(report.overall().is_failed());
}

/// A registry error during the lookup aborts the run; it is never coerced
/// into a presence verdict.
#[tokio::test]
async fn registry_error_aborts_instead_of_guessing() {
    let repo = make_repo_with_change("docs/notes.md");
    let h = harness(ScriptedBuildExecutor::succeeding(), ScriptedTests::passing());
    h.registry
        .fail_with(relforge_core::RegistryError::Auth("bad token".to_string()));

    let result = h.pipeline.run(&config(repo.path())).await;
    assert!(result.is_err());
    assert_eq!(h.executor.invocations(), 0);
    assert_eq!(h.tests.invocations(), 0);
}
