//! relforge - release automation for embedded Linux images
//!
//! ## Commands
//!
//! - `run`: execute the full pipeline (decide, build, publish, test)
//! - `decide`: report the rebuild-trigger verdict without building
//! - `test`: run the hardware-in-the-loop test stage alone

mod github;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use relforge_core::{
    release_exists, ChangeDetector, CommandBuildExecutor, FsBuildCache, PathFilter, Pipeline,
    PipelineConfig, StageStatus, TriggerInputs,
};
use relforge_hil::{ProcessEmulator, ProvisionMode, TestOrchestrator, TestSpec};

use github::GithubReleaseRegistry;

#[derive(Parser)]
#[command(name = "relforge")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Release automation for embedded Linux images", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct DecideArgs {
    /// Reference name (tag) for this run
    #[arg(long)]
    reference: String,

    /// Base of the commit range
    #[arg(long, default_value = "HEAD~1")]
    base_ref: String,

    /// Head of the commit range
    #[arg(long, default_value = "HEAD")]
    head_ref: String,

    /// Repository directory
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    /// Build-relevant glob pattern (repeatable)
    #[arg(long = "path", required = true)]
    paths: Vec<String>,

    /// GitHub repository slug (owner/name)
    #[arg(long)]
    github_repo: String,

    /// GitHub API token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,
}

#[derive(clap::Args)]
struct TestArgs {
    /// Path to the test spec (JSON)
    #[arg(long)]
    spec: PathBuf,

    /// Emulator launcher command (whitespace-separated)
    #[arg(long, default_value = "renode-shell")]
    launcher: String,

    /// Assume auxiliary packages are already present instead of installing
    #[arg(long, env = "RELFORGE_ASSUME_PACKAGES")]
    assume_packages: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the full pipeline: decide, build, publish, test
    Run {
        #[command(flatten)]
        decide: DecideArgs,

        /// Build command (whitespace-separated); sees RELFORGE_REF and
        /// RELFORGE_CACHE in its environment
        #[arg(long)]
        build_cmd: String,

        /// Fixed path the build writes its artifact to
        #[arg(long)]
        artifact: PathBuf,

        /// Build timeout in seconds (0 disables)
        #[arg(long, default_value_t = 0)]
        build_timeout: u64,

        /// Build cache root directory
        #[arg(long, default_value = ".relforge/cache")]
        cache_root: PathBuf,

        /// Asset name the artifact is published under
        #[arg(long, default_value = "image.tar.xz")]
        asset_name: String,

        #[command(flatten)]
        test: TestArgs,
    },

    /// Report the rebuild-trigger verdict without building
    Decide {
        #[command(flatten)]
        decide: DecideArgs,
    },

    /// Run the hardware-in-the-loop test stage alone
    Test {
        #[command(flatten)]
        test: TestArgs,
    },
}

fn init_tracing(verbose: bool, json: bool) {
    use tracing_subscriber::EnvFilter;

    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn split_command(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

async fn load_test_spec(path: &PathBuf) -> Result<TestSpec> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading test spec {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing test spec {}", path.display()))
}

fn build_orchestrator(args: &TestArgs, spec: TestSpec) -> TestOrchestrator<ProcessEmulator> {
    let emulator = ProcessEmulator::new(split_command(&args.launcher));
    let mode = if args.assume_packages {
        ProvisionMode::AssumePresent
    } else {
        ProvisionMode::Install
    };
    TestOrchestrator::new(emulator, spec, mode)
}

async fn cmd_run(
    decide: DecideArgs,
    build_cmd: String,
    artifact: PathBuf,
    build_timeout: u64,
    cache_root: PathBuf,
    asset_name: String,
    test: TestArgs,
) -> Result<StageStatus> {
    let path_filter = PathFilter::new(&decide.paths)?;
    let spec = load_test_spec(&test.spec).await?;

    let registry = Arc::new(GithubReleaseRegistry::new(
        decide.github_repo.clone(),
        decide.token.clone(),
    ));
    let executor = Arc::new(CommandBuildExecutor::new(
        split_command(&build_cmd),
        artifact,
        build_timeout,
    ));
    let cache = Arc::new(FsBuildCache::new(cache_root));
    let tests = Arc::new(build_orchestrator(&test, spec));

    let pipeline = Pipeline::new(registry, executor, cache, tests);
    let config = PipelineConfig {
        reference: decide.reference,
        base_ref: decide.base_ref,
        head_ref: decide.head_ref,
        repo_dir: decide.repo,
        path_filter,
        asset_name,
    };

    let report = pipeline.run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.overall())
}

async fn cmd_decide(args: DecideArgs) -> Result<StageStatus> {
    let path_filter = PathFilter::new(&args.paths)?;
    let registry = GithubReleaseRegistry::new(args.github_repo, args.token);

    let sources_changed =
        ChangeDetector::detect(&args.repo, &args.base_ref, &args.head_ref, &path_filter).await?;
    let exists = release_exists(&registry, &args.reference).await?;

    let trigger = TriggerInputs {
        sources_changed,
        release_exists: exists,
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "reference": args.reference,
            "sources_changed": trigger.sources_changed,
            "release_exists": trigger.release_exists,
            "build_required": trigger.build_required(),
        }))?
    );
    Ok(StageStatus::Succeeded)
}

async fn cmd_test(args: TestArgs) -> Result<StageStatus> {
    let spec = load_test_spec(&args.spec).await?;
    let orchestrator = build_orchestrator(&args, spec);
    let status = orchestrator.run_stage().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(status)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    let status = match cli.command {
        Commands::Run {
            decide,
            build_cmd,
            artifact,
            build_timeout,
            cache_root,
            asset_name,
            test,
        } => {
            cmd_run(
                decide,
                build_cmd,
                artifact,
                build_timeout,
                cache_root,
                asset_name,
                test,
            )
            .await?
        }
        Commands::Decide { decide } => cmd_decide(decide).await?,
        Commands::Test { test } => cmd_test(test).await?,
    };

    if status.is_failed() {
        info!(status = %status, "run failed");
        std::process::exit(1);
    }
    Ok(())
}
