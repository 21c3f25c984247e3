// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod lifecycle;
pub mod logging;
pub mod plan;
pub mod plugin;
pub mod project;
pub mod types;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::load_and_validate;
use crate::engine::{
    BuildOutcome, BuildPlanExecutor, ExecutionResult, ReactorContext, Session,
    calculate_task_segments,
};
use crate::exec::ShellMojoExecutor;
use crate::lifecycle::DefaultLifecycleRegistry;
use crate::plan::BuildPlan;
use crate::plugin::InMemoryMojoResolver;
use crate::types::FailureBehaviour;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - session, lifecycles and plugin descriptors
/// - task segments from the requested goals
/// - the build plan executor with the shell goal executor
/// - the final reactor summary
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    let request = cfg.request(args.threads, args.failure_behaviour());
    let failure_behaviour = request.failure_behaviour;
    let mut session = Session::new(cfg.projects(&config_root_dir(&config_path)), request)?;
    if let Some(root) = cfg.root_project() {
        session = session.with_top_level(&root)?;
    }
    let session = Arc::new(session);

    let lifecycles = Arc::new(DefaultLifecycleRegistry::with_lifecycles(
        cfg.extra_lifecycles(),
    )?);
    let resolver = Arc::new(InMemoryMojoResolver::new(cfg.plugin_descriptors()));

    let goals = if args.goals.is_empty() {
        cfg.build.goals.clone()
    } else {
        args.goals.clone()
    };
    let segments = calculate_task_segments(&session, resolver.as_ref(), &goals)?;
    debug!(?goals, segments = segments.len(), "requested goals");

    let executor = BuildPlanExecutor::new(Arc::new(ShellMojoExecutor::new()), resolver, lifecycles);

    if args.dry_run {
        let plan = executor.dry_run_plan(&session, &segments)?;
        print_dry_run(&session, &plan);
        return Ok(());
    }

    info!(
        projects = session.projects().len(),
        threads = session.request().degree_of_concurrency,
        ?failure_behaviour,
        "starting reactor build"
    );

    let reactor = ReactorContext::new(&session);
    executor.execute(Arc::clone(&session), &reactor, &segments).await?;

    print_summary(&session, reactor.result());

    let failures = reactor.result().exceptions();
    let fatal = failures.iter().any(|e| e.is_fatal());
    if !failures.is_empty() && (fatal || failure_behaviour != FailureBehaviour::FailNever) {
        bail!(
            "build failed: {} error(s), first: {}",
            failures.len(),
            failures
                .first()
                .map(ToString::to_string)
                .unwrap_or_default()
        );
    }
    Ok(())
}

/// Directory project `dir`s are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "build/Weave.toml"),
///   we use that directory.
/// - If it's just a bare filename like "Weave.toml" (parent = ""),
///   we fall back to the current working directory "."
fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Print every step of the fully planned build, in execution order.
fn print_dry_run(session: &Session, plan: &BuildPlan) {
    println!("weave dry-run");
    println!("  top-level project = {}", session.top_level_project());
    println!("  threads = {}", session.request().degree_of_concurrency);
    println!();

    for project in session.projects() {
        println!("{}", project.id);
        for id in plan.sorted_nodes() {
            let step = plan.node(*id);
            if step.project != project.id || step.is_pruned() {
                continue;
            }
            if step.has_executions() {
                for execution in step.executions() {
                    println!("  - {:<32} {execution}", step.name);
                }
            } else {
                println!("  - {}", step.name);
            }
        }
    }
}

fn print_summary(session: &Session, result: &ExecutionResult) {
    println!();
    println!("Reactor Summary:");
    for project in session.projects() {
        let (label, wall) = match result.build_summary(&project.id) {
            Some(summary) => {
                let label = match summary.outcome {
                    BuildOutcome::Success => "SUCCESS",
                    BuildOutcome::Failure(_) => "FAILURE",
                    BuildOutcome::Skipped => "SKIPPED",
                };
                (label, summary.wall_time)
            }
            None => ("SKIPPED", Duration::ZERO),
        };
        println!(
            "  {:<48} {:<8} [{:.3}s]",
            project.id.as_str(),
            label,
            wall.as_secs_f64()
        );
    }
}
