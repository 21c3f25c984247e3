// tests/forks_and_segments.rs

mod common;
use crate::common::*;

use std::sync::Arc;

use weave::plan::{StepStatus, TEARDOWN};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const TOOLS: &str = "org.example.plugins:tools";
const SITE: &str = "org.example.plugins:site";

fn tools(check: MojoBuilder) -> PluginBuilder {
    PluginBuilder::new(TOOLS)
        .prefix("tools")
        .mojo(check)
        .mojo(MojoBuilder::new("lint"))
        .overlay("lint-cycle", &[("sources", &["lint"])])
}

fn checked_project(check: MojoBuilder) -> Reactor {
    ReactorBuilder::new()
        .with_std_plugin()
        .plugin(tools(check))
        .project(ProjectBuilder::new("core").std_goals())
        .build()
}

#[tokio::test]
async fn phase_fork_runs_the_lifecycle_before_the_goal() -> TestResult {
    init_tracing();
    let reactor = checked_project(MojoBuilder::new("check").fork_phase("compile"));
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(&reactor, Arc::clone(&executor), &["tools:check"]).await?;

    assert_eq!(executor.goals_for("core"), vec!["generate", "compile", "check"]);
    assert_eq!(
        run.status("core", "fork(default-cli):compile"),
        Some(StepStatus::Executed)
    );
    assert_eq!(outcome(&run, "core"), "SUCCESS");
    Ok(())
}

#[tokio::test]
async fn goal_without_a_fork_adds_no_forked_steps() -> TestResult {
    init_tracing();
    let reactor = checked_project(MojoBuilder::new("check"));
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(&reactor, Arc::clone(&executor), &["tools:check"]).await?;

    assert_eq!(executor.goals_for("core"), vec!["check"]);
    let forked: Vec<&str> = run
        .steps
        .iter()
        .filter(|s| s.name.starts_with("fork("))
        .map(|s| s.name.as_str())
        .collect();
    assert!(forked.is_empty(), "unexpected forked steps: {forked:?}");
    assert_eq!(outcome(&run, "core"), "SUCCESS");
    Ok(())
}

#[tokio::test]
async fn phase_fork_binds_the_plugin_overlay() -> TestResult {
    init_tracing();
    let reactor = checked_project(
        MojoBuilder::new("check")
            .fork_phase("compile")
            .fork_lifecycle("lint-cycle"),
    );
    let executor = Arc::new(RecordingExecutor::new());
    run_build(&reactor, Arc::clone(&executor), &["tools:check"]).await?;

    assert_eq!(
        executor.goals_for("core"),
        vec!["generate", "lint", "compile", "check"]
    );
    let lint = executor
        .calls()
        .into_iter()
        .find(|c| c.goal == "lint")
        .expect("lint ran");
    assert_eq!(lint.execution_id, "lint-cycle-lint");
    Ok(())
}

#[tokio::test]
async fn goal_fork_runs_the_forked_goal_first() -> TestResult {
    init_tracing();
    let reactor = checked_project(MojoBuilder::new("check").fork_goal("lint"));
    let executor = Arc::new(RecordingExecutor::new());
    run_build(&reactor, Arc::clone(&executor), &["tools:check@ci"]).await?;

    let calls = executor.calls();
    assert_eq!(executor.goals_for("core"), vec!["lint", "check"]);
    assert_eq!(calls[1].execution_id, "ci");
    Ok(())
}

fn aggregated_reactor() -> Reactor {
    ReactorBuilder::new()
        .with_std_plugin()
        .plugin(
            PluginBuilder::new(SITE)
                .prefix("site")
                .mojo(MojoBuilder::new("report").aggregator().fork_goal("collect"))
                .mojo(MojoBuilder::new("collect")),
        )
        .project(
            ProjectBuilder::new("root")
                .std_goals()
                .module("lib-a")
                .module("lib-b"),
        )
        .project(ProjectBuilder::new("lib-a").std_goals())
        .project(ProjectBuilder::new("lib-b").std_goals())
        .threads(3)
        .build()
}

#[tokio::test]
async fn aggregating_goal_runs_once_on_the_top_level_project() -> TestResult {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(
        &aggregated_reactor(),
        Arc::clone(&executor),
        &["compile", "site:report"],
    )
    .await?;

    assert_eq!(executor.count("root", "report"), 1);
    assert_eq!(executor.count("lib-a", "report"), 0);
    assert_eq!(executor.count("lib-b", "report"), 0);
    for project in ["root", "lib-a", "lib-b"] {
        assert_eq!(executor.count(project, "compile"), 1, "compile in {project}");
        assert_eq!(outcome(&run, project), "SUCCESS");
    }

    let root_compile = executor.position("root", "compile").expect("root compiled");
    let report = executor.position("root", "report").expect("report ran");
    assert!(root_compile < report);
    Ok(())
}

#[tokio::test]
async fn aggregator_fork_reaches_every_module() -> TestResult {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(&aggregated_reactor(), Arc::clone(&executor), &["site:report"]).await?;

    let report = executor.position("root", "report").expect("report ran");
    for project in ["root", "lib-a", "lib-b"] {
        let collect = executor
            .position(project, "collect")
            .unwrap_or_else(|| panic!("collect ran in {project}"));
        assert!(collect < report, "collect in {project} precedes the report");
        assert_eq!(executor.count(project, "collect"), 1);
    }

    // Module teardowns wait for the forked work done on their behalf.
    for module in ["lib-a", "lib-b"] {
        assert_eq!(
            run.status(module, "fork(default-cli):collect"),
            Some(StepStatus::Executed)
        );
        assert_eq!(run.status(module, TEARDOWN), Some(StepStatus::Executed));
        assert_eq!(outcome(&run, module), "SUCCESS");
    }
    assert_all_terminal(&run);
    Ok(())
}
