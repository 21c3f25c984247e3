// tests/concurrency.rs

mod common;
use crate::common::*;

use std::sync::Arc;
use std::time::Duration;

use weave::engine::{BuildContext, BuildPlanExecutor, ReactorContext, Task, TaskSegment};

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn wide_reactor(projects: usize, threads: usize) -> Reactor {
    (0..projects)
        .fold(ReactorBuilder::new().with_std_plugin(), |builder, i| {
            builder.project(ProjectBuilder::new(&format!("p{i}")).std_goals())
        })
        .threads(threads)
        .build()
}

#[tokio::test]
async fn worker_pool_never_exceeds_the_thread_count() -> TestResult {
    init_tracing();
    let executor = Arc::new(RecordingExecutor::new().with_delay(Duration::from_millis(10)));
    let run = run_build(&wide_reactor(4, 2), Arc::clone(&executor), &["install"]).await?;

    assert!(executor.max_concurrency() <= 2);
    for i in 0..4 {
        assert_eq!(outcome(&run, &format!("p{i}")), "SUCCESS");
    }
    Ok(())
}

#[tokio::test]
async fn every_goal_runs_exactly_once() -> TestResult {
    init_tracing();
    let reactor = ReactorBuilder::new()
        .with_std_plugin()
        .project(ProjectBuilder::new("a").std_goals())
        .project(ProjectBuilder::new("b").std_goals().depends_on("a"))
        .project(ProjectBuilder::new("c").std_goals().depends_on("a"))
        .project(ProjectBuilder::new("d").std_goals().depends_on("b").depends_on("c"))
        .project(ProjectBuilder::new("e").std_goals())
        .threads(4)
        .build();
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(&reactor, Arc::clone(&executor), &["clean", "install"]).await?;

    for project in ["a", "b", "c", "d", "e"] {
        for (goal, _) in STD_GOALS {
            assert_eq!(executor.count(project, goal), 1, "{goal} in {project}");
        }
        assert_eq!(outcome(&run, project), "SUCCESS");
    }
    assert_eq!(executor.calls().len(), 5 * STD_GOALS.len());
    assert_all_terminal(&run);
    Ok(())
}

#[tokio::test]
async fn thread_count_is_capped_by_the_reactor_size() -> TestResult {
    let reactor = wide_reactor(3, 8);
    let executor = BuildPlanExecutor::new(
        Arc::new(RecordingExecutor::new()),
        Arc::clone(&reactor.resolver) as _,
        Arc::clone(&reactor.lifecycles) as _,
    );
    let segments = vec![TaskSegment::new(false, vec![Task::parse("install")])];

    let context = BuildContext::new(
        executor.services().clone(),
        Arc::clone(&reactor.session),
        ReactorContext::new(&reactor.session),
        &segments,
    )?;
    assert_eq!(context.threads(), 3);
    assert!(reactor.session.is_parallel());

    let serial = wide_reactor(3, 1);
    BuildContext::new(
        executor.services().clone(),
        Arc::clone(&serial.session),
        ReactorContext::new(&serial.session),
        &segments,
    )?;
    assert!(!serial.session.is_parallel());
    Ok(())
}

#[tokio::test]
async fn thread_unsafe_goals_still_build_in_parallel() -> TestResult {
    init_tracing();
    let reactor = ReactorBuilder::new()
        .with_std_plugin()
        .plugin(
            PluginBuilder::new("org.example.plugins:legacy")
                .mojo(MojoBuilder::new("stamp").phase("package").thread_unsafe()),
        )
        .project(
            ProjectBuilder::new("left")
                .std_goals()
                .execution("org.example.plugins:legacy", "default", &["stamp"]),
        )
        .project(
            ProjectBuilder::new("right")
                .std_goals()
                .execution("org.example.plugins:legacy", "default", &["stamp"]),
        )
        .threads(2)
        .build();
    let executor = Arc::new(RecordingExecutor::new());
    let run = run_build(&reactor, Arc::clone(&executor), &["install"]).await?;

    for project in ["left", "right"] {
        assert_eq!(executor.count(project, "stamp"), 1);
        let stamp = executor.position(project, "stamp").expect("stamp ran");
        let install = executor.position(project, "install").expect("install ran");
        assert!(stamp < install);
        assert_eq!(outcome(&run, project), "SUCCESS");
    }
    Ok(())
}
