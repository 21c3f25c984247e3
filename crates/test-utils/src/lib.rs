pub mod builders;
pub mod recording;

use std::sync::{Arc, Once};

use tracing_subscriber::{EnvFilter, fmt};
use weave::engine::{
    BuildContext, BuildPlanExecutor, ExecutionResult, ReactorContext, calculate_task_segments,
};
use weave::plan::StepStatus;
use weave::project::ProjectId;

use crate::builders::Reactor;
use crate::recording::{RecordingExecutor, RecordingListener};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(std::time::Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Final state of one step of the plan.
#[derive(Debug, Clone)]
pub struct StepRecord {
    pub project: ProjectId,
    pub name: String,
    pub status: StepStatus,
}

/// Everything observable after a finished build.
pub struct BuildRun {
    pub reactor: ReactorContext,
    pub listener: Arc<RecordingListener>,
    /// Every step of the plan as it stood when the build ended.
    pub steps: Vec<StepRecord>,
}

impl BuildRun {
    pub fn result(&self) -> &Arc<ExecutionResult> {
        self.reactor.result()
    }

    /// Status of the step `name` of the project with artifact id `artifact`.
    pub fn status(&self, artifact: &str, name: &str) -> Option<StepStatus> {
        self.steps
            .iter()
            .find(|s| s.project.artifact_id() == artifact && s.name == name)
            .map(|s| s.status)
    }
}

/// Build `reactor` for `goals` with `executor`, under the 5-second timeout.
pub async fn run_build(
    reactor: &Reactor,
    executor: Arc<RecordingExecutor>,
    goals: &[&str],
) -> anyhow::Result<BuildRun> {
    let goals: Vec<String> = goals.iter().map(|g| g.to_string()).collect();
    let segments = calculate_task_segments(&reactor.session, reactor.resolver.as_ref(), &goals)?;

    let listener = Arc::new(RecordingListener::new());
    let executor = BuildPlanExecutor::new(
        executor,
        Arc::clone(&reactor.resolver) as _,
        Arc::clone(&reactor.lifecycles) as _,
    )
    .with_listener(Arc::clone(&listener) as _);

    let context = ReactorContext::new(&reactor.session);
    let build = BuildContext::new(
        executor.services().clone(),
        Arc::clone(&reactor.session),
        context.clone(),
        &segments,
    )?;
    with_timeout(build.execute()).await;

    let steps = {
        let plan = build.plan().read().await;
        plan.all_steps()
            .map(|id| {
                let step = plan.node(id);
                StepRecord {
                    project: step.project.clone(),
                    name: step.name.clone(),
                    status: step.status(),
                }
            })
            .collect()
    };
    Ok(BuildRun {
        reactor: context,
        listener,
        steps,
    })
}
