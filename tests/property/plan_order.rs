use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use weave::engine::{PlanCalculator, Task, TaskSegment};
use weave::plan::{BuildPlan, StepId, PLAN, SETUP, TEARDOWN};
use weave_test_utils::builders::{ProjectBuilder, Reactor, ReactorBuilder, project_id};

// Project N may only depend on projects 0..N-1, so every reactor is acyclic.
fn deps_strategy(max_projects: usize) -> impl Strategy<Value = Vec<HashSet<usize>>> {
    (1..=max_projects).prop_flat_map(|num_projects| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_projects),
            num_projects,
        )
        .prop_map(|raw_deps| {
            raw_deps
                .into_iter()
                .enumerate()
                .map(|(i, potential)| {
                    if i == 0 {
                        HashSet::new()
                    } else {
                        potential.into_iter().map(|d| d % i).collect()
                    }
                })
                .collect()
        })
    })
}

fn reactor(deps: &[HashSet<usize>]) -> Reactor {
    deps.iter()
        .enumerate()
        .fold(ReactorBuilder::new().with_std_plugin(), |builder, (i, ups)| {
            let project = ups.iter().fold(
                ProjectBuilder::new(&format!("p{i}")).std_goals(),
                |project, dep| project.depends_on(&format!("p{dep}")),
            );
            builder.project(project)
        })
        .build()
}

fn goals_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    proptest::sample::subsequence(vec!["clean", "sources", "compile", "install"], 1..=4)
}

fn initial_plan(reactor: &Reactor, goals: &[&str]) -> BuildPlan {
    let segments = vec![TaskSegment::new(
        false,
        goals.iter().map(|g| Task::parse(g)).collect(),
    )];
    PlanCalculator::new(
        &reactor.session,
        reactor.resolver.as_ref(),
        reactor.lifecycles.as_ref(),
    )
    .build_initial_plan(&segments)
    .unwrap()
}

fn positions(plan: &BuildPlan) -> HashMap<StepId, usize> {
    plan.sorted_nodes()
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, i))
        .collect()
}

proptest! {
    #[test]
    fn sorted_nodes_respect_every_edge(
        deps in deps_strategy(8),
        goals in goals_strategy(),
    ) {
        let plan = initial_plan(&reactor(&deps), &goals);
        let pos = positions(&plan);

        prop_assert_eq!(pos.len(), plan.len());
        for id in plan.all_steps() {
            for succ in plan.successors(id) {
                prop_assert!(pos[&id] < pos[&succ]);
            }
        }
    }

    #[test]
    fn every_project_is_wrapped_by_plan_setup_and_teardown(
        deps in deps_strategy(6),
        goals in goals_strategy(),
    ) {
        let plan = initial_plan(&reactor(&deps), &goals);

        for project in plan.projects() {
            let plan_step = plan.required_step(project, PLAN).unwrap();
            let setup = plan.required_step(project, SETUP).unwrap();
            let teardown = plan.required_step(project, TEARDOWN).unwrap();
            let before_teardown = plan.all_predecessors(teardown);

            prop_assert!(plan.all_predecessors(setup).contains(&plan_step));
            for id in plan.steps(project) {
                if id != teardown {
                    prop_assert!(
                        before_teardown.contains(&id),
                        "{} does not precede the teardown of {}",
                        plan.node(id).name,
                        project
                    );
                }
            }
        }
    }

    #[test]
    fn plan_records_direct_upstreams(
        deps in deps_strategy(8),
    ) {
        let plan = initial_plan(&reactor(&deps), &["compile"]);

        for (i, expected) in deps.iter().enumerate() {
            let upstreams: HashSet<_> = plan
                .upstreams(&project_id(&format!("p{i}")))
                .iter()
                .cloned()
                .collect();
            let expected: HashSet<_> = expected
                .iter()
                .map(|d| project_id(&format!("p{d}")))
                .collect();
            prop_assert_eq!(upstreams, expected);
        }
    }

    #[test]
    fn then_keeps_every_step_name_once(
        deps in deps_strategy(4),
        first in goals_strategy(),
        second in goals_strategy(),
    ) {
        let reactor = reactor(&deps);
        let calculator = PlanCalculator::new(
            &reactor.session,
            reactor.resolver.as_ref(),
            reactor.lifecycles.as_ref(),
        );
        let projects = calculator.all_projects();
        let tasks = |goals: &[&str]| goals.iter().map(|g| Task::parse(g)).collect::<Vec<_>>();

        let mut plan = calculator.calculate_mojo_executions(&projects, &tasks(&first)).unwrap();
        let other = calculator.calculate_mojo_executions(&projects, &tasks(&second)).unwrap();

        let mut expected: HashMap<_, HashSet<String>> = HashMap::new();
        for source in [&plan, &other] {
            for id in source.all_steps() {
                let step = source.node(id);
                expected
                    .entry(step.project.clone())
                    .or_default()
                    .insert(step.name.clone());
            }
        }

        plan.then(other);

        for (project, names) in expected {
            let mut actual: Vec<String> = plan
                .steps(&project)
                .map(|id| plan.node(id).name.clone())
                .collect();
            let len = actual.len();
            actual.sort();
            actual.dedup();
            prop_assert_eq!(actual.len(), len, "duplicate step names in {}", project);
            prop_assert_eq!(actual.into_iter().collect::<HashSet<_>>(), names);
        }
    }
}
