use proptest::prelude::*;
use weave::engine::{Decision, StepSnapshot, decide};
use weave::plan::{StepKind, StepStatus};

fn status() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Created),
        Just(StepStatus::Planning),
        Just(StepStatus::Scheduled),
        Just(StepStatus::Executed),
        Just(StepStatus::Failed),
        Just(StepStatus::Skipped),
    ]
}

fn terminal_status() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Executed),
        Just(StepStatus::Failed),
        Just(StepStatus::Skipped),
    ]
}

fn kind() -> impl Strategy<Value = StepKind> {
    prop_oneof![
        Just(StepKind::Plan),
        Just(StepKind::Setup),
        Just(StepKind::Teardown),
        Just(StepKind::Before),
        Just(StepKind::Phase),
        Just(StepKind::After),
        Just(StepKind::Goal),
    ]
}

fn snapshot() -> impl Strategy<Value = StepSnapshot> {
    (
        kind(),
        status(),
        proptest::collection::vec(status(), 0..5),
        proptest::option::of(terminal_status()),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(kind, status, predecessors, paired_before, halted, blacklisted)| StepSnapshot {
                kind,
                status,
                predecessors,
                paired_before: if kind == StepKind::After {
                    paired_before
                } else {
                    None
                },
                halted,
                blacklisted,
            },
        )
}

proptest! {
    #[test]
    fn nothing_is_decided_before_predecessors_finish(step in snapshot()) {
        if step.predecessors.iter().any(|s| !s.is_terminal()) {
            prop_assert_eq!(decide(&step), Decision::Wait);
        }
    }

    #[test]
    fn teardown_is_never_skipped(mut step in snapshot()) {
        step.kind = StepKind::Teardown;
        prop_assert_ne!(decide(&step), Decision::Skip);
    }

    #[test]
    fn ordinary_steps_only_run_after_executed_predecessors(step in snapshot()) {
        let ordinary = matches!(
            step.kind,
            StepKind::Setup | StepKind::Before | StepKind::Phase | StepKind::Goal
        );
        let all_executed = step.predecessors.iter().all(|s| *s == StepStatus::Executed);

        if ordinary && matches!(decide(&step), Decision::Schedule { .. }) {
            prop_assert!(all_executed);
            prop_assert!(!step.halted && !step.blacklisted);
        }
    }

    #[test]
    fn planning_steps_never_schedule_directly(mut step in snapshot()) {
        step.kind = StepKind::Plan;
        step.status = StepStatus::Planning;
        prop_assert!(!matches!(decide(&step), Decision::Schedule { .. }), "planning step was scheduled directly");
    }
}
