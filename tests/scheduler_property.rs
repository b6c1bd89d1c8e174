// tests/scheduler_property.rs

use std::collections::{BTreeSet, HashMap, VecDeque};

use proptest::prelude::*;
use assetdag::dag::Scheduler;
use assetdag::engine::{
    CoreCommand, CoreRuntime, RuntimeEvent, RuntimeOptions, TaskOutcome, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use assetdag::tasks::{ExecPlan, PlanStep};

// Acyclic by construction: step N may only wait on steps 0..N-1.
fn plan_strategy(max_steps: usize) -> impl Strategy<Value = ExecPlan> {
    (1..=max_steps).prop_flat_map(|n| {
        proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), n).prop_map(
            move |raw| {
                let steps = raw
                    .into_iter()
                    .enumerate()
                    .map(|(i, picks)| {
                        let after: BTreeSet<String> = if i == 0 {
                            BTreeSet::new()
                        } else {
                            picks.into_iter().map(|p| format!("s{}", p % i)).collect()
                        };
                        PlanStep {
                            id: format!("s{i}"),
                            task: format!("s{i}"),
                            after: after.into_iter().collect(),
                            long_lived: false,
                            on_demand: false,
                        }
                    })
                    .collect();
                ExecPlan::from_steps("prop", steps)
            },
        )
    })
}

fn dispatched(commands: Vec<CoreCommand>, into: &mut VecDeque<String>) -> bool {
    let mut exit = false;
    for command in commands {
        match command {
            CoreCommand::DispatchTasks(tasks) => into.extend(tasks.into_iter().map(|t| t.name)),
            CoreCommand::RequestExit => exit = true,
        }
    }
    exit
}

proptest! {
    #[test]
    fn plans_run_to_completion_and_never_run_past_a_failure(
        plan in plan_strategy(10),
        failing_idx in proptest::collection::btree_set(0..10usize, 0..4),
    ) {
        let failing: BTreeSet<String> = failing_idx.iter().map(|i| format!("s{i}")).collect();
        let preds: HashMap<&str, &[String]> =
            plan.steps.iter().map(|s| (s.id.as_str(), s.after.as_slice())).collect();

        let mut core = CoreRuntime::new(
            Scheduler::from_plan(&plan),
            TriggerWhileRunningBehaviour::Queue,
            1,
            RuntimeOptions::default(),
        );

        let mut executing = VecDeque::new();
        let mut ran: Vec<String> = Vec::new();
        let mut exited = false;

        for root in plan.roots() {
            let step = core.step(RuntimeEvent::TaskTriggered { task: root, reason: TriggerReason::Manual });
            exited |= dispatched(step.commands, &mut executing);
        }

        let mut guard = 0;
        while let Some(step_id) = executing.pop_front() {
            guard += 1;
            prop_assert!(guard < 1000, "simulation did not terminate");

            for pred in preds[step_id.as_str()] {
                prop_assert!(ran.contains(pred), "{} ran before {}", step_id, pred);
                prop_assert!(!failing.contains(pred), "{} ran after failed {}", step_id, pred);
            }
            prop_assert!(!ran.contains(&step_id), "{} ran twice", step_id);
            ran.push(step_id.clone());

            let outcome = if failing.contains(&step_id) { TaskOutcome::Failed } else { TaskOutcome::Success };
            let step = core.step(RuntimeEvent::TaskCompleted { task: step_id, outcome });
            exited |= dispatched(step.commands, &mut executing);
        }

        prop_assert!(exited, "core never requested exit");

        // Every step either ran or sits downstream of a failure.
        let report = core.report();
        for step in &plan.steps {
            prop_assert!(
                ran.contains(&step.id) || report.failed.contains(&step.id),
                "{} neither ran nor failed", step.id
            );
        }
        let any_failed = ran.iter().any(|s| failing.contains(s));
        prop_assert_eq!(report.exit_code(), if any_failed { 1 } else { 0 });
    }
}
