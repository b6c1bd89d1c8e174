// src/dag/scheduler.rs

use std::collections::{HashMap, HashSet};

use tracing::{debug, info, warn};

use crate::dag::graph::DagGraph;
use crate::dag::step_state::{Phase, ScheduledTask, StepSlot, StepStatus};
use crate::engine::{TaskName, TaskOutcome};
use crate::tasks::ExecPlan;

/// What a single scheduler input changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transition {
    /// Steps whose predecessors are now all satisfied.
    pub dispatch: Vec<ScheduledTask>,
    /// The failing step first, then every dependent it blocked.
    pub failed: Vec<TaskName>,
    /// The active run ended with this input.
    pub finished: bool,
}

/// Run-by-run scheduler over the steps of one plan.
///
/// A run is a set of steps that joined it through triggers. A step inside
/// the run is dispatched once each predecessor either succeeded in this run
/// or, when it did not join the run, succeeded in some earlier one. When a
/// step fails every dependent that joined the run fails with it. The run
/// ends when no joined step is waiting or dispatched.
#[derive(Debug)]
pub struct Scheduler {
    graph: DagGraph,
    slots: HashMap<TaskName, StepSlot>,
    runs_started: u64,
    active_run: Option<u64>,
}

impl Scheduler {
    pub fn from_plan(plan: &ExecPlan) -> Self {
        Self {
            graph: DagGraph::from_plan(plan),
            slots: plan
                .steps
                .iter()
                .map(|step| (step.id.clone(), StepSlot::new(step)))
                .collect(),
            runs_started: 0,
            active_run: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.active_run.is_none()
    }

    /// `None` for an id the plan does not contain.
    pub fn status(&self, step: &str) -> Option<StepStatus> {
        self.slots.get(step).map(|slot| slot.phase.into())
    }

    pub fn is_long_lived(&self, step: &str) -> bool {
        self.slots.get(step).is_some_and(|slot| slot.long_lived)
    }

    /// How many times `step` has been handed to the executor.
    pub fn dispatch_count(&self, step: &str) -> u32 {
        self.slots.get(step).map_or(0, |slot| slot.dispatches)
    }

    /// Open a fresh run. Per-run phases are cleared; success history is kept.
    pub fn begin_run(&mut self) {
        self.runs_started += 1;
        self.active_run = Some(self.runs_started);
        for slot in self.slots.values_mut() {
            slot.phase = None;
        }
        debug!(run = self.runs_started, "run opened");
    }

    /// Add `step` to the active run, opening one if needed. With
    /// `with_dependents` every transitive dependent joins too.
    pub fn enqueue(&mut self, step: &str, with_dependents: bool) -> Transition {
        if self.active_run.is_none() {
            self.begin_run();
        }
        if !self.slots.contains_key(step) {
            warn!(step, "trigger names no step of this plan");
            return self.settle(Vec::new(), Vec::new());
        }

        let mut pending = vec![step.to_string()];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            if let Some(slot) = self.slots.get_mut(&id) {
                if slot.phase.is_none() {
                    slot.phase = Some(Phase::Waiting);
                    debug!(step = %id, "joined run");
                }
            }
            if with_dependents {
                pending.extend(self.graph.dependents_of(&id).iter().cloned());
            }
        }

        let ready = self.dispatch_ready();
        self.settle(ready, Vec::new())
    }

    /// A long-lived step reported that it is up. For scheduling this counts
    /// as success, so its dependents may start while it keeps running.
    pub fn progressed(&mut self, step: &str) -> Transition {
        if self.active_run.is_none() {
            debug!(step, "progress outside a run");
            return Transition::default();
        }
        let Some(slot) = self.slots.get_mut(step) else {
            warn!(step, "progress from unknown step");
            return Transition::default();
        };
        slot.phase = Some(Phase::Succeeded);
        slot.ever_succeeded = true;

        let ready = self.dispatch_ready();
        self.settle(ready, Vec::new())
    }

    pub fn completed(&mut self, step: &str, outcome: TaskOutcome) -> Transition {
        let Some(run) = self.active_run else {
            // A long-lived step stopping after its run ended.
            debug!(step, ?outcome, "completion outside a run");
            return Transition::default();
        };
        let Some(slot) = self.slots.get_mut(step) else {
            warn!(step, "completion from unknown step");
            return Transition::default();
        };

        match outcome {
            TaskOutcome::Success => {
                slot.phase = Some(Phase::Succeeded);
                slot.ever_succeeded = true;
                debug!(step, run, "step succeeded");
                let ready = self.dispatch_ready();
                self.settle(ready, Vec::new())
            }
            TaskOutcome::Failed => {
                slot.phase = Some(Phase::Failed);
                warn!(step, run, "step failed; skipping its dependents");
                let mut failed = vec![step.to_string()];
                failed.extend(self.block_dependents(step));
                self.settle(Vec::new(), failed)
            }
        }
    }

    fn satisfied(&self, slot: &StepSlot) -> bool {
        slot.after.iter().all(|dep| match self.slots.get(dep) {
            Some(dep) => match dep.phase {
                Some(Phase::Succeeded) => true,
                Some(_) => false,
                None => dep.ever_succeeded,
            },
            None => false,
        })
    }

    /// Move every waiting step whose predecessors are satisfied to
    /// `Dispatched` and return the work orders.
    fn dispatch_ready(&mut self) -> Vec<ScheduledTask> {
        let run_id = self.active_run.unwrap_or_default();
        let mut ready: Vec<TaskName> = self
            .slots
            .values()
            .filter(|slot| slot.phase == Some(Phase::Waiting) && self.satisfied(slot))
            .map(|slot| slot.id.clone())
            .collect();
        ready.sort();

        ready
            .into_iter()
            .filter_map(|id| {
                let slot = self.slots.get_mut(&id)?;
                slot.phase = Some(Phase::Dispatched);
                slot.dispatches += 1;
                info!(step = %slot.id, run = run_id, again = slot.dispatches > 1, "dispatching");
                Some(ScheduledTask {
                    name: slot.id.clone(),
                    task: slot.task.clone(),
                    long_lived: slot.long_lived,
                    run_id,
                })
            })
            .collect()
    }

    /// Fail every in-flight transitive dependent of `step`.
    fn block_dependents(&mut self, step: &str) -> Vec<TaskName> {
        let mut blocked = Vec::new();
        let mut pending: Vec<TaskName> = self.graph.dependents_of(step).to_vec();
        while let Some(id) = pending.pop() {
            let Some(slot) = self.slots.get_mut(&id) else {
                continue;
            };
            if !slot.in_flight() {
                continue;
            }
            slot.phase = Some(Phase::Failed);
            debug!(step = %id, upstream = step, "skipped after upstream failure");
            blocked.push(id.clone());
            pending.extend(self.graph.dependents_of(&id).iter().cloned());
        }
        blocked
    }

    fn settle(&mut self, dispatch: Vec<ScheduledTask>, failed: Vec<TaskName>) -> Transition {
        let finished = self.active_run.is_some() && !self.slots.values().any(StepSlot::in_flight);
        if finished {
            info!(run = self.active_run, "run finished");
            self.active_run = None;
        }
        Transition {
            dispatch,
            failed,
            finished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::PlanStep;

    fn plan(steps: &[(&str, &[&str])]) -> ExecPlan {
        ExecPlan::from_steps(
            "t",
            steps
                .iter()
                .map(|(id, after)| PlanStep {
                    id: id.to_string(),
                    task: id.to_string(),
                    after: after.iter().map(|s| s.to_string()).collect(),
                    long_lived: false,
                    on_demand: false,
                })
                .collect(),
        )
    }

    fn names(t: &Transition) -> Vec<&str> {
        t.dispatch.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn diamond_waits_for_both_branches() {
        let mut s = Scheduler::from_plan(&plan(&[
            ("clean", &[]),
            ("css", &["clean"]),
            ("js", &["clean"]),
            ("inject", &["css", "js"]),
        ]));
        assert_eq!(names(&s.enqueue("clean", true)), vec!["clean"]);
        assert_eq!(names(&s.completed("clean", TaskOutcome::Success)), vec!["css", "js"]);
        assert!(s.completed("css", TaskOutcome::Success).dispatch.is_empty());
        assert_eq!(names(&s.completed("js", TaskOutcome::Success)), vec!["inject"]);
        let last = s.completed("inject", TaskOutcome::Success);
        assert!(last.finished);
        assert!(s.is_idle());
    }

    #[test]
    fn failure_blocks_only_joined_dependents() {
        let mut s = Scheduler::from_plan(&plan(&[("a", &[]), ("b", &["a"]), ("c", &["b"]), ("x", &[])]));
        s.enqueue("a", true);
        let t = s.completed("a", TaskOutcome::Failed);
        assert_eq!(t.failed, vec!["a", "b", "c"]);
        assert!(t.finished);
        assert_eq!(s.status("x"), Some(StepStatus::Idle));
    }

    #[test]
    fn isolated_rerun_relies_on_earlier_success() {
        let mut s = Scheduler::from_plan(&plan(&[("a", &[]), ("b", &["a"])]));
        s.enqueue("b", false);
        assert_eq!(s.status("b"), Some(StepStatus::Waiting));
        s.completed("b", TaskOutcome::Failed);

        s.enqueue("a", true);
        s.completed("a", TaskOutcome::Success);
        s.completed("b", TaskOutcome::Success);

        s.begin_run();
        assert_eq!(names(&s.enqueue("b", false)), vec!["b"]);
        assert_eq!(s.dispatch_count("b"), 2);
    }

    #[test]
    fn unknown_steps_are_ignored() {
        let mut s = Scheduler::from_plan(&plan(&[("a", &[])]));
        assert_eq!(s.status("nope"), None);
        assert!(s.enqueue("nope", true).finished);
        assert_eq!(s.completed("nope", TaskOutcome::Success), Transition::default());
    }
}
