// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`RuntimeEvent`]s and produces:
//! - an updated core state
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async shell (`engine::runtime::Runtime`) reads events from the
//! channel, hands scheduled steps to the executor and reacts to shutdown.
//! The core itself has no Tokio types and performs no IO, so it is unit
//! tested directly.

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::dag::Scheduler;
use crate::engine::event_handlers::{
    handle_task_completion, handle_task_progress, handle_task_trigger, CoreCommand, CoreStep,
};
use crate::engine::queue::TriggerQueue;
use crate::engine::{RuntimeEvent, RuntimeOptions, TaskName, TaskOutcome};
use crate::types::TriggerWhileRunningBehaviour;

/// What happened over the lifetime of a runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub succeeded: BTreeSet<TaskName>,
    /// Steps that failed or were blocked by a failed predecessor.
    pub failed: BTreeSet<TaskName>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Process exit code: 0 on success, 1 if any step failed.
    pub fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }
}

/// Pure core runtime state.
#[derive(Debug)]
pub struct CoreRuntime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,
    /// Long-lived steps that reported progress and have not finished.
    alive: BTreeSet<TaskName>,
    report: RunReport,
}

impl CoreRuntime {
    pub fn new(
        scheduler: Scheduler,
        behaviour: TriggerWhileRunningBehaviour,
        queue_length: usize,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            scheduler,
            queue: TriggerQueue::new(behaviour, queue_length),
            options,
            alive: BTreeSet::new(),
            report: RunReport::default(),
        }
    }

    pub fn is_idle(&self) -> bool {
        self.scheduler.is_idle()
    }

    pub fn queue_is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn report(&self) -> &RunReport {
        &self.report
    }

    pub fn into_report(self) -> RunReport {
        self.report
    }

    /// Handle a single runtime event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: RuntimeEvent) -> CoreStep {
        let mut step = match event {
            RuntimeEvent::TaskTriggered { task, reason } => {
                handle_task_trigger(&mut self.scheduler, &mut self.queue, task, reason)
            }
            RuntimeEvent::TaskProgressed { task } => {
                if self.scheduler.is_long_lived(&task) {
                    self.alive.insert(task.clone());
                }
                handle_task_progress(&mut self.scheduler, &mut self.queue, task)
            }
            RuntimeEvent::TaskCompleted { task, outcome } => {
                let was_alive = self.alive.remove(&task);
                match outcome {
                    TaskOutcome::Success => {
                        self.report.succeeded.insert(task.clone());
                    }
                    TaskOutcome::Failed => {
                        if was_alive {
                            info!(task = %task, "long-lived step stopped with an error");
                        }
                        self.report.failed.insert(task.clone());
                    }
                }
                handle_task_completion(&mut self.scheduler, &mut self.queue, task, outcome)
            }
            RuntimeEvent::ShutdownRequested => {
                return CoreStep {
                    commands: Vec::new(),
                    newly_failed: Vec::new(),
                    keep_running: false,
                };
            }
        };

        self.report.failed.extend(step.newly_failed.iter().cloned());

        if self.options.exit_when_idle
            && self.scheduler.is_idle()
            && self.queue.is_empty()
            && self.alive.is_empty()
        {
            debug!("plan finished and nothing is alive; requesting exit");
            step.commands.push(CoreCommand::RequestExit);
            step.keep_running = false;
        }

        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::ScheduledTask;
    use crate::engine::TriggerReason;
    use crate::tasks::{ExecPlan, PlanStep};

    fn step(id: &str, after: &[&str], long_lived: bool) -> PlanStep {
        PlanStep {
            id: id.to_string(),
            task: id.to_string(),
            after: after.iter().map(|s| s.to_string()).collect(),
            long_lived,
            on_demand: false,
        }
    }

    fn core(steps: Vec<PlanStep>) -> CoreRuntime {
        let plan = ExecPlan::from_steps("t", steps);
        CoreRuntime::new(
            Scheduler::from_plan(&plan),
            TriggerWhileRunningBehaviour::Queue,
            1,
            RuntimeOptions::default(),
        )
    }

    fn dispatched(step: &CoreStep) -> Vec<String> {
        let mut names: Vec<String> = step
            .commands
            .iter()
            .filter_map(|c| match c {
                CoreCommand::DispatchTasks(tasks) => Some(tasks.iter().map(|t: &ScheduledTask| t.name.clone())),
                CoreCommand::RequestExit => None,
            })
            .flatten()
            .collect();
        names.sort();
        names
    }

    fn trigger(task: &str, reason: TriggerReason) -> RuntimeEvent {
        RuntimeEvent::TaskTriggered {
            task: task.into(),
            reason,
        }
    }

    fn done(task: &str, outcome: TaskOutcome) -> RuntimeEvent {
        RuntimeEvent::TaskCompleted {
            task: task.into(),
            outcome,
        }
    }

    #[test]
    fn series_failure_skips_the_rest() {
        let mut core = core(vec![step("a", &[], false), step("b", &["a"], false), step("c", &["b"], false)]);
        assert_eq!(dispatched(&core.step(trigger("a", TriggerReason::Manual))), vec!["a"]);
        assert_eq!(dispatched(&core.step(done("a", TaskOutcome::Success))), vec!["b"]);

        let s = core.step(done("b", TaskOutcome::Failed));
        assert!(dispatched(&s).is_empty());
        assert!(!s.keep_running);
        let failed: Vec<_> = core.report().failed.iter().cloned().collect();
        assert_eq!(failed, vec!["b", "c"]);
        assert_eq!(core.report().exit_code(), 1);
    }

    #[test]
    fn long_lived_steps_keep_the_runtime_alive() {
        let mut core = core(vec![step("build", &[], false), step("serve", &["build"], true)]);
        core.step(trigger("build", TriggerReason::Manual));
        assert_eq!(dispatched(&core.step(done("build", TaskOutcome::Success))), vec!["serve"]);

        let s = core.step(RuntimeEvent::TaskProgressed { task: "serve".into() });
        assert!(core.is_idle());
        assert!(s.keep_running);

        let s = core.step(done("serve", TaskOutcome::Success));
        assert!(!s.keep_running);
        assert!(core.report().is_success());
    }

    #[test]
    fn watch_triggers_rerun_only_the_named_step() {
        let mut core = core(vec![
            step("scss", &[], false),
            step("inject", &["scss"], false),
            step("watch", &["inject"], true),
        ]);
        core.step(trigger("scss", TriggerReason::Manual));
        core.step(done("scss", TaskOutcome::Success));
        core.step(done("inject", TaskOutcome::Success));
        core.step(RuntimeEvent::TaskProgressed { task: "watch".into() });
        assert!(core.is_idle());

        let s = core.step(trigger("scss", TriggerReason::FileWatch));
        assert_eq!(dispatched(&s), vec!["scss"]);
        let s = core.step(done("scss", TaskOutcome::Success));
        assert!(dispatched(&s).is_empty());
        assert!(core.is_idle());
        assert!(s.keep_running);
    }

    #[test]
    fn retrigger_while_running_is_coalesced() {
        let mut core = core(vec![step("scss", &[], false), step("watch", &[], true)]);
        core.step(trigger("watch", TriggerReason::Manual));
        core.step(RuntimeEvent::TaskProgressed { task: "watch".into() });

        assert_eq!(dispatched(&core.step(trigger("scss", TriggerReason::FileWatch))), vec!["scss"]);
        assert!(dispatched(&core.step(trigger("scss", TriggerReason::FileWatch))).is_empty());
        assert!(dispatched(&core.step(trigger("scss", TriggerReason::FileWatch))).is_empty());
        assert!(!core.queue_is_empty());

        assert_eq!(dispatched(&core.step(done("scss", TaskOutcome::Success))), vec!["scss"]);
        assert!(core.queue_is_empty());
        assert!(dispatched(&core.step(done("scss", TaskOutcome::Success))).is_empty());
    }

    #[test]
    fn longer_queue_reruns_once_per_queued_batch() {
        let plan = ExecPlan::from_steps("t", vec![step("scss", &[], false), step("watch", &[], true)]);
        let mut core = CoreRuntime::new(
            Scheduler::from_plan(&plan),
            TriggerWhileRunningBehaviour::Queue,
            2,
            RuntimeOptions::default(),
        );
        core.step(trigger("watch", TriggerReason::Manual));
        core.step(RuntimeEvent::TaskProgressed { task: "watch".into() });

        core.step(trigger("scss", TriggerReason::FileWatch));
        for _ in 0..3 {
            core.step(trigger("scss", TriggerReason::FileWatch));
        }

        assert_eq!(dispatched(&core.step(done("scss", TaskOutcome::Success))), vec!["scss"]);
        assert!(!core.queue_is_empty());
        assert_eq!(dispatched(&core.step(done("scss", TaskOutcome::Success))), vec!["scss"]);
        assert!(core.queue_is_empty());
        assert!(dispatched(&core.step(done("scss", TaskOutcome::Success))).is_empty());
    }

    #[test]
    fn shutdown_stops_the_loop() {
        let mut core = core(vec![step("a", &[], false)]);
        assert!(!core.step(RuntimeEvent::ShutdownRequested).keep_running);
    }
}
