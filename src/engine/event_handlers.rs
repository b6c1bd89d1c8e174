// src/engine/event_handlers.rs

use crate::dag::{ScheduledTask, Scheduler, StepStatus, Transition};
use crate::engine::queue::TriggerQueue;
use crate::engine::{TaskName, TaskOutcome, TriggerReason};

/// Instruction from the core to the async shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoreCommand {
    DispatchTasks(Vec<ScheduledTask>),
    RequestExit,
}

/// Result of feeding one event to the core.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    pub commands: Vec<CoreCommand>,
    /// Failed steps, followed by the dependents they blocked.
    pub newly_failed: Vec<TaskName>,
    pub keep_running: bool,
}

impl CoreStep {
    fn dispatching(ready: Vec<ScheduledTask>) -> Self {
        let mut step = Self {
            keep_running: true,
            ..Self::default()
        };
        step.push_dispatch(ready);
        step
    }

    fn push_dispatch(&mut self, ready: Vec<ScheduledTask>) {
        if !ready.is_empty() {
            self.commands.push(CoreCommand::DispatchTasks(ready));
        }
    }
}

/// A step was triggered.
///
/// With no active run, a new one opens with this trigger plus the oldest
/// queued batch. A step outside the active run joins it; a step already in it is
/// parked in the queue for the next run.
pub fn handle_task_trigger(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    task: TaskName,
    reason: TriggerReason,
) -> CoreStep {
    if scheduler.is_idle() {
        let mut triggers = queued_reruns(queue);
        triggers.retain(|(queued, _)| *queued != task);
        triggers.push((task, reason));
        return start_new_run_from_triggers(scheduler, triggers);
    }

    match scheduler.status(&task) {
        Some(StepStatus::Idle) => {
            let joined = scheduler.enqueue(&task, reason.includes_dependents());
            CoreStep::dispatching(joined.dispatch)
        }
        Some(_) => {
            queue.record_trigger(&task);
            CoreStep::dispatching(Vec::new())
        }
        None => {
            tracing::warn!(step = %task, "trigger for a step outside the plan");
            CoreStep::dispatching(Vec::new())
        }
    }
}

/// A long-lived step came up.
pub fn handle_task_progress(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    task: TaskName,
) -> CoreStep {
    let up = scheduler.progressed(&task);
    follow_up(scheduler, queue, up)
}

pub fn handle_task_completion(
    scheduler: &mut Scheduler,
    queue: &mut TriggerQueue,
    task: TaskName,
    outcome: TaskOutcome,
) -> CoreStep {
    let done = scheduler.completed(&task, outcome);
    follow_up(scheduler, queue, done)
}

/// Open a run seeded with `triggers`. Manual triggers pull in dependents;
/// watch triggers do not.
pub fn start_new_run_from_triggers(
    scheduler: &mut Scheduler,
    triggers: Vec<(TaskName, TriggerReason)>,
) -> CoreStep {
    if triggers.is_empty() {
        return CoreStep::dispatching(Vec::new());
    }
    scheduler.begin_run();
    let ready = triggers
        .into_iter()
        .flat_map(|(task, reason)| scheduler.enqueue(&task, reason.includes_dependents()).dispatch)
        .collect();
    CoreStep::dispatching(ready)
}

/// Dispatch what a transition made ready; if it closed the run, start the
/// next queued batch.
fn follow_up(scheduler: &mut Scheduler, queue: &mut TriggerQueue, transition: Transition) -> CoreStep {
    let mut step = CoreStep::dispatching(transition.dispatch);
    step.newly_failed = transition.failed;
    if scheduler.is_idle() {
        let next = start_new_run_from_triggers(scheduler, queued_reruns(queue));
        step.commands.extend(next.commands);
    }
    step
}

fn queued_reruns(queue: &mut TriggerQueue) -> Vec<(TaskName, TriggerReason)> {
    queue
        .next_batch()
        .into_iter()
        .map(|task| (task, TriggerReason::FileWatch))
        .collect()
}
