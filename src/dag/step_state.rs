// src/dag/step_state.rs

use crate::engine::TaskName;
use crate::tasks::PlanStep;

/// Where a step stands inside the active run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Joined the run; some predecessor has not succeeded yet.
    Waiting,
    Dispatched,
    /// Completed, or (long-lived) reported that it is up.
    Succeeded,
    /// Failed, or skipped because a predecessor failed.
    Failed,
}

/// Read-only status of a step, as seen from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// Not part of the active run (or there is none).
    Idle,
    Waiting,
    Dispatched,
    Succeeded,
    Failed,
}

impl From<Option<Phase>> for StepStatus {
    fn from(phase: Option<Phase>) -> Self {
        match phase {
            None => StepStatus::Idle,
            Some(Phase::Waiting) => StepStatus::Waiting,
            Some(Phase::Dispatched) => StepStatus::Dispatched,
            Some(Phase::Succeeded) => StepStatus::Succeeded,
            Some(Phase::Failed) => StepStatus::Failed,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct StepSlot {
    pub id: TaskName,
    pub task: TaskName,
    pub long_lived: bool,
    pub after: Vec<TaskName>,
    pub phase: Option<Phase>,
    /// Set once the step has succeeded in any run. A predecessor outside
    /// the active run counts as satisfied only if this is set.
    pub ever_succeeded: bool,
    pub dispatches: u32,
}

impl StepSlot {
    pub fn new(step: &PlanStep) -> Self {
        Self {
            id: step.id.clone(),
            task: step.task.clone(),
            long_lived: step.long_lived,
            after: step.after.clone(),
            phase: None,
            ever_succeeded: false,
            dispatches: 0,
        }
    }

    pub fn in_flight(&self) -> bool {
        matches!(self.phase, Some(Phase::Waiting | Phase::Dispatched))
    }
}

/// Work order handed to the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledTask {
    /// Step id; progress and completion events name this.
    pub name: TaskName,
    /// Registry task to execute.
    pub task: TaskName,
    pub long_lived: bool,
    pub run_id: u64,
}
