// src/engine/mod.rs

//! The runtime loop.
//!
//! [`CoreRuntime`] is a synchronous state machine: it takes one
//! [`RuntimeEvent`] at a time and answers with commands. [`Runtime`] wraps
//! it with the tokio channel and the executor. Triggers that hit a step
//! already in the active run are parked in the [`TriggerQueue`].

pub mod core;
pub mod event_handlers;
pub mod queue;
pub mod runtime;

pub use core::{CoreRuntime, RunReport};
pub use event_handlers::{CoreCommand, CoreStep};
pub use queue::TriggerQueue;
pub use runtime::Runtime;
pub use crate::types::TriggerWhileRunningBehaviour;

/// Step id or registry task name.
pub type TaskName = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    Failed,
}

/// Why a step was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// Plan start: the step and everything downstream of it runs.
    Manual,
    /// A watched file changed: only the step itself re-runs.
    FileWatch,
}

impl TriggerReason {
    pub fn includes_dependents(self) -> bool {
        matches!(self, TriggerReason::Manual)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Stop once no run is active, nothing is queued and no watch or serve
    /// step is still up.
    pub exit_when_idle: bool,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: true,
        }
    }
}

/// Input to the runtime. Sent by the plan seeding in `run`, the file
/// watcher, the executor and the Ctrl-C handler.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered { task: TaskName, reason: TriggerReason },
    /// A watch or serve step is up.
    TaskProgressed { task: TaskName },
    TaskCompleted { task: TaskName, outcome: TaskOutcome },
    ShutdownRequested,
}
