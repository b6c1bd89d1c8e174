// src/dag/mod.rs

//! Step graph of an expanded plan and the run scheduler on top of it.
//!
//! [`Scheduler`] owns the per-run bookkeeping; [`DagGraph`] is the static
//! adjacency it walks. Neither performs IO.

pub mod graph;
pub mod scheduler;
pub mod step_state;

pub use graph::DagGraph;
pub use scheduler::{Scheduler, Transition};
pub use step_state::{ScheduledTask, StepStatus};
