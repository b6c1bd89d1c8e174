// src/exec/mod.rs

//! Step execution layer.
//!
//! This module runs the leaf jobs behind scheduled steps on the Tokio runtime
//! and reports back to the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`executor_loop`] owns the background loop that receives scheduled
//!   steps, serialises runs of the same task and keeps long-lived steps
//!   unique.
//! - [`task_runner`] runs a single job: pipelines on the blocking pool,
//!   watch and serve as long-lived futures that report progress once up.
//! - [`backend`] provides the `ExecutorBackend` trait and a concrete
//!   `RealExecutorBackend` that the runtime uses in production, and which
//!   tests can replace with a fake implementation.

pub mod backend;
pub mod executor_loop;
pub mod task_runner;

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::engine::TaskName;
use crate::fs::FileSystem;
use crate::tasks::TaskRegistry;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;

/// Everything a job needs to run, shared by all steps.
#[derive(Clone)]
pub struct ExecContext {
    pub registry: Arc<TaskRegistry>,
    pub fs: Arc<dyn FileSystem>,
    /// Project root all paths are relative to.
    pub root: PathBuf,
    /// Step id for each task a watch binding may trigger.
    pub step_ids: HashMap<TaskName, TaskName>,
}

impl ExecContext {
    /// The step that watch triggers for `task` should target.
    pub fn step_for(&self, task: &str) -> TaskName {
        self.step_ids
            .get(task)
            .cloned()
            .unwrap_or_else(|| task.to_string())
    }
}

impl fmt::Debug for ExecContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecContext")
            .field("tasks", &self.registry.len())
            .field("root", &self.root)
            .field("step_ids", &self.step_ids)
            .finish()
    }
}
