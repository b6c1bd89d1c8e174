// src/exec/backend.rs

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::mpsc;

use crate::dag::ScheduledTask;
use crate::engine::RuntimeEvent;
use crate::errors::Result;

use super::ExecContext;
use super::executor_loop::spawn_executor;

/// Where the runtime sends steps that are ready. The fake in the test-utils
/// crate answers with completion events instead of doing any work.
pub trait ExecutorBackend: Send {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Hands steps to the executor loop running pipelines, watchers and the
/// dev server.
pub struct RealExecutorBackend {
    queue: mpsc::Sender<ScheduledTask>,
}

impl RealExecutorBackend {
    /// Starts the executor loop right away.
    pub fn new(runtime_tx: mpsc::Sender<RuntimeEvent>, ctx: ExecContext) -> Self {
        Self {
            queue: spawn_executor(runtime_tx, Arc::new(ctx)),
        }
    }
}

impl ExecutorBackend for RealExecutorBackend {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let queue = self.queue.clone();
        Box::pin(async move {
            for task in tasks {
                let step = task.name.clone();
                queue
                    .send(task)
                    .await
                    .map_err(|_| anyhow!("executor stopped before {step} could be dispatched"))?;
            }
            Ok(())
        })
    }
}
