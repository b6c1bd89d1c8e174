// src/engine/runtime.rs

use std::fmt;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::ExecutorBackend;

use super::core::{CoreRuntime, RunReport};
use super::{CoreCommand, RuntimeEvent};

/// Async shell around [`CoreRuntime`]: pulls events off the channel, feeds
/// them to the core and forwards dispatch commands to the executor.
pub struct Runtime<E: ExecutorBackend> {
    core: CoreRuntime,
    events: mpsc::Receiver<RuntimeEvent>,
    executor: E,
}

impl<E: ExecutorBackend> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .finish_non_exhaustive()
    }
}

impl<E: ExecutorBackend> Runtime<E> {
    pub fn new(core: CoreRuntime, events: mpsc::Receiver<RuntimeEvent>, executor: E) -> Self {
        Self {
            core,
            events,
            executor,
        }
    }

    /// Run until the core asks to stop or every event sender is dropped.
    pub async fn run(mut self) -> Result<RunReport> {
        while let Some(event) = self.events.recv().await {
            debug!(?event, "event");
            let outcome = self.core.step(event);

            for step in &outcome.newly_failed {
                warn!(step = %step, "did not complete");
            }
            for command in outcome.commands {
                match command {
                    CoreCommand::DispatchTasks(tasks) if !tasks.is_empty() => {
                        self.executor.spawn_ready_tasks(tasks).await?;
                    }
                    CoreCommand::DispatchTasks(_) => {}
                    CoreCommand::RequestExit => info!("nothing left to run"),
                }
            }
            if !outcome.keep_running {
                break;
            }
        }

        let report = self.core.into_report();
        info!(
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            "finished"
        );
        Ok(report)
    }
}
