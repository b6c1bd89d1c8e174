// src/exec/executor_loop.rs

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskName};
use crate::exec::ExecContext;
use crate::exec::task_runner::run_task;

/// Start the loop that turns work orders into tokio tasks and return its
/// inbox.
///
/// Two runs of the same registry task never overlap: each task has a lock
/// and a watch re-run of `scss` waits for the previous one. A long-lived
/// step that is still up is not started again; the request is answered
/// with a progress event instead.
pub fn spawn_executor(
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    ctx: Arc<ExecContext>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut inbox) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        let mut running = Running::default();
        while let Some(order) = inbox.recv().await {
            running.start(order, &ctx, &runtime_tx);
        }
        debug!("executor inbox closed");
    });

    tx
}

#[derive(Default)]
struct Running {
    locks: HashMap<TaskName, Arc<Mutex<()>>>,
    /// Watch and serve steps, by step id.
    services: HashMap<TaskName, JoinHandle<()>>,
}

impl Running {
    fn start(&mut self, order: ScheduledTask, ctx: &Arc<ExecContext>, runtime_tx: &mpsc::Sender<RuntimeEvent>) {
        let ctx = Arc::clone(ctx);
        let tx = runtime_tx.clone();

        if !order.long_lived {
            let lock = Arc::clone(self.locks.entry(order.task.clone()).or_default());
            tokio::spawn(async move {
                let _held = lock.lock().await;
                run_task(order, ctx, tx).await;
            });
            return;
        }

        if self.services.get(&order.name).is_some_and(|h| !h.is_finished()) {
            info!(step = %order.name, run = order.run_id, "already up");
            tokio::spawn(async move {
                let _ = tx.send(RuntimeEvent::TaskProgressed { task: order.name }).await;
            });
            return;
        }

        let step = order.name.clone();
        let handle = tokio::spawn(run_task(order, ctx, tx));
        self.services.insert(step, handle);
    }
}
