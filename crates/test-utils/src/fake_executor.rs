use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use assetdag::dag::{ScheduledTask, Scheduler};
use assetdag::engine::{
    CoreRuntime, RunReport, Runtime, RuntimeEvent, RuntimeOptions, TaskOutcome, TriggerReason,
    TriggerWhileRunningBehaviour,
};
use assetdag::errors::Result;
use assetdag::exec::ExecutorBackend;
use assetdag::tasks::ExecPlan;

/// A fake executor that:
/// - records which steps were "run", in dispatch order
/// - reports `TaskProgressed` for long-lived steps, optionally followed by
///   a successful `TaskCompleted` as if the step stopped cleanly
/// - reports `TaskCompleted` for everything else, failing the steps whose
///   task is in `failing`.
pub struct FakeExecutor {
    runtime_tx: mpsc::Sender<RuntimeEvent>,
    executed: Arc<Mutex<Vec<String>>>,
    failing: BTreeSet<String>,
    stop_long_lived: bool,
}

impl FakeExecutor {
    pub fn new(
        runtime_tx: mpsc::Sender<RuntimeEvent>,
        executed: Arc<Mutex<Vec<String>>>,
    ) -> Self {
        Self {
            runtime_tx,
            executed,
            failing: BTreeSet::new(),
            stop_long_lived: false,
        }
    }

    pub fn stopping_long_lived(mut self) -> Self {
        self.stop_long_lived = true;
        self
    }

    pub fn failing<I, S>(mut self, tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.failing.extend(tasks.into_iter().map(Into::into));
        self
    }
}

impl ExecutorBackend for FakeExecutor {
    fn spawn_ready_tasks(
        &mut self,
        tasks: Vec<ScheduledTask>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let tx = self.runtime_tx.clone();
        let executed = Arc::clone(&self.executed);
        let failing = self.failing.clone();
        let stop_long_lived = self.stop_long_lived;

        Box::pin(async move {
            for t in tasks {
                executed.lock().unwrap().push(t.name.clone());

                if t.long_lived {
                    tx.send(RuntimeEvent::TaskProgressed { task: t.name.clone() })
                        .await
                        .map_err(anyhow::Error::from)?;
                    if !stop_long_lived {
                        continue;
                    }
                }

                let outcome = if failing.contains(&t.task) {
                    TaskOutcome::Failed
                } else {
                    TaskOutcome::Success
                };
                tx.send(RuntimeEvent::TaskCompleted {
                    task: t.name.clone(),
                    outcome,
                })
                .await
                .map_err(anyhow::Error::from)?;
            }
            Ok(())
        })
    }
}

/// Result of [`run_plan`].
#[derive(Debug)]
pub struct FakeRun {
    pub report: RunReport,
    /// Step ids in dispatch order.
    pub executed: Vec<String>,
}

/// Run `plan` to completion on the real runtime with a [`FakeExecutor`].
///
/// Long-lived steps stop right after reporting progress, so plans that
/// contain them still finish.
pub async fn run_plan(plan: &ExecPlan, failing: &[&str]) -> FakeRun {
    let (tx, rx) = mpsc::channel(64);
    let executed = Arc::new(Mutex::new(Vec::new()));
    let executor = FakeExecutor::new(tx.clone(), Arc::clone(&executed))
        .failing(failing.iter().copied())
        .stopping_long_lived();

    for task in plan.roots() {
        tx.send(RuntimeEvent::TaskTriggered {
            task,
            reason: TriggerReason::Manual,
        })
        .await
        .unwrap();
    }

    let core = CoreRuntime::new(
        Scheduler::from_plan(plan),
        TriggerWhileRunningBehaviour::Queue,
        1,
        RuntimeOptions::default(),
    );
    let report = Runtime::new(core, rx, executor).run().await.unwrap();
    let executed = executed.lock().unwrap().clone();
    FakeRun { report, executed }
}
