// src/exec/task_runner.rs

//! Individual step runner.

use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::dag::ScheduledTask;
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::exec::ExecContext;
use crate::pipeline::PipelineReport;
use crate::serve::Server;
use crate::tasks::{Job, ServeSettings, WatchBinding};
use crate::watch::{build_watch_profiles, spawn_watcher};

/// Run the job behind a scheduled step and report its outcome.
///
/// Pipelines send `TaskCompleted` when they finish. Long-lived jobs send
/// `TaskProgressed` once they are up and only complete if they stop, which
/// in practice means they failed.
pub async fn run_task(
    task: ScheduledTask,
    ctx: Arc<ExecContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) {
    let outcome = match run_task_inner(&task, &ctx, &runtime_tx).await {
        Ok(()) => TaskOutcome::Success,
        Err(err) => {
            error!(
                task = %task.name,
                run_id = task.run_id,
                error = %format!("{err:#}"),
                "step failed"
            );
            TaskOutcome::Failed
        }
    };

    if let Err(err) = runtime_tx
        .send(RuntimeEvent::TaskCompleted {
            task: task.name.clone(),
            outcome,
        })
        .await
    {
        warn!(task = %task.name, "failed to send TaskCompleted: {err}");
    }
}

async fn run_task_inner(
    task: &ScheduledTask,
    ctx: &Arc<ExecContext>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<()> {
    let descriptor = ctx.registry.get(&task.task)?;
    let job = descriptor
        .job()
        .ok_or_else(|| anyhow!("task '{}' is a composition, not a runnable step", task.task))?;

    info!(task = %task.name, run_id = task.run_id, job = %job, "starting step");

    match job {
        Job::Pipeline(_) => {
            let report = run_pipeline(task, ctx).await?;
            if report.reported_errors > 0 {
                warn!(
                    task = %task.name,
                    errors = report.reported_errors,
                    "pipeline reported errors; output is incomplete"
                );
            }
            info!(
                task = %task.name,
                written = report.written.len(),
                deleted = report.deleted.len(),
                "step finished"
            );
            Ok(())
        }
        Job::Watch(bindings) => run_watch(task, bindings, ctx, runtime_tx).await,
        Job::Serve(settings) => run_serve(task, settings, ctx, runtime_tx).await,
    }
}

/// Pipelines do blocking IO and CPU-heavy transforms; keep them off the
/// async workers.
async fn run_pipeline(task: &ScheduledTask, ctx: &Arc<ExecContext>) -> Result<PipelineReport> {
    let ctx = Arc::clone(ctx);
    let name = task.task.clone();

    tokio::task::spawn_blocking(move || -> Result<PipelineReport> {
        let descriptor = ctx.registry.get(&name)?;
        let Some(Job::Pipeline(pipeline)) = descriptor.job() else {
            bail!("task '{name}' is not a pipeline");
        };
        let report = pipeline.run(ctx.fs.as_ref(), &ctx.root)?;
        Ok(report)
    })
    .await
    .with_context(|| format!("pipeline worker for '{}' panicked", task.task))?
}

async fn run_watch(
    task: &ScheduledTask,
    bindings: &[WatchBinding],
    ctx: &Arc<ExecContext>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<()> {
    let targets: Vec<(String, String)> = bindings
        .iter()
        .map(|b| (b.pattern.clone(), ctx.step_for(&b.task)))
        .collect();
    let profiles = build_watch_profiles(&targets)?;
    let _handle = spawn_watcher(&ctx.root, profiles, runtime_tx.clone())
        .with_context(|| format!("starting file watcher for '{}'", task.name))?;

    report_progress(task, runtime_tx).await?;

    // The watcher lives as long as its handle.
    std::future::pending::<()>().await;
    Ok(())
}

async fn run_serve(
    task: &ScheduledTask,
    settings: &ServeSettings,
    ctx: &Arc<ExecContext>,
    runtime_tx: &mpsc::Sender<RuntimeEvent>,
) -> Result<()> {
    let server = Server::bind(settings, &ctx.root).await?;
    report_progress(task, runtime_tx).await?;
    server.run().await
}

async fn report_progress(task: &ScheduledTask, runtime_tx: &mpsc::Sender<RuntimeEvent>) -> Result<()> {
    runtime_tx
        .send(RuntimeEvent::TaskProgressed {
            task: task.name.clone(),
        })
        .await
        .with_context(|| format!("sending TaskProgressed for '{}'", task.name))
}
