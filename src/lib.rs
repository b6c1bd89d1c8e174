// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod paths;
pub mod pipeline;
pub mod serve;
pub mod stages;
pub mod tasks;
pub mod types;
pub mod watch;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_or_default;
use crate::dag::Scheduler;
use crate::engine::{CoreRuntime, Runtime, RuntimeEvent, RuntimeOptions, TaskName, TriggerReason};
use crate::exec::{ExecContext, RealExecutorBackend};
use crate::fs::RealFileSystem;
use crate::tasks::{ExecPlan, Job, TaskKind, TaskRegistry};

/// High-level entry point used by `main.rs`. Returns the process exit code.
///
/// This wires together:
/// - config loading and the task registry
/// - plan expansion for the requested task
/// - scheduler / queue / runtime
/// - executor (pipelines, watch, serve)
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<i32> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_or_default(&config_path)?;
    let registry = TaskRegistry::standard(&cfg)?;

    if args.list {
        print_task_list(&registry);
        return Ok(0);
    }

    let (plan, step_ids) = build_plan(&registry, &args.task)?;

    if args.dry_run {
        print_dry_run(&plan, &registry);
        return Ok(0);
    }

    let root = project_root(&config_path);
    info!(task = %args.task, root = %root.display(), steps = plan.steps.len(), "starting");

    let scheduler = Scheduler::from_plan(&plan);

    // Queue behaviour from [config].
    let behaviour = cfg.config.triggered_while_running_behaviour;
    let queue_length = cfg.config.queue_length;

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<RuntimeEvent>(64);

    let ctx = ExecContext {
        registry: Arc::new(registry),
        fs: Arc::new(RealFileSystem),
        root,
        step_ids,
    };
    let executor = RealExecutorBackend::new(rt_tx.clone(), ctx);

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested).await;
        });
    }

    // Seed initial triggers from the plan roots.
    let roots = plan.roots();
    info!(?roots, "initial plan roots to trigger at startup");

    for task in roots {
        rt_tx
            .send(RuntimeEvent::TaskTriggered {
                task,
                reason: TriggerReason::Manual,
            })
            .await?;
    }

    let core = CoreRuntime::new(scheduler, behaviour, queue_length, RuntimeOptions::default());
    let runtime = Runtime::new(core, rt_rx, executor);
    let report = runtime.run().await?;

    if !report.is_success() {
        let failed: Vec<_> = report.failed.iter().collect();
        tracing::error!(?failed, "task failed");
    }
    Ok(report.exit_code())
}

/// Expand `task` and give every watch target a step, so file changes can
/// trigger tasks the composition itself did not include.
///
/// Returns the plan and the step id for each watch target.
pub fn build_plan(registry: &TaskRegistry, task: &str) -> errors::Result<(ExecPlan, HashMap<TaskName, TaskName>)> {
    let mut plan = ExecPlan::expand(registry, task)?;

    let targets: Vec<String> = plan
        .steps
        .iter()
        .filter_map(|step| match registry.get(&step.task).map(|d| d.job()) {
            Ok(Some(Job::Watch(bindings))) => Some(bindings.iter().map(|b| b.task.clone())),
            _ => None,
        })
        .flatten()
        .collect();

    let mut step_ids = HashMap::new();
    for target in targets {
        let id = plan.ensure_step(registry, &target)?;
        step_ids.insert(target, id);
    }
    Ok((plan, step_ids))
}

/// The directory of the config file when it exists, else the current
/// working directory.
fn project_root(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if config_path.exists() && !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn print_task_list(registry: &TaskRegistry) {
    println!("tasks ({}):", registry.len());
    for task in registry.iter() {
        let shape = match &task.kind {
            TaskKind::Leaf(job) if job.is_long_lived() => "long-lived".to_string(),
            TaskKind::Leaf(_) => "pipeline".to_string(),
            TaskKind::Composite(c) => c.to_string(),
        };
        match &task.description {
            Some(desc) if !desc.is_empty() => println!("  {:<14} {desc} [{shape}]", task.name),
            _ => println!("  {:<14} [{shape}]", task.name),
        }
    }
}

/// Simple dry-run output: print every step, its predecessors and its job.
fn print_dry_run(plan: &ExecPlan, registry: &TaskRegistry) {
    println!("assetdag dry-run: {}", plan.target);
    println!();

    println!("steps ({}):", plan.steps.len());
    for step in &plan.steps {
        println!("  - {}", step.id);
        if !step.after.is_empty() {
            println!("      after: {:?}", step.after);
        }
        if let Ok(Some(job)) = registry.get(&step.task).map(|d| d.job()) {
            println!("      job: {job}");
        }
        if step.long_lived {
            println!("      long_lived: true");
        }
        if step.on_demand {
            println!("      on_demand: true");
        }
    }

    debug!("dry-run complete (no execution)");
}
