// src/watch/watcher.rs

use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::RuntimeEvent;
use crate::watch::event_handler::process_event;
use crate::watch::path_utils::canonical_root;
use crate::watch::patterns::WatchProfile;

/// Keeps the notify watcher alive; watching stops when this is dropped.
pub struct WatcherHandle {
    _watcher: RecommendedWatcher,
}

impl fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("WatcherHandle")
    }
}

/// Recursive watch of `dir`; notify's callback thread feeds the returned
/// channel.
pub fn watch_root(dir: &Path) -> Result<(WatcherHandle, mpsc::UnboundedReceiver<Event>)> {
    let (tx, rx) = mpsc::unbounded_channel();

    let callback = move |res: notify::Result<Event>| match res {
        Ok(event) => {
            let _ = tx.send(event);
        }
        Err(err) => warn!(error = %err, "watch backend error"),
    };
    let mut watcher =
        RecommendedWatcher::new(callback, Config::default()).context("cannot create file watcher")?;
    watcher
        .watch(dir, RecursiveMode::Recursive)
        .with_context(|| format!("cannot watch {}", dir.display()))?;

    Ok((WatcherHandle { _watcher: watcher }, rx))
}

/// Watch the project root and turn matching changes into isolated
/// `TaskTriggered` events. The task stops when the runtime channel closes.
pub fn spawn_watcher(
    root: &Path,
    profiles: Vec<WatchProfile>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = canonical_root(root);
    let (handle, mut changes) = watch_root(&root)?;

    for profile in &profiles {
        info!(pattern = profile.pattern(), step = profile.step(), "watching");
    }

    tokio::spawn(async move {
        while let Some(event) = changes.recv().await {
            if !process_event(&root, &event, &profiles, &runtime_tx).await {
                debug!("runtime gone; file watcher exiting");
                break;
            }
        }
    });

    Ok(handle)
}
