// src/serve/reload.rs

//! Reload broadcasting over server-sent events.

use std::convert::Infallible;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};
use notify::EventKind;
use tokio::sync::broadcast;
use tracing::{debug, info};

use super::proxy::ProxyState;
use crate::watch::path_utils::{canonical_root, relative_str};
use crate::watch::{compile_globset, watch_root, WatcherHandle};

/// Quiet period after a change before reloading, so a burst of writes
/// becomes one reload.
const SETTLE: Duration = Duration::from_millis(100);

/// Fan-out of reload notifications to every connected browser.
#[derive(Clone, Debug)]
pub struct Reloader {
    tx: broadcast::Sender<()>,
}

impl Default for Reloader {
    fn default() -> Self {
        Self::new()
    }
}

impl Reloader {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Tell every connected client to reload. Returns how many were told.
    pub fn reload(&self) -> usize {
        self.tx.send(()).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }
}

/// Stream of `reload` messages, one per broadcast.
pub fn reload_stream(rx: broadcast::Receiver<()>) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            // A lagging client still only needs one reload.
            Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                Some((Ok(Event::default().data("reload")), rx))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    })
}

pub async fn events(
    State(state): State<ProxyState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("reload client connected");
    Sse::new(reload_stream(state.reloader.subscribe())).keep_alive(KeepAlive::default())
}

/// Watch `pattern` below `root` and reload clients whenever a matching file
/// changes.
pub fn spawn_reload_watcher(root: &Path, pattern: &str, reloader: Reloader) -> Result<WatcherHandle> {
    let root = canonical_root(root);
    let matcher = compile_globset(&[pattern.to_string()])?;
    let (handle, mut events) = watch_root(&root)?;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if matches!(event.kind, EventKind::Access(_)) {
                continue;
            }
            let changed = event
                .paths
                .iter()
                .filter_map(|p| relative_str(&root, p))
                .find(|rel| matcher.is_match(rel));
            let Some(changed) = changed else {
                continue;
            };

            tokio::time::sleep(SETTLE).await;
            while events.try_recv().is_ok() {}

            let clients = reloader.reload();
            info!(path = %changed, clients, "reloading browsers");
        }
        debug!("reload watcher finished");
    });

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn every_subscriber_gets_a_reload() {
        let reloader = Reloader::new();
        let a = reload_stream(reloader.subscribe());
        let b = reload_stream(reloader.subscribe());
        tokio::pin!(a);
        tokio::pin!(b);

        assert_eq!(reloader.reload(), 2);
        assert!(a.next().await.is_some());
        assert!(b.next().await.is_some());
    }

    #[test]
    fn reload_without_clients_is_a_no_op() {
        assert_eq!(Reloader::new().reload(), 0);
    }

    #[tokio::test]
    async fn served_file_change_broadcasts_a_reload() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web/assets")).unwrap();
        let reloader = Reloader::new();
        let mut rx = reloader.subscribe();

        let _handle = spawn_reload_watcher(dir.path(), "web/**/*.*", reloader.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("web/assets/app.css"), "a{}").unwrap();

        let got = tokio::time::timeout(Duration::from_secs(5), rx.recv()).await;
        assert!(matches!(got, Ok(Ok(()))));
    }

    #[tokio::test]
    async fn changes_outside_the_pattern_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("web")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let reloader = Reloader::new();
        let mut rx = reloader.subscribe();

        let _handle = spawn_reload_watcher(dir.path(), "web/**/*.*", reloader.clone()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        std::fs::write(dir.path().join("src/main.scss"), "a{}").unwrap();

        let got = tokio::time::timeout(Duration::from_millis(500), rx.recv()).await;
        assert!(got.is_err());
    }

    #[tokio::test]
    async fn stream_ends_when_the_reloader_is_dropped() {
        let reloader = Reloader::new();
        let stream = reload_stream(reloader.subscribe());
        drop(reloader);
        tokio::pin!(stream);
        assert!(stream.next().await.is_none());
    }
}
