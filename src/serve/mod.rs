// src/serve/mod.rs

//! Live-reload development server.
//!
//! Every request is forwarded to the upstream application ([`proxy`]); HTML
//! responses get a small client snippet that listens for reload events on
//! [`RELOAD_PATH`] ([`reload`]). A file watcher over the served output
//! broadcasts a reload whenever something changes there.

pub mod proxy;
pub mod reload;

use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use axum::Router;
use axum::routing::get;
use tokio::net::TcpListener;
use tracing::info;

use crate::tasks::ServeSettings;
use crate::watch::WatcherHandle;

pub use proxy::{inject_reload_snippet, ProxyState};
pub use reload::Reloader;

/// Server-sent events endpoint the injected client connects to.
pub const RELOAD_PATH: &str = "/__assetdag/reload";

pub fn router(state: ProxyState) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(reload::events))
        .fallback(proxy::forward)
        .with_state(state)
}

/// A bound, not yet serving, proxy server.
pub struct Server {
    listener: TcpListener,
    app: Router,
    _watcher: WatcherHandle,
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("addr", &self.listener.local_addr().ok())
            .finish_non_exhaustive()
    }
}

impl Server {
    /// Bind the listener and start the reload watcher.
    pub async fn bind(settings: &ServeSettings, root: &Path) -> Result<Self> {
        let reloader = Reloader::new();
        let watcher = reload::spawn_reload_watcher(root, &settings.watch, reloader.clone())?;
        let state = ProxyState::new(&settings.proxy, reloader)?;

        let addr = SocketAddr::from(([0, 0, 0, 0], settings.port));
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("binding serve port {}", settings.port))?;

        info!(
            addr = %listener.local_addr()?,
            upstream = %settings.proxy,
            watch = %settings.watch,
            "serving with live reload"
        );

        Ok(Self {
            listener,
            app: router(state),
            _watcher: watcher,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        let Server {
            listener,
            app,
            _watcher,
        } = self;
        axum::serve(listener, app.into_make_service())
            .await
            .context("serve loop stopped")
    }
}
