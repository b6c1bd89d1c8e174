// src/watch/mod.rs

//! Filesystem watching.
//!
//! The watch task compiles its `(pattern, step)` bindings into
//! [`WatchProfile`]s; every change that matches a profile becomes an
//! isolated `FileWatch` trigger for that step. Nothing here knows about the
//! plan graph. The dev server reuses [`watch_root`] for browser reloads.

pub mod event_handler;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use patterns::{build_watch_profiles, compile_globset, WatchProfile};
pub use watcher::{spawn_watcher, watch_root, WatcherHandle};
