// src/pipeline/stage.rs

//! The stage abstraction every transform implements.

use std::cell::Cell;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::error;

use crate::fs::FileSystem;
use crate::pipeline::Asset;

/// Error raised by a single stage.
#[derive(Debug, Error)]
#[error("{stage}{}: {message}", display_file(.file))]
pub struct TransformError {
    pub stage: &'static str,
    pub file: Option<PathBuf>,
    pub message: String,
}

fn display_file(file: &Option<PathBuf>) -> String {
    match file {
        Some(f) => format!(" ({})", f.display()),
        None => String::new(),
    }
}

impl TransformError {
    pub fn new(stage: &'static str, message: impl fmt::Display) -> Self {
        Self {
            stage,
            file: None,
            message: message.to_string(),
        }
    }

    pub fn for_file(stage: &'static str, file: impl Into<PathBuf>, message: impl fmt::Display) -> Self {
        Self {
            stage,
            file: Some(file.into()),
            message: message.to_string(),
        }
    }
}

/// Per-run settings handed to every stage.
#[derive(Debug, Clone)]
pub struct StageContext<'a> {
    pub fs: &'a dyn FileSystem,
    /// Project root all patterns are relative to.
    pub root: &'a Path,
    /// Set once an error guard has been passed: per-file failures are
    /// reported and the file dropped instead of failing the pipeline.
    pub report_errors: bool,
    /// Per-file failures swallowed so far.
    pub reported: Cell<usize>,
}

impl<'a> StageContext<'a> {
    pub fn new(fs: &'a dyn FileSystem, root: &'a Path) -> Self {
        Self {
            fs,
            root,
            report_errors: false,
            reported: Cell::new(0),
        }
    }
}

/// One step of a pipeline, operating on the whole batch of assets.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this stage switches the rest of the pipeline to
    /// report-and-continue error handling.
    fn is_error_guard(&self) -> bool {
        false
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError>;
}

/// A transform applied to each asset independently.
pub trait FileStage: Send + Sync {
    fn name(&self) -> &'static str;

    /// Transform one asset. `Ok(None)` drops it from the stream.
    fn transform(&self, asset: Asset) -> Result<Option<Asset>, TransformError>;
}

/// Lifts a [`FileStage`] into a [`Stage`].
pub struct PerFile<T>(pub T);

impl<T: FileStage> Stage for PerFile<T> {
    fn name(&self) -> &'static str {
        self.0.name()
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let mut out = Vec::with_capacity(assets.len());
        for asset in assets {
            match self.0.transform(asset) {
                Ok(Some(a)) => out.push(a),
                Ok(None) => {}
                Err(err) if ctx.report_errors => {
                    error!(stage = self.0.name(), error = %err, "transform failed; skipping file");
                    ctx.reported.set(ctx.reported.get() + 1);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(out)
    }
}

/// Error guard: switches the following stages to report-and-continue.
#[derive(Debug, Default)]
pub struct ErrorGuard;

impl Stage for ErrorGuard {
    fn name(&self) -> &'static str {
        "error-guard"
    }

    fn is_error_guard(&self) -> bool {
        true
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        Ok(assets)
    }
}
