// src/errors.rs

use thiserror::Error;

use crate::paths::{PathCategory, PathContext};
use crate::pipeline::TransformError;

/// Errors raised before any task runs (config, path table, registry) plus
/// the pipeline failure wrapper.
#[derive(Error, Debug)]
pub enum AssetdagError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("[paths.{context}].{category} is not set")]
    MissingPath {
        context: PathContext,
        category: PathCategory,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("no task named `{0}`")]
    UnknownTask(String),

    #[error("task `{0}` is registered twice")]
    DuplicateTask(String),

    #[error("task compositions form a cycle: {0}")]
    CompositionCycle(String),

    #[error("cannot parse config file: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Transform(#[from] TransformError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AssetdagError>;
