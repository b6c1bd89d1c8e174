// src/config/validate.rs

use std::collections::BTreeMap;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{AssetdagError, Result};
use crate::paths::{PathContext, PathTable};
use crate::stages::style::browser_targets;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::AssetdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        let paths = resolve_paths(&raw)?;
        Ok(ConfigFile::new_unchecked(raw, paths))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_global_config(cfg)?;
    validate_autoprefixer(cfg)?;
    validate_script(cfg)?;
    validate_serve(cfg)?;
    validate_task_sections(cfg)?;
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.queue_length == 0 {
        return Err(AssetdagError::Config(
            "[config].queue_length must be >= 1 (got 0)".to_string(),
        ));
    }
    Ok(())
}

fn validate_autoprefixer(cfg: &RawConfigFile) -> Result<()> {
    if cfg.autoprefixer.cascade {
        return Err(AssetdagError::Config(
            "[autoprefixer].cascade = true is not supported".to_string(),
        ));
    }
    if cfg.autoprefixer.browsers.is_empty() {
        return Err(AssetdagError::Config(
            "[autoprefixer].browsers must contain at least one query".to_string(),
        ));
    }
    browser_targets(&cfg.autoprefixer.browsers)
        .map_err(|e| AssetdagError::Config(format!("[autoprefixer].browsers: {e}")))?;
    Ok(())
}

fn validate_script(cfg: &RawConfigFile) -> Result<()> {
    for (key, value) in [
        ("dev_bundle", &cfg.script.dev_bundle),
        ("prod_bundle", &cfg.script.prod_bundle),
    ] {
        if value.trim().is_empty() || value.contains('/') {
            return Err(AssetdagError::Config(format!(
                "[script].{key} must be a plain file name (got '{value}')"
            )));
        }
    }
    Ok(())
}

fn validate_serve(cfg: &RawConfigFile) -> Result<()> {
    reqwest::Url::parse(&cfg.serve.proxy).map_err(|e| {
        AssetdagError::Config(format!(
            "[serve].proxy is not a valid URL ('{}'): {e}",
            cfg.serve.proxy
        ))
    })?;
    if cfg.serve.port == 0 {
        return Err(AssetdagError::Config(
            "[serve].port must be non-zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_sections(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        let children = match (&task.series, &task.parallel) {
            (Some(list), None) | (None, Some(list)) => list,
            (Some(_), Some(_)) => {
                return Err(AssetdagError::Config(format!(
                    "task '{name}' must set exactly one of `series` / `parallel`"
                )));
            }
            (None, None) => {
                return Err(AssetdagError::Config(format!(
                    "task '{name}' must set `series` or `parallel`"
                )));
            }
        };
        if children.is_empty() {
            return Err(AssetdagError::Config(format!(
                "task '{name}' has an empty composition"
            )));
        }
        if children.iter().any(|c| c == name) {
            return Err(AssetdagError::Config(format!(
                "task '{name}' cannot reference itself"
            )));
        }
    }
    Ok(())
}

fn resolve_paths(cfg: &RawConfigFile) -> Result<PathTable> {
    let mut overrides = BTreeMap::new();
    overrides.insert(PathContext::Public, cfg.paths.public.clone());
    overrides.insert(PathContext::Dev, cfg.paths.dev.clone());
    overrides.insert(PathContext::Watch, cfg.paths.watch.clone());
    PathTable::from_overrides(&overrides)
}
