// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::engine::TaskName;

/// Compiled glob for a single watch binding.
///
/// Patterns are relative to the project root; the watcher passes relative
/// paths (e.g. `"scss/main.scss"`) into `matches`.
#[derive(Clone)]
pub struct WatchProfile {
    pattern: String,
    /// Step to trigger on a match.
    step: TaskName,
    set: GlobSet,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("pattern", &self.pattern)
            .field("step", &self.step)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn step(&self) -> &str {
        &self.step
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, rel_path: &str) -> bool {
        self.set.is_match(rel_path)
    }
}

/// Compile `(pattern, step)` pairs into profiles.
pub fn build_watch_profiles(bindings: &[(String, TaskName)]) -> Result<Vec<WatchProfile>> {
    bindings
        .iter()
        .map(|(pattern, step)| {
            let set = compile_globset(std::slice::from_ref(pattern))
                .with_context(|| format!("building watch globset for step {step}"))?;
            Ok(WatchProfile {
                pattern: pattern.clone(),
                step: step.clone(),
                set,
            })
        })
        .collect()
}

/// Build a GlobSet where `*` stays within one path segment.
pub fn compile_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let pat = pat.trim().trim_start_matches("./");
        let glob = GlobBuilder::new(pat)
            .literal_separator(true)
            .build()
            .with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
