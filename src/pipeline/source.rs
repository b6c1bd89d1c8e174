// src/pipeline/source.rs

//! Reading pipeline inputs from glob patterns.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::fs::FileSystem;
use crate::pipeline::Asset;
use crate::pipeline::stage::TransformError;

const STAGE: &str = "src";

/// Ordered set of glob patterns, relative to the project root.
#[derive(Debug, Clone)]
pub struct SourceSet {
    pub globs: Vec<String>,
    /// Load file contents (`false` yields path-only assets).
    pub read: bool,
    /// Accept literal paths that do not exist.
    pub allow_empty: bool,
}

impl SourceSet {
    pub fn new<I, S>(globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            globs: globs.into_iter().map(Into::into).collect(),
            read: true,
            allow_empty: false,
        }
    }

    pub fn paths_only(mut self) -> Self {
        self.read = false;
        self
    }

    pub fn allow_empty(mut self) -> Self {
        self.allow_empty = true;
        self
    }

    /// Expand every pattern in order. A path matched by several patterns is
    /// kept at its first position.
    pub fn collect(&self, fs: &dyn FileSystem, root: &Path) -> Result<Vec<Asset>, TransformError> {
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut assets = Vec::new();

        for pattern in &self.globs {
            let pattern = normalize_pattern(pattern);
            let matched = if has_glob_meta(&pattern) {
                expand_glob(fs, root, &pattern)?
            } else {
                expand_literal(fs, root, &pattern, self.allow_empty)?
            };
            debug!(pattern = %pattern, matched = matched.len(), "expanded source pattern");

            for (base, path) in matched {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let contents = if self.read && fs.is_file(&path) {
                    let bytes = fs
                        .read(&path)
                        .map_err(|e| TransformError::for_file(STAGE, &path, format!("{e:#}")))?;
                    Some(bytes)
                } else {
                    None
                };
                assets.push(Asset::new(base, path, contents));
            }
        }

        Ok(assets)
    }
}

fn normalize_pattern(pattern: &str) -> String {
    let trimmed = pattern.trim();
    let trimmed = trimmed.strip_prefix("./").unwrap_or(trimmed);
    trimmed.replace('\\', "/")
}

fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Leading path segments that contain no glob syntax.
pub fn glob_base(pattern: &str) -> String {
    let mut base = Vec::new();
    for segment in pattern.split('/') {
        if has_glob_meta(segment) {
            break;
        }
        base.push(segment);
    }
    // The last literal segment of a pattern without meta is the file itself.
    if !has_glob_meta(pattern) {
        base.pop();
    }
    base.join("/")
}

fn expand_literal(
    fs: &dyn FileSystem,
    root: &Path,
    pattern: &str,
    allow_empty: bool,
) -> Result<Vec<(PathBuf, PathBuf)>, TransformError> {
    let trimmed = pattern.trim_end_matches('/');
    let path = root.join(trimmed);
    if fs.exists(&path) {
        let base = root.join(glob_base(trimmed));
        Ok(vec![(base, path)])
    } else if allow_empty {
        Ok(Vec::new())
    } else {
        Err(TransformError::for_file(STAGE, path, "file not found"))
    }
}

fn expand_glob(
    fs: &dyn FileSystem,
    root: &Path,
    pattern: &str,
) -> Result<Vec<(PathBuf, PathBuf)>, TransformError> {
    let matcher = compile_matcher(pattern)?;
    let base_rel = glob_base(pattern);
    let base = root.join(&base_rel);

    if !fs.is_dir(&base) {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut stack = vec![base.clone()];

    while let Some(dir) = stack.pop() {
        let entries = fs
            .read_dir(&dir)
            .map_err(|e| TransformError::for_file(STAGE, &dir, format!("{e:#}")))?;
        for path in entries {
            if fs.is_dir(&path) {
                stack.push(path);
            } else if fs.is_file(&path) {
                if let Ok(rel) = path.strip_prefix(root) {
                    let rel_str = rel.to_string_lossy().replace('\\', "/");
                    let rel_str = rel_str.strip_prefix("./").unwrap_or(&rel_str);
                    if matcher.is_match(rel_str) {
                        files.push(path);
                    }
                }
            }
        }
    }

    files.sort();
    Ok(files.into_iter().map(|p| (base.clone(), p)).collect())
}

/// `*` stays within one path segment, as in shell globs.
pub fn compile_matcher(pattern: &str) -> Result<GlobMatcher, TransformError> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| TransformError::new(STAGE, format!("invalid glob pattern '{pattern}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn glob_base_stops_at_first_wildcard_segment() {
        assert_eq!(glob_base("scss/**/*.scss"), "scss");
        assert_eq!(glob_base("web/assets/css/*.css"), "web/assets/css");
        assert_eq!(glob_base("templates/css/css.html.twig"), "templates/css");
        assert_eq!(glob_base("*.js"), "");
    }

    #[test]
    fn single_star_does_not_cross_directories() {
        let fs = MockFileSystem::new();
        fs.add_file("./js/app.js", "app");
        fs.add_file("./js/lib/jquery.js", "lib");

        let set = SourceSet::new(["js/*.js"]);
        let assets = set.collect(&fs, Path::new(".")).unwrap();
        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].relative_str(), "app.js");
    }

    #[test]
    fn pattern_order_is_kept_and_duplicates_dropped() {
        let fs = MockFileSystem::new();
        fs.add_file("./js/app.js", "app");
        fs.add_file("./js/lib/jquery.js", "lib");

        let set = SourceSet::new(["js/lib/*.js", "js/**/*.js"]);
        let assets = set.collect(&fs, Path::new(".")).unwrap();
        let names: Vec<_> = assets.iter().map(|a| a.file_name()).collect();
        assert_eq!(names, vec!["jquery.js", "app.js"]);
    }

    #[test]
    fn missing_literal_fails_unless_allowed() {
        let fs = MockFileSystem::new();
        let strict = SourceSet::new(["web/assets/css/"]);
        assert!(strict.collect(&fs, Path::new(".")).is_err());

        let lenient = SourceSet::new(["web/assets/css/"]).paths_only().allow_empty();
        assert!(lenient.collect(&fs, Path::new(".")).unwrap().is_empty());
    }
}
