// src/watch/path_utils.rs

//! Utility functions for path handling in the watcher.

use std::path::{Path, PathBuf};

/// Canonical form of the project root, or the path as given when it
/// cannot be resolved.
pub fn canonical_root(root: &Path) -> PathBuf {
    root.canonicalize().unwrap_or_else(|_| root.to_path_buf())
}

/// Convert an event path into a string relative to `root`, with forward
/// slashes.
///
/// `root` is expected to be canonical. Event paths usually already start
/// with it; when they don't (symlinked temp dirs on macOS, for example) the
/// event path is canonicalized and tried again. Paths of deleted files
/// cannot be canonicalized, so for those only the parent is resolved.
///
/// Returns `None` if the path lies outside `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    if let Ok(rel) = path.strip_prefix(root) {
        return Some(to_slash(rel));
    }

    let resolved = match path.canonicalize() {
        Ok(p) => p,
        Err(_) => {
            let parent = path.parent()?.canonicalize().ok()?;
            parent.join(path.file_name()?)
        }
    };
    resolved.strip_prefix(root).ok().map(to_slash)
}

fn to_slash(rel: &Path) -> String {
    rel.to_string_lossy().replace('\\', "/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_root_and_normalises_separators() {
        let root = Path::new("/project");
        assert_eq!(
            relative_str(root, Path::new("/project/scss/main.scss")).as_deref(),
            Some("scss/main.scss")
        );
    }

    #[test]
    fn paths_outside_root_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        assert_eq!(relative_str(&root, Path::new("/definitely/elsewhere.txt")), None);
    }
}
