// src/stages/inject.rs

//! Reference injection into HTML/Twig templates.
//!
//! A template marks injection regions with
//!
//! ```text
//! <!-- inject:css -->
//! <!-- endinject -->
//! ```
//!
//! and every run replaces the region's body with one tag per matching
//! reference, so injecting twice with the same references is idempotent.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use tracing::debug;

use crate::pipeline::{Asset, SourceSet, Stage, StageContext, TransformError};

static REGION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--\s*inject:(\w+)\s*-->.*?<!--\s*endinject\s*-->").expect("valid regex")
});

/// Web path of a file: its root-relative path without the first segment
/// (`web/assets/css/a.css` → `assets/css/a.css`).
pub fn public_path(relative: &str) -> String {
    let relative = relative.trim_start_matches("./").trim_start_matches('/');
    match relative.split_once('/') {
        Some((_, rest)) => rest.to_string(),
        None => relative.to_string(),
    }
}

fn extension_of(path: &str) -> String {
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

/// Markup referencing `path`, or `None` for file types that have no tag.
pub fn tag_for(path: &str) -> Option<String> {
    match extension_of(path).as_str() {
        "css" => Some(format!(r#"<link rel="stylesheet" href="{path}" />"#)),
        "js" => Some(format!(r#"<script async src="{path}"></script>"#)),
        "png" | "jpg" | "jpeg" | "gif" | "svg" => Some(format!(r#"<img src="{path}">"#)),
        "html" => Some(format!(r#"<link rel="import" href="{path}">"#)),
        _ => None,
    }
}

/// Whitespace between the start of the line and `pos`, if that is all
/// there is.
fn indentation(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |i| i + 1);
    let prefix = &text[line_start..pos];
    if prefix.chars().all(|c| c == ' ' || c == '\t') {
        prefix
    } else {
        ""
    }
}

/// Rewrite every injection region of `template` with tags for the
/// references (public paths) whose extension matches the region.
pub fn inject_references(template: &str, references: &[String]) -> String {
    REGION
        .replace_all(template, |caps: &Captures<'_>| {
            let ext = caps[1].to_lowercase();
            let indent = caps.get(0).map_or("", |m| indentation(template, m.start()));
            let mut out = format!("<!-- inject:{ext} -->\n");
            for path in references.iter().filter(|p| extension_of(p) == ext) {
                if let Some(tag) = tag_for(path) {
                    out.push_str(indent);
                    out.push_str(&tag);
                    out.push('\n');
                }
            }
            out.push_str(indent);
            out.push_str("<!-- endinject -->");
            out
        })
        .into_owned()
}

/// Inject the files matched by `references` into every template asset.
#[derive(Debug, Clone)]
pub struct Inject {
    pub references: SourceSet,
}

impl Inject {
    pub fn new(references: SourceSet) -> Self {
        Self {
            references: references.paths_only(),
        }
    }
}

impl Stage for Inject {
    fn name(&self) -> &'static str {
        "inject"
    }

    fn apply(&self, assets: Vec<Asset>, ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let refs: Vec<String> = self
            .references
            .collect(ctx.fs, ctx.root)?
            .iter()
            .map(|r| {
                let rel = r.path.strip_prefix(ctx.root).unwrap_or(&r.path);
                public_path(&rel.to_string_lossy().replace('\\', "/"))
            })
            .collect();
        debug!(references = refs.len(), templates = assets.len(), "injecting references");

        assets
            .into_iter()
            .map(|mut asset| {
                let injected = inject_references(asset.text(self.name())?, &refs);
                asset.set_text(injected);
                Ok(asset)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::Path;

    #[test]
    fn public_path_drops_the_first_segment() {
        assert_eq!(public_path("web/assets/css/a.css"), "assets/css/a.css");
        assert_eq!(public_path("./web/assets/js/b.js"), "assets/js/b.js");
        assert_eq!(public_path("top.css"), "top.css");
    }

    #[test]
    fn tags_per_extension() {
        assert_eq!(
            tag_for("assets/css/a.css").unwrap(),
            r#"<link rel="stylesheet" href="assets/css/a.css" />"#
        );
        assert_eq!(
            tag_for("assets/js/b.js").unwrap(),
            r#"<script async src="assets/js/b.js"></script>"#
        );
        assert!(tag_for("assets/fonts/x.woff2").is_none());
    }

    #[test]
    fn region_is_replaced_and_indentation_kept() {
        let template = "<head>\n    <!-- inject:css -->\n    <link href=\"old.css\">\n    <!-- endinject -->\n</head>\n";
        let refs = vec!["assets/css/a.css".to_string(), "assets/js/x.js".to_string()];
        let out = inject_references(template, &refs);
        assert_eq!(
            out,
            "<head>\n    <!-- inject:css -->\n    <link rel=\"stylesheet\" href=\"assets/css/a.css\" />\n    <!-- endinject -->\n</head>\n"
        );
        assert_eq!(inject_references(&out, &refs), out);
    }

    #[test]
    fn no_matches_empties_the_region() {
        let template = "<!-- inject:js -->\n<script src=\"stale.js\"></script>\n<!-- endinject -->";
        assert_eq!(
            inject_references(template, &[]),
            "<!-- inject:js -->\n<!-- endinject -->"
        );
    }

    #[test]
    fn stage_resolves_references_against_the_root() {
        let fs = MockFileSystem::new();
        fs.add_file("./web/assets/css/style.abc123.css", "a{}");
        let ctx = StageContext::new(&fs, Path::new("."));
        let template = Asset::new(
            "./templates/css",
            "./templates/css/css.html.twig",
            Some(b"<!-- inject:css -->\n<!-- endinject -->".to_vec()),
        );
        let stage = Inject::new(SourceSet::new(["web/assets/css/*.css"]));
        let out = stage.apply(vec![template], &ctx).unwrap();
        assert_eq!(
            out[0].text("test").unwrap(),
            "<!-- inject:css -->\n<link rel=\"stylesheet\" href=\"assets/css/style.abc123.css\" />\n<!-- endinject -->"
        );
    }
}
