// src/paths.rs

//! Static path table: `(context, category) -> glob pattern`.
//!
//! The table is built once from the `[paths.*]` config sections layered over
//! the built-in defaults and never mutated afterwards. Lookups are pure; an
//! unresolved entry is an error, never an empty pattern.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::errors::{AssetdagError, Result};

/// Which side of the build a path belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathContext {
    /// Production output locations (under the public web root).
    Public,
    /// Development source locations and templates.
    Dev,
    /// Patterns observed by the watch loop.
    Watch,
}

impl PathContext {
    pub const ALL: [PathContext; 3] = [PathContext::Public, PathContext::Dev, PathContext::Watch];

    pub fn as_str(&self) -> &'static str {
        match self {
            PathContext::Public => "public",
            PathContext::Dev => "dev",
            PathContext::Watch => "watch",
        }
    }
}

impl fmt::Display for PathContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logical asset category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PathCategory {
    CssBuild,
    JsBuild,
    Css,
    Js,
    JsLib,
    Scss,
    Svg,
    CssTemplate,
    JsTemplate,
    CssTemplateOut,
    JsTemplateOut,
}

impl PathCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PathCategory::CssBuild => "css_build",
            PathCategory::JsBuild => "js_build",
            PathCategory::Css => "css",
            PathCategory::Js => "js",
            PathCategory::JsLib => "js_lib",
            PathCategory::Scss => "scss",
            PathCategory::Svg => "svg",
            PathCategory::CssTemplate => "css_template",
            PathCategory::JsTemplate => "js_template",
            PathCategory::CssTemplateOut => "css_template_out",
            PathCategory::JsTemplateOut => "js_template_out",
        }
    }
}

impl fmt::Display for PathCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PathCategory {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim() {
            "css_build" => Ok(PathCategory::CssBuild),
            "js_build" => Ok(PathCategory::JsBuild),
            "css" => Ok(PathCategory::Css),
            "js" => Ok(PathCategory::Js),
            "js_lib" => Ok(PathCategory::JsLib),
            "scss" => Ok(PathCategory::Scss),
            "svg" => Ok(PathCategory::Svg),
            "css_template" => Ok(PathCategory::CssTemplate),
            "js_template" => Ok(PathCategory::JsTemplate),
            "css_template_out" => Ok(PathCategory::CssTemplateOut),
            "js_template_out" => Ok(PathCategory::JsTemplateOut),
            other => Err(format!("unknown path category '{other}'")),
        }
    }
}

/// Built-in defaults. Every entry here is also a required entry.
const DEFAULTS: &[(PathContext, PathCategory, &str)] = &[
    (PathContext::Public, PathCategory::CssBuild, "web/assets/css/*.css"),
    (PathContext::Public, PathCategory::JsBuild, "web/assets/js/*.js"),
    (PathContext::Public, PathCategory::Css, "web/assets/css/"),
    (PathContext::Public, PathCategory::Js, "web/assets/js/"),
    (PathContext::Public, PathCategory::Svg, "web/assets/img/icons/svg/"),
    (PathContext::Dev, PathCategory::CssTemplate, "templates/css/css.html.twig"),
    (PathContext::Dev, PathCategory::JsTemplate, "templates/js/js.html.twig"),
    (PathContext::Dev, PathCategory::CssTemplateOut, "templates/css"),
    (PathContext::Dev, PathCategory::JsTemplateOut, "templates/js"),
    (PathContext::Dev, PathCategory::Scss, "scss/*.scss"),
    (PathContext::Dev, PathCategory::Js, "js/*.js"),
    (PathContext::Dev, PathCategory::JsLib, "js/lib/*.js"),
    (PathContext::Dev, PathCategory::Svg, "images/icons/svg/*.svg"),
    (PathContext::Watch, PathCategory::Scss, "scss/**/*.scss"),
    (PathContext::Watch, PathCategory::Js, "js/**/*.js"),
    (PathContext::Watch, PathCategory::Svg, "images/icons/svg/*.svg"),
];

/// Immutable `(context, category) -> pattern` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathTable {
    entries: BTreeMap<(PathContext, PathCategory), String>,
}

impl PathTable {
    /// Table containing only the built-in defaults.
    pub fn defaults() -> Self {
        let entries = DEFAULTS
            .iter()
            .map(|(ctx, cat, pat)| ((*ctx, *cat), pat.to_string()))
            .collect();
        Self { entries }
    }

    /// Layer per-context overrides (as read from `[paths.<context>]`) over
    /// the defaults and check that every required entry resolves to a
    /// non-empty pattern.
    pub fn from_overrides(
        overrides: &BTreeMap<PathContext, BTreeMap<String, String>>,
    ) -> Result<Self> {
        let mut table = Self::defaults();

        for (ctx, section) in overrides {
            for (key, pattern) in section {
                let category = key.parse::<PathCategory>().map_err(|e| {
                    AssetdagError::Config(format!("[paths.{ctx}]: {e}"))
                })?;
                table.entries.insert((*ctx, category), pattern.trim().to_string());
            }
        }

        table.ensure_required()?;
        Ok(table)
    }

    fn ensure_required(&self) -> Result<()> {
        for (ctx, cat, _) in DEFAULTS {
            self.get(*ctx, *cat)?;
        }
        Ok(())
    }

    /// Look up a pattern. Missing or empty entries are errors.
    pub fn get(&self, context: PathContext, category: PathCategory) -> Result<&str> {
        match self.entries.get(&(context, category)) {
            Some(p) if !p.is_empty() => Ok(p.as_str()),
            _ => Err(AssetdagError::MissingPath { context, category }),
        }
    }

    /// All entries, ordered by context then category.
    pub fn iter(&self) -> impl Iterator<Item = (PathContext, PathCategory, &str)> {
        self.entries
            .iter()
            .map(|((ctx, cat), p)| (*ctx, *cat, p.as_str()))
    }
}

impl Default for PathTable {
    fn default() -> Self {
        Self::defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overrides(ctx: PathContext, key: &str, value: &str) -> BTreeMap<PathContext, BTreeMap<String, String>> {
        let mut section = BTreeMap::new();
        section.insert(key.to_string(), value.to_string());
        let mut all = BTreeMap::new();
        all.insert(ctx, section);
        all
    }

    #[test]
    fn defaults_resolve_public_outputs() {
        let table = PathTable::defaults();
        assert_eq!(
            table.get(PathContext::Public, PathCategory::Css).unwrap(),
            "web/assets/css/"
        );
        assert_eq!(
            table.get(PathContext::Watch, PathCategory::Scss).unwrap(),
            "scss/**/*.scss"
        );
    }

    #[test]
    fn unresolved_pair_is_missing_path() {
        let table = PathTable::defaults();
        let err = table.get(PathContext::Watch, PathCategory::CssBuild).unwrap_err();
        assert!(matches!(
            err,
            AssetdagError::MissingPath {
                context: PathContext::Watch,
                category: PathCategory::CssBuild
            }
        ));
    }

    #[test]
    fn override_replaces_default() {
        let table =
            PathTable::from_overrides(&overrides(PathContext::Dev, "scss", "styles/*.scss")).unwrap();
        assert_eq!(
            table.get(PathContext::Dev, PathCategory::Scss).unwrap(),
            "styles/*.scss"
        );
    }

    #[test]
    fn empty_required_override_fails_fast() {
        let err = PathTable::from_overrides(&overrides(PathContext::Public, "css", "  ")).unwrap_err();
        assert!(matches!(err, AssetdagError::MissingPath { .. }));
    }

    #[test]
    fn unknown_category_is_config_error() {
        let err = PathTable::from_overrides(&overrides(PathContext::Dev, "less", "x")).unwrap_err();
        match err {
            AssetdagError::Config(msg) => assert!(msg.contains("less")),
            other => panic!("expected Config, got {other:?}"),
        }
    }
}
