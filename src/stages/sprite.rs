// src/stages/sprite.rs

//! SVG icon sprites.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::pipeline::{Asset, FileStage, Stage, StageContext, TransformError};

static SVG_ROOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<svg\b([^>]*)>(.*)</svg>").expect("valid regex"));
static VIEW_BOX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bviewBox\s*=\s*["']([^"']*)["']"#).expect("valid regex"));
static WIDTH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bwidth\s*=\s*["']([0-9.]+)"#).expect("valid regex"));
static HEIGHT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\bheight\s*=\s*["']([0-9.]+)"#).expect("valid regex"));
static XML_DECL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<\?xml.*?\?>").expect("valid regex"));
static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<!DOCTYPE[^>]*>").expect("valid regex"));
static COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static METADATA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<metadata\b.*?</metadata>").expect("valid regex"));
static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title\b[^>]*>.*?</title>").expect("valid regex"));
static BETWEEN_TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("valid regex"));

/// One icon extracted from its source file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub id: String,
    pub view_box: Option<String>,
    pub body: String,
}

/// Expand an id pattern: `%f` is the file name without extension.
pub fn symbol_id(pattern: &str, stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect();
    pattern.replace("%f", &cleaned)
}

/// Pull the root element's viewBox and inner markup out of an SVG document.
pub fn extract_symbol(id: String, svg: &str) -> Option<Symbol> {
    let caps = SVG_ROOT.captures(svg)?;
    let attrs = caps.get(1).map_or("", |m| m.as_str());
    let body = caps.get(2).map_or("", |m| m.as_str()).trim().to_string();

    let view_box = VIEW_BOX
        .captures(attrs)
        .map(|c| c[1].to_string())
        .or_else(|| {
            let w = WIDTH.captures(attrs)?;
            let h = HEIGHT.captures(attrs)?;
            Some(format!("0 0 {} {}", &w[1], &h[1]))
        });

    Some(Symbol { id, view_box, body })
}

pub fn render_symbols(symbols: &[Symbol]) -> String {
    let mut out = String::from(
        r#"<svg xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    );
    for symbol in symbols {
        out.push_str("\n<symbol id=\"");
        out.push_str(&symbol.id);
        out.push('"');
        if let Some(vb) = &symbol.view_box {
            out.push_str(" viewBox=\"");
            out.push_str(vb);
            out.push('"');
        }
        out.push('>');
        out.push_str(&symbol.body);
        out.push_str("</symbol>");
    }
    out.push_str("\n</svg>\n");
    out
}

/// Standalone page showing every icon of the sprite with its id.
pub fn render_preview(symbols: &[Symbol], sprite: &str) -> String {
    let mut out = String::from(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Sprite preview</title>\n<style>\n\
         body { font-family: sans-serif; }\n\
         .icons { display: flex; flex-wrap: wrap; list-style: none; padding: 0; }\n\
         .icons li { width: 120px; margin: 8px; text-align: center; }\n\
         .icons svg { width: 48px; height: 48px; }\n\
         </style>\n</head>\n<body>\n<div style=\"display:none\">\n",
    );
    out.push_str(sprite);
    out.push_str("</div>\n<ul class=\"icons\">\n");
    for symbol in symbols {
        out.push_str(&format!(
            "<li><svg><use xlink:href=\"#{id}\"></use></svg><div>{id}</div></li>\n",
            id = symbol.id
        ));
    }
    out.push_str("</ul>\n</body>\n</html>\n");
    out
}

/// Collect every SVG into a symbol sprite plus a preview page.
#[derive(Debug, Clone)]
pub struct SvgSprite {
    pub id_pattern: String,
    pub symbols_file: String,
    pub preview_file: String,
}

impl Stage for SvgSprite {
    fn name(&self) -> &'static str {
        "svg-sprite"
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let Some(first) = assets.first() else {
            return Ok(Vec::new());
        };
        let base = first.base.clone();

        let mut symbols = Vec::with_capacity(assets.len());
        for asset in &assets {
            let id = symbol_id(&self.id_pattern, &asset.file_stem());
            let symbol = extract_symbol(id, asset.text(self.name())?).ok_or_else(|| {
                TransformError::for_file(self.name(), &asset.path, "no <svg> root element")
            })?;
            symbols.push(symbol);
        }
        debug!(icons = symbols.len(), "built svg sprite");

        let sprite = render_symbols(&symbols);
        let preview = render_preview(&symbols, &sprite);
        Ok(vec![
            Asset::new(base.clone(), base.join(&self.symbols_file), Some(sprite.into_bytes())),
            Asset::new(base.clone(), base.join(&self.preview_file), Some(preview.into_bytes())),
        ])
    }
}

/// Strip editor cruft from SVG files. `viewBox` and ids are always kept.
#[derive(Debug, Clone, Copy)]
pub struct SvgOptimize {
    pub remove_title: bool,
}

impl Default for SvgOptimize {
    fn default() -> Self {
        Self { remove_title: true }
    }
}

pub fn optimize_svg(svg: &str, remove_title: bool) -> String {
    let svg = XML_DECL.replace_all(svg, "");
    let svg = DOCTYPE.replace_all(&svg, "");
    let svg = COMMENT.replace_all(&svg, "");
    let svg = METADATA.replace_all(&svg, "");
    let svg = if remove_title {
        TITLE.replace_all(&svg, "").into_owned()
    } else {
        svg.into_owned()
    };
    BETWEEN_TAGS.replace_all(&svg, "><").trim().to_string()
}

impl FileStage for SvgOptimize {
    fn name(&self) -> &'static str {
        "svg-optimize"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        if asset.extension() != "svg" {
            return Ok(Some(asset));
        }
        let optimized = optimize_svg(asset.text(self.name())?, self.remove_title);
        asset.set_text(optimized);
        Ok(Some(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use std::path::Path;

    const ARROW: &str = r#"<?xml version="1.0"?>
<!-- Generator: Sketch -->
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24">
  <title>arrow</title>
  <path id="shaft" d="M0 12h20"/>
</svg>"#;

    fn svg(name: &str, text: &str) -> Asset {
        Asset::new("./images/icons/svg", format!("./images/icons/svg/{name}"), Some(text.into()))
    }

    #[test]
    fn ids_follow_the_pattern() {
        assert_eq!(symbol_id("icon-%f", "arrow-left"), "icon-arrow-left");
        assert_eq!(symbol_id("icon-%f", "my icon"), "icon-my-icon");
    }

    #[test]
    fn view_box_falls_back_to_dimensions() {
        let s = extract_symbol("i".into(), r#"<svg width="16" height="8"><g/></svg>"#).unwrap();
        assert_eq!(s.view_box.as_deref(), Some("0 0 16 8"));
        assert_eq!(s.body, "<g/>");
    }

    #[test]
    fn sprite_holds_one_symbol_per_icon() {
        let fs = MockFileSystem::new();
        let ctx = StageContext::new(&fs, Path::new("."));
        let stage = SvgSprite {
            id_pattern: "icon-%f".into(),
            symbols_file: "symbols.svg".into(),
            preview_file: "sprite-preview.html".into(),
        };
        let out = stage
            .apply(vec![svg("arrow.svg", ARROW), svg("dot.svg", "<svg viewBox=\"0 0 2 2\"><circle r=\"1\"/></svg>")], &ctx)
            .unwrap();
        let names: Vec<_> = out.iter().map(|a| a.file_name()).collect();
        assert_eq!(names, vec!["symbols.svg", "sprite-preview.html"]);

        let sprite = out[0].text("test").unwrap();
        assert!(sprite.contains(r#"<symbol id="icon-arrow" viewBox="0 0 24 24">"#));
        assert!(sprite.contains(r#"<symbol id="icon-dot" viewBox="0 0 2 2"><circle r="1"/></symbol>"#));
        assert!(out[1].text("test").unwrap().contains("#icon-dot"));
    }

    #[test]
    fn non_svg_input_is_an_error() {
        let fs = MockFileSystem::new();
        let ctx = StageContext::new(&fs, Path::new("."));
        let stage = SvgSprite {
            id_pattern: "icon-%f".into(),
            symbols_file: "symbols.svg".into(),
            preview_file: "sprite-preview.html".into(),
        };
        assert!(stage.apply(vec![svg("bad.svg", "not svg")], &ctx).is_err());
    }

    #[test]
    fn optimize_keeps_view_box_and_ids() {
        let out = optimize_svg(ARROW, true);
        assert_eq!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 24 24"><path id="shaft" d="M0 12h20"/></svg>"#
        );
    }

    #[test]
    fn optimize_leaves_html_alone() {
        let a = Asset::new(".", "./sprite-preview.html", Some(b"<p>  </p>".to_vec()));
        let out = SvgOptimize::default().transform(a).unwrap().unwrap();
        assert_eq!(out.text("test").unwrap(), "<p>  </p>");
    }
}
