// src/stages/style.rs

//! Stylesheet stages: SCSS compilation, minification and vendor prefixing.

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use tracing::debug;

use crate::pipeline::{Asset, FileStage, TransformError};

/// Resolve browserslist queries into prefixing targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, String> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| e.to_string())?;
    if browsers.is_none() {
        return Err(format!("browser queries {queries:?} matched no browsers"));
    }
    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Compile `.scss` files to CSS. Partials (`_name.scss`) are only ever
/// imported and produce no output of their own.
#[derive(Debug, Default)]
pub struct CompileScss;

impl FileStage for CompileScss {
    fn name(&self) -> &'static str {
        "scss"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        if asset.file_name().starts_with('_') {
            return Ok(None);
        }
        let source = asset.text(self.name())?.to_string();
        let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
        if let Some(dir) = asset.path.parent() {
            options = options.load_path(dir);
        }
        let css = grass::from_string(source, &options)
            .map_err(|e| TransformError::for_file(self.name(), &asset.path, e))?;
        debug!(file = %asset.path.display(), "compiled scss");
        asset.set_extension("css");
        asset.set_text(css);
        Ok(Some(asset))
    }
}

/// Parse, optionally optimise, and print a stylesheet.
fn process_css(
    filename: String,
    code: &str,
    targets: Targets,
    minify: bool,
) -> Result<String, String> {
    let mut sheet = StyleSheet::parse(
        code,
        ParserOptions {
            filename,
            ..ParserOptions::default()
        },
    )
    .map_err(|e| e.to_string())?;

    sheet
        .minify(MinifyOptions {
            targets,
            ..MinifyOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify,
            targets,
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;
    Ok(printed.code)
}

/// Structural minification without prefixing. Rules are merged only where
/// that cannot change the cascade.
#[derive(Debug, Default)]
pub struct MinifyCss;

impl FileStage for MinifyCss {
    fn name(&self) -> &'static str {
        "minify-css"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        let code = asset.text(self.name())?;
        let css = process_css(asset.relative_str(), code, Targets::default(), true)
            .map_err(|e| TransformError::for_file(self.name(), &asset.path, e))?;
        asset.set_text(css);
        Ok(Some(asset))
    }
}

/// Add vendor prefixes for the configured browsers. Prefixed declarations
/// are never visually aligned, so `cascade = false` always holds.
#[derive(Debug, Clone, Copy)]
pub struct Autoprefix {
    pub targets: Targets,
    /// Print compact output (used by the production build).
    pub minify: bool,
}

impl Autoprefix {
    pub fn new(targets: Targets) -> Self {
        Self {
            targets,
            minify: false,
        }
    }

    pub fn minified(mut self) -> Self {
        self.minify = true;
        self
    }
}

impl FileStage for Autoprefix {
    fn name(&self) -> &'static str {
        "autoprefix"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        let code = asset.text(self.name())?;
        let css = process_css(asset.relative_str(), code, self.targets, self.minify)
            .map_err(|e| TransformError::for_file(self.name(), &asset.path, e))?;
        asset.set_text(css);
        Ok(Some(asset))
    }
}
