// src/stages/script.rs

//! Script stages: concatenation, transpiling and minification.

use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::Once;

use tracing::{debug, warn};

use crate::pipeline::{Asset, FileStage, SourceMap, Stage, StageContext, TransformError};

mod minify;

pub use minify::minify_js;

/// Join all assets into one file, in stream order, separated by newlines.
#[derive(Debug, Clone)]
pub struct Concat {
    pub file_name: String,
}

impl Concat {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }
}

impl Stage for Concat {
    fn name(&self) -> &'static str {
        "concat"
    }

    fn apply(&self, assets: Vec<Asset>, _ctx: &StageContext<'_>) -> Result<Vec<Asset>, TransformError> {
        let Some(first) = assets.first() else {
            return Ok(Vec::new());
        };
        let base = first.base.clone();

        let mut texts = Vec::with_capacity(assets.len());
        for asset in &assets {
            texts.push(asset.text(self.name())?);
        }
        let joined = texts.join("\n");

        let mut out = Asset::new(base.clone(), base.join(&self.file_name), None);
        if assets.iter().any(|a| a.source_map.is_some()) {
            let parts: Vec<_> = assets
                .iter()
                .zip(&texts)
                .map(|(a, text)| (a.source_map.as_ref(), crate::pipeline::sourcemap::line_count(text)))
                .collect();
            out.source_map = Some(SourceMap::concat(&parts));
        }
        debug!(files = assets.len(), output = %self.file_name, "concatenated scripts");
        out.contents = Some(joined.into_bytes());
        Ok(vec![out])
    }
}

static NO_TRANSPILER: Once = Once::new();

/// Lower modern syntax by piping each file through an external command.
///
/// The command reads the source on stdin and writes the result to stdout.
/// Without `[script].transpile_cmd` nothing is lowered: files pass through
/// unchanged, like babel with no preset, and a warning is logged once. The
/// stock `build` and `build-js` tasks therefore only concatenate and minify
/// until a command is configured.
#[derive(Debug, Clone, Default)]
pub struct Transpile {
    pub command: Option<String>,
}

impl Transpile {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    fn run_command(&self, cmd_line: &str, asset: &Asset, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let fail = |msg: String| TransformError::for_file(self.name(), &asset.path, msg);

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(cmd_line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd_line);
            c
        };
        cmd.env("ASSETDAG_FILE", &asset.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd
            .spawn()
            .map_err(|e| fail(format!("spawning '{cmd_line}': {e}")))?;

        // Feed stdin from a separate thread so a chatty child cannot
        // deadlock on a full stdout pipe.
        let writer = child.stdin.take().map(|mut stdin| {
            let input = input.to_vec();
            std::thread::spawn(move || stdin.write_all(&input))
        });

        let output = child
            .wait_with_output()
            .map_err(|e| fail(format!("waiting for '{cmd_line}': {e}")))?;

        if let Some(handle) = writer {
            match handle.join() {
                Ok(Err(e)) if e.kind() != std::io::ErrorKind::BrokenPipe => {
                    return Err(fail(format!("writing to '{cmd_line}': {e}")));
                }
                _ => {}
            }
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(fail(format!(
                "'{cmd_line}' exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(output.stdout)
    }
}

impl FileStage for Transpile {
    fn name(&self) -> &'static str {
        "transpile"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        let Some(cmd_line) = self.command.as_deref() else {
            NO_TRANSPILER.call_once(|| {
                warn!("no [script].transpile_cmd configured; scripts are passed through unchanged");
            });
            return Ok(Some(asset));
        };

        let input = asset.text(self.name())?.as_bytes().to_vec();
        let stdout = self.run_command(cmd_line, &asset, &input)?;
        let text = String::from_utf8(stdout).map_err(|e| {
            TransformError::for_file(self.name(), &asset.path, format!("transpiler output is not UTF-8: {e}"))
        })?;
        asset.set_text(text);
        Ok(Some(asset))
    }
}

/// Remove comments and redundant whitespace from scripts.
#[derive(Debug, Default)]
pub struct MinifyJs;

impl FileStage for MinifyJs {
    fn name(&self) -> &'static str {
        "minify-js"
    }

    fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
        let minified = minify_js(asset.text(self.name())?);
        asset.set_text(minified);
        Ok(Some(asset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::pipeline::SourceMapInit;
    use std::path::Path;

    fn js(name: &str, text: &str) -> Asset {
        Asset::new("./js", format!("./js/{name}"), Some(text.as_bytes().to_vec()))
    }

    fn ctx(fs: &MockFileSystem) -> StageContext<'_> {
        StageContext::new(fs, Path::new("."))
    }

    #[test]
    fn concat_joins_in_order_with_newlines() {
        let fs = MockFileSystem::new();
        let out = Concat::new("script.js")
            .apply(vec![js("lib.js", "var a = 1;"), js("app.js", "a++;")], &ctx(&fs))
            .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].path, Path::new("./js/script.js"));
        assert_eq!(out[0].text("test").unwrap(), "var a = 1;\na++;");
    }

    #[test]
    fn concat_of_nothing_is_nothing() {
        let fs = MockFileSystem::new();
        assert!(Concat::new("script.js").apply(Vec::new(), &ctx(&fs)).unwrap().is_empty());
    }

    #[test]
    fn concat_merges_source_maps() {
        let fs = MockFileSystem::new();
        let inputs = SourceMapInit
            .apply(vec![js("a.js", "a1\na2"), js("b.js", "b1")], &ctx(&fs))
            .unwrap();
        let out = Concat::new("script.js").apply(inputs, &ctx(&fs)).unwrap();
        let map = out[0].source_map.as_ref().unwrap();
        assert_eq!(map.sources, vec!["a.js", "b.js"]);
        assert_eq!(map.lines, vec![Some((0, 0)), Some((0, 1)), Some((1, 0))]);
    }

    #[test]
    fn transpile_without_command_passes_through() {
        let out = Transpile::default().transform(js("a.js", "let x = 1;")).unwrap().unwrap();
        assert_eq!(out.text("test").unwrap(), "let x = 1;");
    }

    #[cfg(unix)]
    #[test]
    fn transpile_pipes_through_the_command() {
        let stage = Transpile::new(Some("tr a-z A-Z".to_string()));
        let out = stage.transform(js("a.js", "let x;")).unwrap().unwrap();
        assert_eq!(out.text("test").unwrap(), "LET X;");
    }

    #[cfg(unix)]
    #[test]
    fn failing_transpiler_reports_stderr() {
        let stage = Transpile::new(Some("echo 'unexpected token' >&2; exit 3".to_string()));
        let err = stage.transform(js("a.js", "let x;")).unwrap_err();
        assert!(err.message.contains("unexpected token"), "{}", err.message);
    }
}
