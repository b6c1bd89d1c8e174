// src/pipeline/mod.rs

//! Transform pipelines: source → ordered stages → sink.
//!
//! - [`source`] expands glob patterns into [`Asset`]s.
//! - [`stage`] defines the [`Stage`] trait and the error guard.
//! - [`sourcemap`] tracks line-level source maps across stages.
//!
//! Concrete transforms live in `crate::stages`.

pub mod source;
pub mod sourcemap;
pub mod stage;

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info};

use crate::fs::FileSystem;

pub use source::SourceSet;
pub use sourcemap::{SourceMap, SourceMapInit, SourceMapWrite};
pub use stage::{ErrorGuard, FileStage, PerFile, Stage, StageContext, TransformError};

/// A file travelling through a pipeline.
///
/// `base` is the static directory prefix of the glob that matched the file;
/// the part of `path` below `base` is preserved when writing to a
/// destination.
#[derive(Debug, Clone)]
pub struct Asset {
    pub base: PathBuf,
    pub path: PathBuf,
    /// `None` for path-only reads.
    pub contents: Option<Vec<u8>>,
    pub source_map: Option<SourceMap>,
}

impl Asset {
    pub fn new(base: impl Into<PathBuf>, path: impl Into<PathBuf>, contents: Option<Vec<u8>>) -> Self {
        Self {
            base: base.into(),
            path: path.into(),
            contents,
            source_map: None,
        }
    }

    /// Path below `base`.
    pub fn relative(&self) -> &Path {
        self.path.strip_prefix(&self.base).unwrap_or(&self.path)
    }

    /// [`Asset::relative`] with forward slashes.
    pub fn relative_str(&self) -> String {
        self.relative().to_string_lossy().replace('\\', "/")
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_stem(&self) -> String {
        self.path
            .file_stem()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn extension(&self) -> String {
        self.path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    }

    pub fn set_extension(&mut self, ext: &str) {
        self.path.set_extension(ext);
    }

    pub fn set_file_name(&mut self, name: &str) {
        self.path.set_file_name(name);
    }

    /// Contents as UTF-8 text.
    pub fn text(&self, stage: &'static str) -> Result<&str, TransformError> {
        let bytes = self
            .contents
            .as_deref()
            .ok_or_else(|| TransformError::for_file(stage, &self.path, "file has no contents"))?;
        std::str::from_utf8(bytes)
            .map_err(|e| TransformError::for_file(stage, &self.path, format!("invalid UTF-8: {e}")))
    }

    /// Replace the contents with new text, keeping any source map aligned.
    pub fn set_text(&mut self, text: String) {
        if let Some(map) = self.source_map.as_mut() {
            map.realign(sourcemap::line_count(&text));
        }
        self.contents = Some(text.into_bytes());
    }
}

/// Where a pipeline's output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sink {
    /// Write assets below this directory (relative to the project root).
    Write(String),
    /// Delete every matched path.
    Delete,
}

/// Summary of a finished pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub written: Vec<PathBuf>,
    pub deleted: Vec<PathBuf>,
    /// Errors swallowed after an error guard.
    pub reported_errors: usize,
}

/// An ordered list of stages between a source and a sink.
pub struct Pipeline {
    pub source: SourceSet,
    pub stages: Vec<Box<dyn Stage>>,
    pub sink: Sink,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("source", &self.source.globs)
            .field("stages", &self.stage_names())
            .field("sink", &self.sink)
            .finish()
    }
}

impl Pipeline {
    pub fn from_source(source: SourceSet) -> PipelineBuilder {
        PipelineBuilder {
            source,
            stages: Vec::new(),
        }
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage in declared order, then the sink.
    pub fn run(&self, fs: &dyn FileSystem, root: &Path) -> Result<PipelineReport, TransformError> {
        let mut report = PipelineReport::default();
        let mut assets = self.source.collect(fs, root)?;
        let mut ctx = StageContext::new(fs, root);

        for stage in &self.stages {
            if stage.is_error_guard() {
                ctx.report_errors = true;
            }
            debug!(stage = stage.name(), assets = assets.len(), "applying stage");
            assets = match stage.apply(assets, &ctx) {
                Ok(next) => next,
                Err(err) if ctx.report_errors => {
                    error!(stage = stage.name(), error = %err, "stage failed; output not written");
                    report.reported_errors = ctx.reported.get() + 1;
                    return Ok(report);
                }
                Err(err) => return Err(err),
            };
        }
        report.reported_errors = ctx.reported.get();

        match &self.sink {
            Sink::Write(dir) => {
                let dest = root.join(dir.trim_end_matches('/'));
                for asset in &assets {
                    let Some(contents) = &asset.contents else {
                        continue;
                    };
                    let target = dest.join(asset.relative());
                    fs.write(&target, contents).map_err(|e| {
                        TransformError::for_file("dest", &target, format!("{e:#}"))
                    })?;
                    report.written.push(target);
                }
                info!(dest = %dest.display(), files = report.written.len(), "wrote pipeline output");
            }
            Sink::Delete => {
                for asset in &assets {
                    fs.remove(&asset.path).map_err(|e| {
                        TransformError::for_file("clean", &asset.path, format!("{e:#}"))
                    })?;
                    report.deleted.push(asset.path.clone());
                }
                info!(removed = report.deleted.len(), "cleaned paths");
            }
        }

        Ok(report)
    }
}

/// Fluent construction of a [`Pipeline`].
pub struct PipelineBuilder {
    source: SourceSet,
    stages: Vec<Box<dyn Stage>>,
}

impl PipelineBuilder {
    pub fn pipe<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn pipe_each<T: FileStage + 'static>(self, stage: T) -> Self {
        self.pipe(PerFile(stage))
    }

    pub fn write_to(self, dir: impl Into<String>) -> Pipeline {
        Pipeline {
            source: self.source,
            stages: self.stages,
            sink: Sink::Write(dir.into()),
        }
    }

    pub fn delete(self) -> Pipeline {
        Pipeline {
            source: self.source,
            stages: self.stages,
            sink: Sink::Delete,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    struct Upper;

    impl FileStage for Upper {
        fn name(&self) -> &'static str {
            "upper"
        }

        fn transform(&self, mut asset: Asset) -> Result<Option<Asset>, TransformError> {
            if asset.file_name().starts_with("bad") {
                return Err(TransformError::for_file("upper", &asset.path, "boom"));
            }
            let text = asset.text("upper")?.to_uppercase();
            asset.set_text(text);
            Ok(Some(asset))
        }
    }

    fn fixture() -> MockFileSystem {
        let fs = MockFileSystem::new();
        fs.add_file("./src/a.txt", "a");
        fs.add_file("./src/bad.txt", "b");
        fs
    }

    #[test]
    fn unguarded_pipeline_fails_on_first_error() {
        let fs = fixture();
        let pipeline = Pipeline::from_source(SourceSet::new(["src/*.txt"]))
            .pipe_each(Upper)
            .write_to("out");
        let err = pipeline.run(&fs, Path::new(".")).unwrap_err();
        assert_eq!(err.stage, "upper");
        assert!(!fs.exists(Path::new("./out/a.txt")));
    }

    #[test]
    fn guarded_pipeline_reports_and_keeps_going() {
        let fs = fixture();
        let pipeline = Pipeline::from_source(SourceSet::new(["src/*.txt"]))
            .pipe(ErrorGuard)
            .pipe_each(Upper)
            .write_to("out");
        let report = pipeline.run(&fs, Path::new(".")).unwrap();
        assert_eq!(report.written, vec![PathBuf::from("./out/a.txt")]);
        assert_eq!(report.reported_errors, 1);
        assert_eq!(fs.read_to_string(Path::new("./out/a.txt")).unwrap(), "A");
    }

    #[test]
    fn delete_sink_removes_matched_paths() {
        let fs = fixture();
        let pipeline = Pipeline::from_source(SourceSet::new(["src/"]).paths_only()).delete();
        let report = pipeline.run(&fs, Path::new(".")).unwrap();
        assert_eq!(report.deleted, vec![PathBuf::from("./src")]);
        assert!(fs.files().is_empty());
    }
}
