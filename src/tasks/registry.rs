// src/tasks/registry.rs

//! The task registry: every named task, built once at startup.

use std::collections::BTreeMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use tracing::debug;

use crate::config::model::{ConfigFile, TaskConfig};
use crate::errors::{AssetdagError, Result};
use crate::paths::PathCategory as Cat;
use crate::paths::PathContext::{Dev, Public, Watch};
use crate::pipeline::{ErrorGuard, Pipeline, SourceMapInit, SourceMapWrite, SourceSet};
use crate::stages::style::browser_targets;
use crate::stages::{
    Autoprefix, CompileScss, Concat, HashRename, Inject, MinifyCss, MinifyJs, SvgOptimize,
    SvgSprite, Transpile,
};
use crate::tasks::{Composition, Job, ServeSettings, TaskDescriptor, TaskKind, WatchBinding};

/// Names of the built-in tasks.
pub mod names {
    pub const DEFAULT: &str = "default";
    pub const BUILD: &str = "build";
    pub const SCSS: &str = "scss";
    pub const BUILD_SCSS: &str = "build-scss";
    pub const JS: &str = "js";
    pub const BUILD_JS: &str = "build-js";
    pub const CLEAN: &str = "clean";
    pub const SVG_SPRITE: &str = "svg-sprite";
    pub const WATCH: &str = "watch";
    pub const SERVE: &str = "serve";
    pub const INJECT_HEADER: &str = "inject-header";
    pub const INJECT_FOOTER: &str = "inject-footer";
}

use names::*;

/// Named task descriptors. Names are unique; lookups are by reference.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    tasks: BTreeMap<String, TaskDescriptor>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task. Registering a name twice is an error.
    pub fn register(&mut self, task: TaskDescriptor) -> Result<()> {
        if self.tasks.contains_key(&task.name) {
            return Err(AssetdagError::DuplicateTask(task.name));
        }
        debug!(task = %task.name, "registered task");
        self.tasks.insert(task.name.clone(), task);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&TaskDescriptor> {
        self.tasks
            .get(name)
            .ok_or_else(|| AssetdagError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Tasks in name order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskDescriptor> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// The built-in tasks plus any `[task.*]` compositions from the config.
    pub fn standard(cfg: &ConfigFile) -> Result<Self> {
        let mut reg = Self::new();
        for task in builtin_tasks(cfg)? {
            reg.register(task)?;
        }
        for (name, tc) in cfg.tasks() {
            reg.register(custom_task(name, tc)?)?;
        }
        reg.validate()?;
        Ok(reg)
    }

    /// Check that every referenced task exists and that compositions do not
    /// refer back to themselves.
    pub fn validate(&self) -> Result<()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

        for task in self.tasks.values() {
            graph.add_node(task.name.as_str());
            let refs = match &task.kind {
                TaskKind::Composite(c) => c.references(),
                TaskKind::Leaf(Job::Watch(bindings)) => {
                    bindings.iter().map(|b| b.task.as_str()).collect()
                }
                TaskKind::Leaf(_) => Vec::new(),
            };
            for r in refs {
                if !self.tasks.contains_key(r) {
                    return Err(AssetdagError::UnknownTask(format!(
                        "{r} (referenced by '{}')",
                        task.name
                    )));
                }
                // Watch bindings trigger tasks at runtime; they do not nest them.
                if matches!(task.kind, TaskKind::Composite(_)) {
                    graph.add_edge(task.name.as_str(), r, ());
                }
            }
        }

        match toposort(&graph, None) {
            Ok(_) => Ok(()),
            Err(cycle) => Err(AssetdagError::CompositionCycle(format!(
                "task '{}' is part of a cycle",
                cycle.node_id()
            ))),
        }
    }
}

fn custom_task(name: &str, tc: &TaskConfig) -> Result<TaskDescriptor> {
    let composition = match (&tc.series, &tc.parallel) {
        (Some(series), None) => Composition::series(series.iter().cloned()),
        (None, Some(parallel)) => Composition::parallel(parallel.iter().cloned()),
        _ => {
            return Err(AssetdagError::Config(format!(
                "[task.{name}] must set exactly one of `series` or `parallel`"
            )));
        }
    };
    Ok(TaskDescriptor::composite(name, tc.description.clone(), composition))
}

fn builtin_tasks(cfg: &ConfigFile) -> Result<Vec<TaskDescriptor>> {
    let paths = &cfg.paths;
    let targets = browser_targets(&cfg.autoprefixer.browsers)
        .map_err(|e| AssetdagError::Config(format!("[autoprefixer].browsers: {e}")))?;

    let scss = Pipeline::from_source(SourceSet::new([paths.get(Dev, Cat::Scss)?]))
        .pipe(ErrorGuard)
        .pipe(SourceMapInit)
        .pipe_each(CompileScss)
        .pipe_each(Autoprefix::new(targets))
        .pipe(SourceMapWrite)
        .write_to(paths.get(Public, Cat::Css)?);

    let build_scss = Pipeline::from_source(SourceSet::new([paths.get(Dev, Cat::Scss)?]))
        .pipe_each(CompileScss)
        .pipe_each(MinifyCss)
        .pipe_each(Autoprefix::new(targets).minified())
        .pipe_each(HashRename)
        .write_to(paths.get(Public, Cat::Css)?);

    let script_sources = || -> Result<SourceSet> {
        Ok(SourceSet::new([paths.get(Dev, Cat::JsLib)?, paths.get(Dev, Cat::Js)?]))
    };

    let js = Pipeline::from_source(script_sources()?)
        .pipe(ErrorGuard)
        .pipe(SourceMapInit)
        .pipe(Concat::new(&cfg.script.dev_bundle))
        .pipe(SourceMapWrite)
        .write_to(paths.get(Public, Cat::Js)?);

    let build_js = Pipeline::from_source(script_sources()?)
        .pipe_each(Transpile::new(cfg.script.transpile_cmd.clone()))
        .pipe_each(MinifyJs)
        .pipe(Concat::new(&cfg.script.prod_bundle))
        .pipe_each(HashRename)
        .write_to(paths.get(Public, Cat::Js)?);

    let svg_sprite = Pipeline::from_source(SourceSet::new([paths.get(Dev, Cat::Svg)?]))
        .pipe(SvgSprite {
            id_pattern: cfg.sprite.id_pattern.clone(),
            symbols_file: cfg.sprite.symbols.clone(),
            preview_file: cfg.sprite.preview.clone(),
        })
        .pipe_each(SvgOptimize::default())
        .write_to(paths.get(Public, Cat::Svg)?);

    let clean = Pipeline::from_source(
        SourceSet::new([paths.get(Public, Cat::Css)?, paths.get(Public, Cat::Js)?])
            .paths_only()
            .allow_empty(),
    )
    .delete();

    let inject_header = Pipeline::from_source(SourceSet::new([paths.get(Dev, Cat::CssTemplate)?]))
        .pipe(Inject::new(SourceSet::new([paths.get(Public, Cat::CssBuild)?])))
        .write_to(paths.get(Dev, Cat::CssTemplateOut)?);

    let inject_footer = Pipeline::from_source(SourceSet::new([paths.get(Dev, Cat::JsTemplate)?]))
        .pipe(Inject::new(SourceSet::new([paths.get(Public, Cat::JsBuild)?])))
        .write_to(paths.get(Dev, Cat::JsTemplateOut)?);

    let watch = Job::Watch(vec![
        WatchBinding::new(paths.get(Watch, Cat::Scss)?, SCSS),
        WatchBinding::new(paths.get(Watch, Cat::Js)?, JS),
        WatchBinding::new(paths.get(Watch, Cat::Svg)?, SVG_SPRITE),
    ]);

    let serve = Job::Serve(ServeSettings {
        port: cfg.serve.port,
        proxy: cfg.serve.proxy.clone(),
        watch: cfg.serve.watch.clone(),
    });

    Ok(vec![
        TaskDescriptor::leaf(SCSS, "compile stylesheets with sourcemaps", Job::Pipeline(scss)),
        TaskDescriptor::leaf(BUILD_SCSS, "compile, minify and hash stylesheets", Job::Pipeline(build_scss)),
        TaskDescriptor::leaf(JS, "bundle scripts with sourcemaps", Job::Pipeline(js)),
        TaskDescriptor::leaf(BUILD_JS, "transpile, minify, bundle and hash scripts", Job::Pipeline(build_js)),
        TaskDescriptor::leaf(SVG_SPRITE, "build the SVG icon sprite", Job::Pipeline(svg_sprite)),
        TaskDescriptor::leaf(CLEAN, "remove built stylesheets and scripts", Job::Pipeline(clean)),
        TaskDescriptor::leaf(INJECT_HEADER, "inject stylesheet links into the header template", Job::Pipeline(inject_header)),
        TaskDescriptor::leaf(INJECT_FOOTER, "inject script tags into the footer template", Job::Pipeline(inject_footer)),
        TaskDescriptor::leaf(WATCH, "re-run tasks when sources change", watch),
        TaskDescriptor::leaf(SERVE, "live-reload proxy", serve),
        TaskDescriptor::composite(
            BUILD,
            Some("production build".to_string()),
            Composition::Series(vec![
                CLEAN.into(),
                Composition::parallel([BUILD_SCSS, BUILD_JS]),
                INJECT_HEADER.into(),
                INJECT_FOOTER.into(),
            ]),
        ),
        TaskDescriptor::composite(
            DEFAULT,
            Some("development build, then watch and serve".to_string()),
            Composition::Series(vec![
                CLEAN.into(),
                Composition::parallel([SCSS, JS]),
                INJECT_HEADER.into(),
                INJECT_FOOTER.into(),
                SVG_SPRITE.into(),
                Composition::parallel([WATCH, SERVE]),
            ]),
        ),
    ])
}
