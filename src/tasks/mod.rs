// src/tasks/mod.rs

//! Task model.
//!
//! - [`registry`] builds the named task table and validates references.
//! - [`plan`] expands a composite task into a DAG of leaf steps that the
//!   scheduler in [`crate::dag`] can run.

pub mod plan;
pub mod registry;

use std::fmt;

use crate::engine::TaskName;
use crate::pipeline::Pipeline;

pub use plan::{ExecPlan, PlanStep};
pub use registry::TaskRegistry;

/// A glob whose changes re-run one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchBinding {
    pub pattern: String,
    pub task: TaskName,
}

impl WatchBinding {
    pub fn new(pattern: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            task: task.into(),
        }
    }
}

/// Settings for the live-reload proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServeSettings {
    pub port: u16,
    pub proxy: String,
    /// Glob of served files whose changes reload connected browsers.
    pub watch: String,
}

/// The work behind a leaf task.
#[derive(Debug)]
pub enum Job {
    Pipeline(Pipeline),
    Watch(Vec<WatchBinding>),
    Serve(ServeSettings),
}

impl Job {
    /// Long-lived jobs keep running after they report progress.
    pub fn is_long_lived(&self) -> bool {
        matches!(self, Job::Watch(_) | Job::Serve(_))
    }
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Job::Pipeline(p) => {
                write!(f, "pipeline {:?} | {}", p.source.globs, p.stage_names().join(" | "))?;
                match &p.sink {
                    crate::pipeline::Sink::Write(dir) => write!(f, " -> {dir}"),
                    crate::pipeline::Sink::Delete => write!(f, " -> delete"),
                }
            }
            Job::Watch(bindings) => {
                write!(f, "watch")?;
                for b in bindings {
                    write!(f, " [{} -> {}]", b.pattern, b.task)?;
                }
                Ok(())
            }
            Job::Serve(s) => write!(f, "serve :{} -> {}", s.port, s.proxy),
        }
    }
}

/// A series/parallel arrangement of task references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Composition {
    Task(TaskName),
    Series(Vec<Composition>),
    Parallel(Vec<Composition>),
}

impl Composition {
    pub fn task(name: impl Into<String>) -> Self {
        Composition::Task(name.into())
    }

    pub fn series<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Composition>,
    {
        Composition::Series(names.into_iter().map(Into::into).collect())
    }

    pub fn parallel<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Composition>,
    {
        Composition::Parallel(names.into_iter().map(Into::into).collect())
    }

    /// Every task name referenced, in order of appearance.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Composition::Task(name) => out.push(name),
            Composition::Series(children) | Composition::Parallel(children) => {
                for child in children {
                    child.collect_references(out);
                }
            }
        }
    }
}

impl From<&str> for Composition {
    fn from(name: &str) -> Self {
        Composition::Task(name.to_string())
    }
}

impl From<String> for Composition {
    fn from(name: String) -> Self {
        Composition::Task(name)
    }
}

impl fmt::Display for Composition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (label, children) = match self {
            Composition::Task(name) => return f.write_str(name),
            Composition::Series(children) => ("series", children),
            Composition::Parallel(children) => ("parallel", children),
        };
        write!(f, "{label}(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{child}")?;
        }
        f.write_str(")")
    }
}

#[derive(Debug)]
pub enum TaskKind {
    Leaf(Job),
    Composite(Composition),
}

/// A named unit of work in the registry.
#[derive(Debug)]
pub struct TaskDescriptor {
    pub name: TaskName,
    pub kind: TaskKind,
    pub description: Option<String>,
}

impl TaskDescriptor {
    pub fn leaf(name: impl Into<String>, description: &str, job: Job) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Leaf(job),
            description: Some(description.to_string()),
        }
    }

    pub fn composite(name: impl Into<String>, description: Option<String>, composition: Composition) -> Self {
        Self {
            name: name.into(),
            kind: TaskKind::Composite(composition),
            description,
        }
    }

    pub fn job(&self) -> Option<&Job> {
        match &self.kind {
            TaskKind::Leaf(job) => Some(job),
            TaskKind::Composite(_) => None,
        }
    }

    pub fn is_long_lived(&self) -> bool {
        self.job().is_some_and(Job::is_long_lived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composition_displays_nested_structure() {
        let c = Composition::Series(vec![
            "clean".into(),
            Composition::parallel(["build-scss", "build-js"]),
            "inject-header".into(),
        ]);
        assert_eq!(c.to_string(), "series(clean, parallel(build-scss, build-js), inject-header)");
        assert_eq!(c.references(), vec!["clean", "build-scss", "build-js", "inject-header"]);
    }
}
