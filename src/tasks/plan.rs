// src/tasks/plan.rs

//! Expansion of a task into a DAG of leaf steps.
//!
//! Series children are chained: each child's entry steps wait on the exits
//! of the previous child. Parallel children all start from the same
//! predecessors, and the next element waits for every one of them.

use std::collections::HashMap;

use crate::errors::Result;
use crate::tasks::{Composition, TaskKind, TaskRegistry};

/// One leaf task occurrence in a plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    /// Unique step id: the task name, or `name#n` for the n-th occurrence.
    pub id: String,
    pub task: String,
    /// Steps that must succeed before this one runs.
    pub after: Vec<String>,
    pub long_lived: bool,
    /// Not started with the plan; only runs when triggered (watch targets
    /// outside the expanded composition).
    pub on_demand: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ExecPlan {
    pub target: String,
    pub steps: Vec<PlanStep>,
    occurrences: HashMap<String, usize>,
}

impl ExecPlan {
    /// Expand `target` against the registry.
    pub fn expand(registry: &TaskRegistry, target: &str) -> Result<Self> {
        let mut plan = ExecPlan {
            target: target.to_string(),
            ..ExecPlan::default()
        };
        plan.expand_task(registry, target, Vec::new())?;
        Ok(plan)
    }

    /// A plan made of already expanded steps.
    pub fn from_steps(target: impl Into<String>, steps: Vec<PlanStep>) -> Self {
        let mut occurrences = HashMap::new();
        for step in &steps {
            *occurrences.entry(step.task.clone()).or_insert(0) += 1;
        }
        Self {
            target: target.into(),
            steps,
            occurrences,
        }
    }

    fn next_id(&mut self, task: &str) -> String {
        let n = self.occurrences.entry(task.to_string()).or_insert(0);
        *n += 1;
        if *n == 1 {
            task.to_string()
        } else {
            format!("{task}#{n}")
        }
    }

    /// Returns the exit steps of the expanded task.
    fn expand_task(&mut self, registry: &TaskRegistry, name: &str, preds: Vec<String>) -> Result<Vec<String>> {
        let task = registry.get(name)?;
        match &task.kind {
            TaskKind::Leaf(job) => {
                let id = self.next_id(name);
                self.steps.push(PlanStep {
                    id: id.clone(),
                    task: name.to_string(),
                    after: preds,
                    long_lived: job.is_long_lived(),
                    on_demand: false,
                });
                Ok(vec![id])
            }
            TaskKind::Composite(c) => self.expand_composition(registry, c, preds),
        }
    }

    fn expand_composition(
        &mut self,
        registry: &TaskRegistry,
        composition: &Composition,
        preds: Vec<String>,
    ) -> Result<Vec<String>> {
        match composition {
            Composition::Task(name) => self.expand_task(registry, name, preds),
            Composition::Series(children) => {
                let mut current = preds;
                for child in children {
                    current = self.expand_composition(registry, child, current)?;
                }
                Ok(current)
            }
            Composition::Parallel(children) => {
                if children.is_empty() {
                    return Ok(preds);
                }
                let mut exits = Vec::new();
                for child in children {
                    exits.extend(self.expand_composition(registry, child, preds.clone())?);
                }
                Ok(exits)
            }
        }
    }

    /// Make sure `task` has a step, adding an on-demand one if the
    /// composition did not include it. Returns the step id.
    pub fn ensure_step(&mut self, registry: &TaskRegistry, task: &str) -> Result<String> {
        if let Some(step) = self.step_for_task(task) {
            return Ok(step.id.clone());
        }
        let long_lived = registry.get(task)?.is_long_lived();
        let id = self.next_id(task);
        self.steps.push(PlanStep {
            id: id.clone(),
            task: task.to_string(),
            after: Vec::new(),
            long_lived,
            on_demand: true,
        });
        Ok(id)
    }

    /// First step running `task`.
    pub fn step_for_task(&self, task: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.task == task)
    }

    pub fn step(&self, id: &str) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Steps to trigger when the plan starts.
    pub fn roots(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.after.is_empty() && !s.on_demand)
            .map(|s| s.id.clone())
            .collect()
    }

    /// Leaf task names in plan order, without repeats.
    pub fn tasks(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for step in &self.steps {
            if !seen.contains(&step.task.as_str()) {
                seen.push(step.task.as_str());
            }
        }
        seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{Pipeline, SourceSet};
    use crate::tasks::{Job, ServeSettings, TaskDescriptor};

    fn leaf(name: &str) -> TaskDescriptor {
        let pipeline = Pipeline::from_source(SourceSet::new(Vec::<String>::new())).delete();
        TaskDescriptor::leaf(name, "", Job::Pipeline(pipeline))
    }

    fn serve(name: &str) -> TaskDescriptor {
        TaskDescriptor::leaf(
            name,
            "",
            Job::Serve(ServeSettings {
                port: 1,
                proxy: "http://localhost/".into(),
                watch: "web/**".into(),
            }),
        )
    }

    fn after(plan: &ExecPlan, id: &str) -> Vec<String> {
        plan.step(id).unwrap().after.clone()
    }

    #[test]
    fn series_chains_and_parallel_fans_in() {
        let mut reg = TaskRegistry::new();
        for n in ["a", "b", "c", "d"] {
            reg.register(leaf(n)).unwrap();
        }
        reg.register(TaskDescriptor::composite(
            "top",
            None,
            Composition::Series(vec!["a".into(), Composition::parallel(["b", "c"]), "d".into()]),
        ))
        .unwrap();

        let plan = ExecPlan::expand(&reg, "top").unwrap();
        assert_eq!(plan.roots(), vec!["a"]);
        assert_eq!(after(&plan, "b"), vec!["a"]);
        assert_eq!(after(&plan, "c"), vec!["a"]);
        assert_eq!(after(&plan, "d"), vec!["b", "c"]);
    }

    #[test]
    fn repeated_tasks_get_distinct_ids() {
        let mut reg = TaskRegistry::new();
        reg.register(leaf("a")).unwrap();
        reg.register(TaskDescriptor::composite("twice", None, Composition::series(["a", "a"])))
            .unwrap();
        let plan = ExecPlan::expand(&reg, "twice").unwrap();
        let ids: Vec<_> = plan.steps.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a#2"]);
        assert_eq!(after(&plan, "a#2"), vec!["a"]);
    }

    #[test]
    fn nested_composites_expand_through_names() {
        let mut reg = TaskRegistry::new();
        for n in ["a", "b", "c"] {
            reg.register(leaf(n)).unwrap();
        }
        reg.register(serve("s")).unwrap();
        reg.register(TaskDescriptor::composite("inner", None, Composition::parallel(["a", "b"])))
            .unwrap();
        reg.register(TaskDescriptor::composite("outer", None, Composition::series(["inner", "c", "s"])))
            .unwrap();
        let plan = ExecPlan::expand(&reg, "outer").unwrap();
        assert_eq!(plan.roots(), vec!["a", "b"]);
        assert_eq!(after(&plan, "c"), vec!["a", "b"]);
        assert!(plan.step("s").unwrap().long_lived);
        assert!(!plan.step("c").unwrap().long_lived);
    }

    #[test]
    fn leaf_target_is_a_single_step() {
        let mut reg = TaskRegistry::new();
        reg.register(leaf("a")).unwrap();
        let plan = ExecPlan::expand(&reg, "a").unwrap();
        assert_eq!(plan.roots(), vec!["a"]);
        assert_eq!(plan.steps.len(), 1);
    }

    #[test]
    fn on_demand_steps_are_not_roots() {
        let mut reg = TaskRegistry::new();
        reg.register(leaf("a")).unwrap();
        reg.register(leaf("w")).unwrap();
        let mut plan = ExecPlan::expand(&reg, "w").unwrap();
        assert_eq!(plan.ensure_step(&reg, "a").unwrap(), "a");
        assert_eq!(plan.ensure_step(&reg, "w").unwrap(), "w");
        assert_eq!(plan.roots(), vec!["w"]);
    }

    #[test]
    fn unknown_target_fails() {
        let reg = TaskRegistry::new();
        assert!(ExecPlan::expand(&reg, "nope").is_err());
    }
}
