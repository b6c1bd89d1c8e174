// src/dag/graph.rs

use std::collections::HashMap;

use crate::tasks::ExecPlan;

/// Reverse edges of an [`ExecPlan`]: for every step, the steps that wait on
/// it. Plans are acyclic by construction (a step can only wait on steps
/// expanded before it), so nothing is checked here.
#[derive(Debug, Clone, Default)]
pub struct DagGraph {
    dependents: HashMap<String, Vec<String>>,
}

impl DagGraph {
    pub fn from_plan(plan: &ExecPlan) -> Self {
        let mut dependents: HashMap<String, Vec<String>> = plan
            .steps
            .iter()
            .map(|step| (step.id.clone(), Vec::new()))
            .collect();
        for step in &plan.steps {
            for pred in &step.after {
                if let Some(list) = dependents.get_mut(pred) {
                    list.push(step.id.clone());
                }
            }
        }
        Self { dependents }
    }

    pub fn dependents_of(&self, id: &str) -> &[String] {
        self.dependents.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}
