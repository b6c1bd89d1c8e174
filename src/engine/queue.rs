// src/engine/queue.rs

use std::collections::{BTreeSet, VecDeque};

use tracing::{debug, warn};

use crate::types::TriggerWhileRunningBehaviour;

use super::TaskName;

/// Triggers that arrive for steps already taking part in the active run.
///
/// Each entry is a *batch* of step ids for one future run. Triggers for
/// different steps share the newest batch; a step triggered again while it
/// is already queued opens a fresh batch behind it. `max_runs`
/// (`[config].queue_length`) bounds how many batches are kept, so with the
/// default of 1 a burst of saves to the same stylesheet re-runs `scss` once.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: TriggerWhileRunningBehaviour,
    max_runs: usize,
    runs: VecDeque<BTreeSet<TaskName>>,
}

impl TriggerQueue {
    /// `max_runs` is clamped to at least 1.
    pub fn new(behaviour: TriggerWhileRunningBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Record a trigger for a step that is already in the active run.
    ///
    /// - `Queue` adds it to the newest batch, or opens a new batch when the
    ///   step is already there, dropping the oldest batches beyond
    ///   `max_runs`.
    /// - `Cancel` replaces every queued batch with this step alone.
    pub fn record_trigger(&mut self, task: &str) {
        let name = task.to_string();

        match self.behaviour {
            TriggerWhileRunningBehaviour::Queue => {
                match self.runs.back_mut() {
                    Some(last_batch) if !last_batch.contains(&name) => {
                        debug!(task = %name, "added trigger to newest queued batch");
                        last_batch.insert(name);
                    }
                    _ => {
                        debug!(task = %name, batch = self.runs.len() + 1, "opened queued batch");
                        self.runs.push_back(BTreeSet::from([name]));
                    }
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded queue_length; dropping oldest queued batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            TriggerWhileRunningBehaviour::Cancel => {
                debug!(task = %name, "resetting queued batches to this step only");
                self.runs.clear();
                self.runs.push_back(BTreeSet::from([name]));
            }
        }
    }

    /// Take the oldest queued batch as a sorted list of step ids.
    pub fn next_batch(&mut self) -> Vec<TaskName> {
        let batch = self.runs.pop_front().unwrap_or_default();
        debug!(steps = batch.len(), left = self.runs.len(), "took queued batch for new run");
        batch.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_triggers_coalesce_into_one_batch() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 1);
        q.record_trigger("scss");
        q.record_trigger("scss");
        q.record_trigger("js");
        assert_eq!(q.next_batch(), vec!["js", "scss"]);
        assert!(q.is_empty());
    }

    #[test]
    fn longer_queue_keeps_a_run_per_repeat() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 2);
        q.record_trigger("scss");
        q.record_trigger("js");
        q.record_trigger("scss");
        q.record_trigger("scss");
        assert_eq!(q.next_batch(), vec!["scss"]);
        assert_eq!(q.next_batch(), vec!["scss"]);
        assert!(q.is_empty());
        assert!(q.next_batch().is_empty());
    }

    #[test]
    fn cancel_keeps_only_the_latest_trigger() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Cancel, 3);
        q.record_trigger("scss");
        q.record_trigger("js");
        assert_eq!(q.next_batch(), vec!["js"]);
    }

    #[test]
    fn zero_length_is_clamped() {
        let mut q = TriggerQueue::new(TriggerWhileRunningBehaviour::Queue, 0);
        q.record_trigger("svg-sprite");
        assert_eq!(q.next_batch(), vec!["svg-sprite"]);
    }
}
