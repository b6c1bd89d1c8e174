// src/types.rs

use serde::Deserialize;

/// What a watch trigger does when its step is still part of the active run
/// (`[config].triggered_while_running_behaviour`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerWhileRunningBehaviour {
    /// Re-run the step once the active run is over. Repeats coalesce.
    #[default]
    Queue,
    /// Forget earlier queued re-runs and keep only the newest one.
    Cancel,
}
