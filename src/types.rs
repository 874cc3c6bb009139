//! Core study types.

use serde::{Deserialize, Serialize};

/// The direction of optimization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Minimize the objective value.
    Minimize,
    /// Maximize the objective value.
    Maximize,
}

/// The state of a trial in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialState {
    /// The trial is currently running.
    Running,
    /// The trial completed successfully.
    Complete,
    /// The trial was stopped early by its objective.
    Pruned,
    /// The trial failed with an error.
    Fail,
    /// The trial is queued and has not started yet.
    Waiting,
}

impl TrialState {
    /// Whether the trial has reached a terminal state.
    #[must_use]
    pub const fn is_finished(self) -> bool {
        !matches!(self, Self::Running | Self::Waiting)
    }
}
