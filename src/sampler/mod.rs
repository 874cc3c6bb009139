//! Sampling strategies and the trait wiring them into a study.

mod random;
mod tpe;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::distribution::{Distribution, SearchSpace};
use crate::error::Result;
use crate::param::ParamValue;
use crate::trial::FrozenTrial;
use crate::types::{Direction, TrialState};

pub(crate) use random::RandomSampler;
pub use tpe::{process_constraints_after_trial, TpeSampler, TpeSamplerBuilder};

/// Computes constraint values for a finished trial. Values at or below zero
/// mean the constraint is satisfied.
pub type ConstraintsFunc = dyn Fn(&FrozenTrial) -> Vec<f64> + Send + Sync;

/// Maps the number of finished trials to the size of the below split.
pub type GammaFunc = dyn Fn(usize) -> usize + Send + Sync;

/// Read-only view of a study handed to samplers.
///
/// Carries the optimization directions and the full trial history, including
/// the trial currently being sampled.
#[derive(Clone, Copy, Debug)]
pub struct StudyView<'a> {
    directions: &'a [Direction],
    trials: &'a [FrozenTrial],
}

impl<'a> StudyView<'a> {
    /// Creates a view over the given directions and trials.
    #[must_use]
    pub fn new(directions: &'a [Direction], trials: &'a [FrozenTrial]) -> Self {
        Self { directions, trials }
    }

    /// The optimization direction of each objective.
    #[must_use]
    pub fn directions(&self) -> &'a [Direction] {
        self.directions
    }

    /// Every trial of the study, in creation order.
    #[must_use]
    pub fn trials(&self) -> &'a [FrozenTrial] {
        self.trials
    }

    /// Whether the study optimizes more than one objective.
    #[must_use]
    pub fn is_multi_objective(&self) -> bool {
        self.directions.len() > 1
    }

    /// The trials whose state is one of `states`, in creation order.
    #[must_use]
    pub fn trials_in_states(&self, states: &[TrialState]) -> Vec<&'a FrozenTrial> {
        self.trials
            .iter()
            .filter(|trial| states.contains(&trial.state))
            .collect()
    }
}

/// Provenance of a configurable function, recorded in study snapshots.
///
/// Builtin functions restore by name. Custom functions cannot be serialized,
/// so restoring them requires an override supplied by the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FunctionSpec {
    /// One of the crate's default functions, identified by name.
    Builtin {
        /// Name of the builtin, e.g. `defaultGamma`.
        name: String,
    },
    /// A user-supplied function.
    Custom {
        /// Optional label for diagnostics.
        #[serde(default)]
        name: Option<String>,
    },
    /// No function configured.
    None,
}

/// Strategy interface for sampling parameter values.
///
/// A sampler sees the study through a [`StudyView`] and may keep internal
/// state behind interior mutability, so studies can share it across threads.
pub trait Sampler: Send + Sync {
    /// The subset of the search space this sampler wants to sample jointly.
    ///
    /// Parameters returned here are produced by [`Sampler::sample_relative`]
    /// in one shot at the first suggestion of the trial.
    fn infer_relative_search_space(
        &self,
        study: &StudyView<'_>,
        trial: &FrozenTrial,
    ) -> SearchSpace;

    /// Samples all parameters of the relative search space at once.
    ///
    /// # Errors
    ///
    /// Returns an error when observations cannot be converted or the
    /// underlying estimators cannot be fitted.
    fn sample_relative(
        &self,
        study: &StudyView<'_>,
        trial: &mut FrozenTrial,
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>>;

    /// Samples a single parameter outside the relative search space.
    ///
    /// # Errors
    ///
    /// Returns an error when historical observations cannot be converted or
    /// the underlying estimators cannot be fitted.
    fn sample_independent(
        &self,
        study: &StudyView<'_>,
        trial: &FrozenTrial,
        name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue>;

    /// Hook invoked when a trial starts.
    fn before_trial(&self, _study: &StudyView<'_>, _trial: &mut FrozenTrial) {}

    /// Hook invoked when a trial reaches a final state.
    ///
    /// # Errors
    ///
    /// Returns an error when post-processing fails, e.g. a constraints
    /// function produced `NaN`.
    fn after_trial(
        &self,
        _study: &StudyView<'_>,
        _trial: &mut FrozenTrial,
        _state: TrialState,
        _values: Option<&[f64]>,
    ) -> Result<()> {
        Ok(())
    }

    /// Reseeds any internal random state from the wall clock.
    fn reseed_rng(&self) {}
}
