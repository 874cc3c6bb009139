//! Study implementation driving the ask/tell optimization loop.

use std::collections::BTreeMap;

use crate::distribution::{
    CategoricalDistribution, Distribution, FloatDistribution, IntDistribution, SearchSpace,
};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::sampler::{Sampler, StudyView};
use crate::trial::{AttrValue, FrozenTrial, FIXED_PARAMS_KEY};
use crate::types::{Direction, TrialState};

mod snapshot;

pub use snapshot::SamplerFunctions;

/// A study holds the trial history and drives the sampler through an
/// explicit ask/tell loop.
///
/// Each [`ask`](Study::ask) creates or resumes a trial and hands back a
/// [`Trial`] handle for suggesting parameters. Reporting the outcome with
/// [`tell`](Study::tell) freezes the trial and feeds it back into the
/// sampler's history.
///
/// # Examples
///
/// ```
/// use tpe::prelude::*;
///
/// let sampler = TpeSampler::builder().seed(42).build()?;
/// let mut study = Study::new(sampler, Direction::Minimize);
///
/// let mut trial = study.ask();
/// let x = trial.suggest_float("x", -5.0, 5.0)?;
/// let number = trial.number();
/// study.tell(number, x * x)?;
///
/// assert_eq!(study.trials().len(), 1);
/// # Ok::<(), tpe::Error>(())
/// ```
pub struct Study<S: Sampler> {
    sampler: S,
    directions: Vec<Direction>,
    trials: Vec<FrozenTrial>,
}

impl<S: Sampler> Study<S> {
    /// Creates a single-objective study.
    #[must_use]
    pub fn new(sampler: S, direction: Direction) -> Self {
        Self {
            sampler,
            directions: vec![direction],
            trials: Vec::new(),
        }
    }

    /// Creates a study optimizing one direction per objective.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyDirections`] when `directions` is empty.
    pub fn with_directions(sampler: S, directions: Vec<Direction>) -> Result<Self> {
        if directions.is_empty() {
            return Err(Error::EmptyDirections);
        }
        Ok(Self {
            sampler,
            directions,
            trials: Vec::new(),
        })
    }

    /// The first optimization direction.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.directions[0]
    }

    /// All optimization directions, one per objective.
    #[must_use]
    pub fn directions(&self) -> &[Direction] {
        &self.directions
    }

    /// Whether the study optimizes more than one objective.
    #[must_use]
    pub fn is_multi_objective(&self) -> bool {
        self.directions.len() > 1
    }

    /// The sampler driving this study.
    #[must_use]
    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    /// All trials in creation order. A trial's number equals its index.
    #[must_use]
    pub fn trials(&self) -> &[FrozenTrial] {
        &self.trials
    }

    /// Trials currently in one of the given states.
    #[must_use]
    pub fn get_trials(&self, states: &[TrialState]) -> Vec<&FrozenTrial> {
        self.trials
            .iter()
            .filter(|trial| states.contains(&trial.state))
            .collect()
    }

    /// Queues a trial whose parameters are fixed up front.
    ///
    /// The next [`ask`](Study::ask) picks the queued trial up, and suggest
    /// calls return the fixed values instead of sampling.
    pub fn enqueue_trial(&mut self, params: BTreeMap<String, ParamValue>) {
        let mut trial = FrozenTrial::new(self.trials.len());
        trial.state = TrialState::Waiting;
        trial
            .system_attrs
            .insert(FIXED_PARAMS_KEY.to_owned(), AttrValue::Params(params));
        self.trials.push(trial);
    }

    /// Starts a trial, resuming the oldest queued one if any.
    pub fn ask(&mut self) -> Trial<'_, S> {
        let number = match self
            .trials
            .iter()
            .position(|trial| trial.state == TrialState::Waiting)
        {
            Some(index) => {
                self.trials[index].state = TrialState::Running;
                self.trials[index].number
            }
            None => {
                let number = self.trials.len();
                self.trials.push(FrozenTrial::new(number));
                number
            }
        };
        trace_info!("trial {number} started");

        self.with_detached(number, |study, own| {
            let view = StudyView::new(&study.directions, &study.trials);
            study.sampler.before_trial(&view, own);
        });

        Trial {
            study: self,
            number,
            relative_prepared: false,
            relative_search_space: SearchSpace::new(),
            relative_params: BTreeMap::new(),
        }
    }

    /// Completes a single-objective trial with its objective value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingObjectiveValues`] on a multi-objective study,
    /// [`Error::UnknownTrial`] for an unknown trial number, or any error
    /// raised by the sampler's completion hook.
    pub fn tell(&mut self, number: usize, value: f64) -> Result<()> {
        if self.is_multi_objective() {
            return Err(Error::MissingObjectiveValues);
        }
        self.finish(number, TrialState::Complete, Some(value), None)
    }

    /// Completes a multi-objective trial with one value per objective.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingObjectiveValue`] on a single-objective study,
    /// [`Error::UnknownTrial`] for an unknown trial number, or any error
    /// raised by the sampler's completion hook.
    pub fn tell_values(&mut self, number: usize, values: Vec<f64>) -> Result<()> {
        if !self.is_multi_objective() {
            return Err(Error::MissingObjectiveValue);
        }
        self.finish(number, TrialState::Complete, None, Some(values))
    }

    /// Marks a trial as stopped early. Its objective values stay unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] for an unknown trial number, or any
    /// error raised by the sampler's completion hook.
    pub fn tell_pruned(&mut self, number: usize) -> Result<()> {
        self.finish(number, TrialState::Pruned, None, None)
    }

    /// Marks a trial as failed. Failed trials drop out of the history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownTrial`] for an unknown trial number, or any
    /// error raised by the sampler's completion hook.
    pub fn tell_failed(&mut self, number: usize) -> Result<()> {
        self.finish(number, TrialState::Fail, None, None)
    }

    fn finish(
        &mut self,
        number: usize,
        state: TrialState,
        value: Option<f64>,
        values: Option<Vec<f64>>,
    ) -> Result<()> {
        if number >= self.trials.len() {
            return Err(Error::UnknownTrial(number));
        }

        let trial = &mut self.trials[number];
        if state == TrialState::Complete {
            if let Some(value) = value {
                trial.value = Some(value);
                trial.values = None;
            }
            if let Some(values) = values {
                trial.values = Some(values);
                trial.value = None;
            }
        }
        trial.state = state;
        trace_info!("trial {number} finished as {state:?}");

        self.with_detached(number, |study, own| {
            let view = StudyView::new(&study.directions, &study.trials);
            let values = own.values.clone();
            study.sampler.after_trial(&view, own, state, values.as_deref())
        })
    }

    /// Runs `f` with the trial temporarily taken out of the history, so the
    /// sampler can mutate it while reading the rest of the study. A running
    /// placeholder keeps the number/index correspondence intact.
    fn with_detached<R>(
        &mut self,
        number: usize,
        f: impl FnOnce(&Self, &mut FrozenTrial) -> R,
    ) -> R {
        let mut own = core::mem::replace(&mut self.trials[number], FrozenTrial::new(number));
        let result = f(self, &mut own);
        self.trials[number] = own;
        result
    }
}

/// Handle for one running trial, suggesting parameter values on demand.
///
/// Created by [`Study::ask`]. Suggestions are recorded directly on the
/// underlying trial, so repeated suggestions for the same name return the
/// value already drawn.
pub struct Trial<'a, S: Sampler> {
    study: &'a mut Study<S>,
    number: usize,
    relative_prepared: bool,
    relative_search_space: SearchSpace,
    relative_params: BTreeMap<String, ParamValue>,
}

impl<S: Sampler> Trial<'_, S> {
    /// This trial's number within the study.
    #[must_use]
    pub fn number(&self) -> usize {
        self.number
    }

    /// Suggests a value for `name` from an explicit distribution.
    ///
    /// The first call for a name records the distribution and draws a value;
    /// later calls return the recorded value unchanged. Fixed parameters from
    /// [`Study::enqueue_trial`] take precedence over sampling.
    ///
    /// # Errors
    ///
    /// Returns any error raised by the sampler while drawing the value.
    pub fn suggest(&mut self, name: &str, distribution: Distribution) -> Result<ParamValue> {
        if let Some(existing) = self.study.trials[self.number].params.get(name) {
            return Ok(existing.clone());
        }

        self.study.trials[self.number]
            .distributions
            .insert(name.to_owned(), distribution.clone());

        let fixed = match self.study.trials[self.number].system_attrs.get(FIXED_PARAMS_KEY) {
            Some(AttrValue::Params(map)) => map.get(name).cloned(),
            _ => None,
        };
        if let Some(value) = fixed {
            if !distribution.contains(&value) {
                trace_warn!("fixed parameter {name} with value {value} is out of range");
            }
            self.study.trials[self.number]
                .params
                .insert(name.to_owned(), value.clone());
            return Ok(value);
        }

        self.ensure_relative_prepared()?;

        let value = if self.relative_search_space.contains_key(name)
            && self.relative_params.contains_key(name)
        {
            self.relative_params[name].clone()
        } else {
            let number = self.number;
            self.study.with_detached(number, |study, own| {
                let view = StudyView::new(&study.directions, &study.trials);
                study.sampler.sample_independent(&view, own, name, &distribution)
            })?
        };

        self.study.trials[self.number]
            .params
            .insert(name.to_owned(), value.clone());
        Ok(value)
    }

    /// Suggests a float from a uniform domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] for an empty domain, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_float(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let dist = FloatDistribution::new(low, high, false, None)?;
        self.float_value(name, Distribution::Float(dist))
    }

    /// Suggests a float from a log-uniform domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogBounds`] for a non-positive lower bound, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_float_log(&mut self, name: &str, low: f64, high: f64) -> Result<f64> {
        let dist = FloatDistribution::new(low, high, true, None)?;
        self.float_value(name, Distribution::Float(dist))
    }

    /// Suggests a float from a discretized uniform domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] for a non-positive step, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_float_step(
        &mut self,
        name: &str,
        low: f64,
        high: f64,
        step: f64,
    ) -> Result<f64> {
        let dist = FloatDistribution::new(low, high, false, Some(step))?;
        self.float_value(name, Distribution::Float(dist))
    }

    /// Suggests an integer from a uniform domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBounds`] for an empty domain, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_int(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        let dist = IntDistribution::new(low, high, false, 1)?;
        self.int_value(name, Distribution::Int(dist))
    }

    /// Suggests an integer from a log-uniform domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLogBounds`] for a non-positive lower bound, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_int_log(&mut self, name: &str, low: i64, high: i64) -> Result<i64> {
        let dist = IntDistribution::new(low, high, true, 1)?;
        self.int_value(name, Distribution::Int(dist))
    }

    /// Suggests an integer from a strided domain.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidStep`] for a non-positive step, or
    /// [`Error::ParamTypeMismatch`] when a fixed value is not numeric.
    pub fn suggest_int_step(
        &mut self,
        name: &str,
        low: i64,
        high: i64,
        step: i64,
    ) -> Result<i64> {
        let dist = IntDistribution::new(low, high, false, step)?;
        self.int_value(name, Distribution::Int(dist))
    }

    /// Suggests one of the given choices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] when `choices` is empty, or any error
    /// raised by the sampler while drawing the value.
    pub fn suggest_categorical(
        &mut self,
        name: &str,
        choices: Vec<ParamValue>,
    ) -> Result<ParamValue> {
        let dist = CategoricalDistribution::new(choices)?;
        self.suggest(name, Distribution::Categorical(dist))
    }

    /// Records an intermediate objective value at `step`.
    pub fn report(&mut self, value: f64, step: u64) {
        self.study.trials[self.number]
            .intermediate_values
            .insert(step.to_string(), value);
    }

    fn float_value(&mut self, name: &str, distribution: Distribution) -> Result<f64> {
        let value = self.suggest(name, distribution)?;
        value.as_f64().ok_or_else(|| Error::ParamTypeMismatch {
            name: name.to_owned(),
        })
    }

    #[allow(clippy::cast_possible_truncation)]
    fn int_value(&mut self, name: &str, distribution: Distribution) -> Result<i64> {
        match self.suggest(name, distribution)? {
            ParamValue::Int(value) => Ok(value),
            ParamValue::Float(value) => Ok(value.trunc() as i64),
            _ => Err(Error::ParamTypeMismatch {
                name: name.to_owned(),
            }),
        }
    }

    fn ensure_relative_prepared(&mut self) -> Result<()> {
        if self.relative_prepared {
            return Ok(());
        }

        let number = self.number;
        let (space, params) = self.study.with_detached(number, |study, own| {
            let view = StudyView::new(&study.directions, &study.trials);
            let space = study.sampler.infer_relative_search_space(&view, own);
            let params = study.sampler.sample_relative(&view, own, &space)?;
            Ok::<_, Error>((space, params))
        })?;

        self.relative_search_space = space;
        self.relative_params = params;
        self.relative_prepared = true;
        Ok(())
    }
}
