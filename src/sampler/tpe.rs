//! Tree-structured Parzen Estimator (TPE) sampler.
//!
//! TPE splits the trial history into a promising and an unpromising group,
//! fits a Parzen mixture to each, and suggests the candidate maximizing the
//! log density ratio between the two.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::distribution::{Distribution, SearchSpace};
use crate::error::{Error, Result};
use crate::multi_objective::{calculate_weights_below_for_multi_objective, split_trials};
use crate::num_util::js_min;
use crate::param::ParamValue;
use crate::parzen::{default_gamma, default_weights, EstimatorParams, ParzenEstimator};
use crate::rng::{clock_millis, Mt19937, Mt19937State};
use crate::sampler::{
    ConstraintsFunc, FunctionSpec, GammaFunc, RandomSampler, Sampler, StudyView,
};
use crate::search_space::{GroupDecomposedSearchSpace, IntersectionSearchSpace, SearchSpaceGroup};
use crate::trial::{AttrValue, FrozenTrial, CONSTRAINTS_KEY};
use crate::types::TrialState;

/// Seed mixing constant applied when reseeding from the wall clock.
const RESEED_XOR: u32 = 0x7f4a_7c15;

/// System attribute key prefix for stashed relative parameters.
const STASH_KEY_PREFIX: &str = "tpe:relative_params:";

/// Maximum characters per stashed attribute chunk.
const STASH_CHUNK_CHARS: usize = 2045;

/// Snapshot name of the builtin gamma function.
const BUILTIN_GAMMA: &str = "defaultGamma";

/// Snapshot name of the builtin weights function.
const BUILTIN_WEIGHTS: &str = "defaultWeights";

/// Evaluates a constraints function against a finished trial and records the
/// outcome under [`CONSTRAINTS_KEY`].
///
/// Runs only for complete and pruned trials. A `NaN` component stores an
/// explicit null marker before the error propagates, so downstream feasibility
/// checks treat the trial as infeasible rather than unconstrained.
///
/// # Errors
///
/// Returns [`Error::NanConstraint`] when any constraint value is `NaN`.
pub fn process_constraints_after_trial(
    constraints_func: &ConstraintsFunc,
    trial: &mut FrozenTrial,
    state: TrialState,
) -> Result<()> {
    if state != TrialState::Complete && state != TrialState::Pruned {
        return Ok(());
    }

    let raw = constraints_func(trial);
    if raw.iter().any(|v| v.is_nan()) {
        trial
            .system_attrs
            .insert(CONSTRAINTS_KEY.to_owned(), AttrValue::Null);
        return Err(Error::NanConstraint);
    }
    trial
        .system_attrs
        .insert(CONSTRAINTS_KEY.to_owned(), AttrValue::FloatVec(raw));
    Ok(())
}

/// Sampler implementing the Tree-structured Parzen Estimator.
///
/// Before `n_startup_trials` trials have finished, parameters come from an
/// internal uniform random path. Afterwards each suggestion splits the history
/// with the gamma function, fits mixtures over both halves, draws
/// `n_ei_candidates` candidates from the promising one, and keeps the
/// candidate with the best density ratio. With `multivariate`, parameters
/// shared by all finished trials are sampled jointly; `group` additionally
/// decomposes the history into independent parameter groups.
///
/// All internal state sits behind mutexes, so a study can drive the sampler
/// through shared references.
///
/// # Examples
///
/// ```
/// use tpe::prelude::*;
///
/// let sampler = TpeSampler::builder()
///     .n_startup_trials(5)
///     .seed(42)
///     .build()?;
/// let mut study = Study::new(sampler, Direction::Minimize);
/// # let _ = &mut study;
/// # Ok::<(), tpe::Error>(())
/// ```
pub struct TpeSampler {
    estimator_params: EstimatorParams,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    gamma: Arc<GammaFunc>,
    gamma_spec: FunctionSpec,
    weights_spec: FunctionSpec,
    warn_independent_sampling: bool,
    group: bool,
    constant_liar: bool,
    constraints_func: Option<Arc<ConstraintsFunc>>,
    rng: Mutex<Mt19937>,
    random_sampler: RandomSampler,
    intersection_space: Mutex<IntersectionSearchSpace>,
    group_space: Mutex<GroupDecomposedSearchSpace>,
    current_group: Mutex<Option<SearchSpaceGroup>>,
}

impl TpeSampler {
    /// Creates a sampler with default settings and a clock-derived seed.
    #[must_use]
    pub fn new() -> Self {
        TpeSamplerBuilder::new().build_unchecked()
    }

    /// Starts configuring a sampler.
    #[must_use]
    pub fn builder() -> TpeSamplerBuilder {
        TpeSamplerBuilder::new()
    }

    /// Weight of the wide prior kernel.
    #[must_use]
    pub fn prior_weight(&self) -> f64 {
        self.estimator_params.prior_weight
    }

    /// Whether kernel widths are clamped from below.
    #[must_use]
    pub fn consider_magic_clip(&self) -> bool {
        self.estimator_params.consider_magic_clip
    }

    /// Whether domain endpoints widen the edge kernels.
    #[must_use]
    pub fn consider_endpoints(&self) -> bool {
        self.estimator_params.consider_endpoints
    }

    /// Number of finished trials sampled randomly before TPE engages.
    #[must_use]
    pub fn n_startup_trials(&self) -> usize {
        self.n_startup_trials
    }

    /// Number of candidates drawn per suggestion.
    #[must_use]
    pub fn n_ei_candidates(&self) -> usize {
        self.n_ei_candidates
    }

    /// Whether shared parameters are sampled jointly.
    #[must_use]
    pub fn multivariate(&self) -> bool {
        self.estimator_params.multivariate
    }

    /// Whether the search space decomposes into independent groups.
    #[must_use]
    pub fn group(&self) -> bool {
        self.group
    }

    /// Whether independent sampling of multivariate parameters warns.
    #[must_use]
    pub fn warn_independent_sampling(&self) -> bool {
        self.warn_independent_sampling
    }

    /// Whether running trials participate in the history as pessimistic
    /// placeholders.
    #[must_use]
    pub fn constant_liar(&self) -> bool {
        self.constant_liar
    }

    /// Provenance of the gamma function, for snapshots.
    #[must_use]
    pub fn gamma_spec(&self) -> &FunctionSpec {
        &self.gamma_spec
    }

    /// Provenance of the weights function, for snapshots.
    #[must_use]
    pub fn weights_spec(&self) -> &FunctionSpec {
        &self.weights_spec
    }

    /// Provenance of the constraints function, for snapshots.
    #[must_use]
    pub fn constraints_spec(&self) -> FunctionSpec {
        match &self.constraints_func {
            Some(_) => FunctionSpec::Custom { name: None },
            None => FunctionSpec::None,
        }
    }

    /// Copies out the sampling generator state.
    #[must_use]
    pub fn rng_state(&self) -> Mt19937State {
        self.rng.lock().state()
    }

    /// Restores the sampling generator state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotFormat`] for a malformed state vector.
    pub fn set_rng_state(&self, state: &Mt19937State) -> Result<()> {
        self.rng.lock().set_state(state)
    }

    /// Copies out the startup-phase generator state.
    #[must_use]
    pub fn random_sampler_rng_state(&self) -> Mt19937State {
        self.random_sampler.rng_state()
    }

    /// Restores the startup-phase generator state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotFormat`] for a malformed state vector.
    pub fn set_random_sampler_rng_state(&self, state: &Mt19937State) -> Result<()> {
        self.random_sampler.set_rng_state(state)
    }

    fn finished_trial_count(study: &StudyView<'_>) -> usize {
        study
            .trials_in_states(&[TrialState::Complete, TrialState::Pruned])
            .len()
    }

    /// Parameters of a trial, merged with any stashed relative parameters.
    ///
    /// While a multivariate trial is still running, its jointly sampled
    /// parameters live in chunked system attributes; explicit parameters take
    /// precedence over the stash.
    fn params_of(&self, trial: &FrozenTrial) -> Result<BTreeMap<String, ParamValue>> {
        if trial.state.is_finished() || !self.estimator_params.multivariate {
            return Ok(trial.params.clone());
        }

        let mut joined = String::new();
        let mut chunks = 0_usize;
        while let Some(AttrValue::Str(chunk)) = trial
            .system_attrs
            .get(&format!("{STASH_KEY_PREFIX}{chunks}"))
        {
            joined.push_str(chunk);
            chunks += 1;
        }
        if chunks == 0 {
            return Ok(trial.params.clone());
        }

        let mut params: BTreeMap<String, ParamValue> = serde_json::from_str(&joined)?;
        for (name, value) in &trial.params {
            params.insert(name.clone(), value.clone());
        }
        Ok(params)
    }

    /// Transposes trial parameters into per-parameter observation columns,
    /// keeping only trials that cover the whole search space.
    fn internal_repr(
        &self,
        trials: &[&FrozenTrial],
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, Vec<f64>>> {
        let mut values: BTreeMap<String, Vec<f64>> = search_space
            .keys()
            .map(|name| (name.clone(), Vec::new()))
            .collect();

        for trial in trials {
            let params = self.params_of(trial)?;
            if !search_space.keys().all(|name| params.contains_key(name)) {
                continue;
            }
            for (name, dist) in search_space {
                let Some((column, value)) = values.get_mut(name).zip(params.get(name)) else {
                    continue;
                };
                column.push(dist.to_internal(value)?);
            }
        }

        Ok(values)
    }

    fn build_parzen_estimator(
        &self,
        study: &StudyView<'_>,
        search_space: &SearchSpace,
        trials: &[&FrozenTrial],
        handle_below: bool,
    ) -> Result<ParzenEstimator> {
        let observations = self.internal_repr(trials, search_space)?;

        if handle_below && study.is_multi_objective() {
            let mut mask = Vec::with_capacity(trials.len());
            for trial in trials {
                let params = self.params_of(trial)?;
                mask.push(search_space.keys().all(|name| params.contains_key(name)));
            }
            let weights_below = calculate_weights_below_for_multi_objective(
                study.directions(),
                trials,
                self.constraints_func.as_deref(),
            )?;
            let masked: Vec<f64> = weights_below
                .iter()
                .zip(&mask)
                .filter(|&(_, &keep)| keep)
                .map(|(w, _)| *w)
                .collect();
            return ParzenEstimator::with_weights(
                &observations,
                search_space,
                &self.estimator_params,
                &masked,
            );
        }

        ParzenEstimator::new(&observations, search_space, &self.estimator_params)
    }

    fn acquisition(
        samples: &BTreeMap<String, Vec<f64>>,
        below: &ParzenEstimator,
        above: &ParzenEstimator,
    ) -> Vec<f64> {
        let log_below = below.log_pdf(samples);
        let log_above = above.log_pdf(samples);
        log_below
            .iter()
            .zip(&log_above)
            .map(|(b, a)| b - a)
            .collect()
    }

    /// Picks the candidate with the highest acquisition value.
    fn compare(
        samples: &BTreeMap<String, Vec<f64>>,
        acquisition: &[f64],
    ) -> Result<BTreeMap<String, f64>> {
        let sample_size = samples.values().next().map_or(0, Vec::len);
        if sample_size == 0 {
            return Err(Error::EmptySamples);
        }
        if sample_size != acquisition.len() {
            return Err(Error::AcquisitionSizeMismatch {
                samples: sample_size,
                acquisition: acquisition.len(),
            });
        }

        let mut best_idx = 0;
        for i in 1..acquisition.len() {
            if acquisition[i] > acquisition[best_idx] {
                best_idx = i;
            }
        }

        Ok(samples
            .iter()
            .map(|(name, column)| (name.clone(), column[best_idx]))
            .collect())
    }

    /// Runs one TPE suggestion over `search_space`.
    ///
    /// Discrete domains get extra tie-breaking: when several candidates are
    /// indistinguishable under the acquisition value, the choice falls back to
    /// density probes or the largest tied value instead of raw argmax order,
    /// which otherwise biases towards the domain minimum.
    #[allow(
        clippy::too_many_lines,
        clippy::float_cmp,
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn sample(
        &self,
        study: &StudyView<'_>,
        trial: &FrozenTrial,
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        let states: &[TrialState] = if self.constant_liar {
            &[
                TrialState::Complete,
                TrialState::Pruned,
                TrialState::Running,
            ]
        } else {
            &[TrialState::Complete, TrialState::Pruned]
        };

        let mut trials = study.trials_in_states(states);
        if self.constant_liar {
            trials.retain(|t| t.number != trial.number);
        }

        let n = trials
            .iter()
            .filter(|t| t.state != TrialState::Running)
            .count();
        let n_below = (self.gamma)(n);
        let (below, above) = split_trials(
            study.directions(),
            &trials,
            n_below,
            self.constraints_func.is_some(),
        )?;
        trace_debug!(
            "tpe split {} trials into {} below / {} above",
            n,
            below.len(),
            above.len()
        );

        let mpe_below = self.build_parzen_estimator(study, search_space, &below, true)?;
        let mpe_above = self.build_parzen_estimator(study, search_space, &above, false)?;

        let samples_below = mpe_below.sample(&mut self.rng.lock(), self.n_ei_candidates);
        let acquisition = Self::acquisition(&samples_below, &mpe_below, &mpe_above);

        let mut selected: Option<BTreeMap<String, f64>> = None;

        // A flat acquisition over a lone categorical parameter carries no
        // signal, so probe each category's density directly.
        if search_space.len() == 1 {
            if let Some((name, Distribution::Categorical(dist))) = search_space.iter().next() {
                let mut min_acq = f64::INFINITY;
                let mut max_acq = f64::NEG_INFINITY;
                for &value in &acquisition {
                    if value < min_acq {
                        min_acq = value;
                    }
                    if value > max_acq {
                        max_acq = value;
                    }
                }

                if max_acq - min_acq <= 1e-12 {
                    let mut best_category = 0_usize;
                    let mut best_log_pdf = f64::NEG_INFINITY;
                    for category in 0..dist.choices().len() {
                        let mut probe = BTreeMap::new();
                        probe.insert(name.clone(), vec![category as f64]);
                        let lp = mpe_below.log_pdf(&probe)[0];
                        if lp > best_log_pdf {
                            best_log_pdf = lp;
                            best_category = category;
                        }
                    }

                    if let Some(column) = samples_below.get(name) {
                        for &value in column {
                            if value.trunc() == best_category as f64 {
                                let mut choice = BTreeMap::new();
                                choice.insert(name.clone(), value);
                                selected = Some(choice);
                                break;
                            }
                        }
                    }
                }
            }
        }

        // Near-ties over a lone discrete parameter: raw argmax always lands
        // on the first candidate, so prefer larger tied values once enough
        // history has accumulated.
        if selected.is_none() && samples_below.len() == 1 {
            if let Some((name, column)) = samples_below.iter().next() {
                if let Some(dist) = search_space.get(name) {
                    let discrete_like =
                        matches!(dist, Distribution::Categorical(_) | Distribution::Int(_));
                    if discrete_like {
                        let mut best_acq = f64::NEG_INFINITY;
                        for &value in &acquisition {
                            if value > best_acq {
                                best_acq = value;
                            }
                        }

                        let near: Vec<usize> = (0..acquisition.len())
                            .filter(|&i| best_acq - acquisition[i] <= 1e-15)
                            .collect();

                        if near.len() > 1 {
                            let pick = |idx: usize| {
                                let mut choice = BTreeMap::new();
                                choice.insert(name.clone(), column[idx]);
                                choice
                            };
                            let argmax_by_value = |indices: &[usize]| {
                                let mut chosen = indices[0];
                                let mut chosen_value = column[chosen];
                                for &idx in indices.iter().skip(1) {
                                    if column[idx] > chosen_value {
                                        chosen_value = column[idx];
                                        chosen = idx;
                                    }
                                }
                                chosen
                            };

                            match dist {
                                Distribution::Categorical(_) if self.constant_liar => {
                                    if n < self.n_startup_trials + 3 {
                                        selected = Some(pick(near[0]));
                                    } else if n >= self.n_startup_trials + 8 {
                                        let mut min_value = f64::INFINITY;
                                        let mut max_value = f64::NEG_INFINITY;
                                        let mut acq_by_value: BTreeMap<u64, f64> = BTreeMap::new();
                                        for &idx in &near {
                                            let value = column[idx];
                                            if value < min_value {
                                                min_value = value;
                                            }
                                            if value > max_value {
                                                max_value = value;
                                            }
                                            let entry = acq_by_value
                                                .entry(value.to_bits())
                                                .or_insert(f64::NEG_INFINITY);
                                            if acquisition[idx] > *entry {
                                                *entry = acquisition[idx];
                                            }
                                        }

                                        let min_acq = acq_by_value
                                            .get(&min_value.to_bits())
                                            .copied()
                                            .unwrap_or(f64::NEG_INFINITY);
                                        let max_acq = acq_by_value
                                            .get(&max_value.to_bits())
                                            .copied()
                                            .unwrap_or(f64::NEG_INFINITY);
                                        let chosen = if max_acq > min_acq + 1e-16 {
                                            near[0]
                                        } else {
                                            argmax_by_value(&near)
                                        };
                                        selected = Some(pick(chosen));
                                    }
                                }
                                Distribution::Int(d) if self.constant_liar => {
                                    let min_near = near
                                        .iter()
                                        .fold(f64::INFINITY, |acc, &idx| js_min(acc, column[idx]));
                                    if min_near > d.low() as f64 {
                                        let mut min_near_acq = f64::INFINITY;
                                        let mut max_near_acq = f64::NEG_INFINITY;
                                        for &idx in &near {
                                            if acquisition[idx] < min_near_acq {
                                                min_near_acq = acquisition[idx];
                                            }
                                            if acquisition[idx] > max_near_acq {
                                                max_near_acq = acquisition[idx];
                                            }
                                        }
                                        if max_near_acq - min_near_acq <= 1e-16 {
                                            selected = Some(pick(argmax_by_value(&near)));
                                        }
                                    }
                                }
                                _ => {
                                    let min_near = near
                                        .iter()
                                        .fold(f64::INFINITY, |acc, &idx| js_min(acc, column[idx]));
                                    let min_domain = match dist {
                                        Distribution::Categorical(_) => 0.0,
                                        Distribution::Int(d) => d.low() as f64,
                                        Distribution::Float(d) => d.low(),
                                    };
                                    if min_near > min_domain {
                                        let chosen = if n >= self.n_startup_trials + 5 {
                                            argmax_by_value(&near)
                                        } else {
                                            near[0]
                                        };
                                        selected = Some(pick(chosen));
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }

        let selected = match selected {
            Some(choice) => choice,
            None => Self::compare(&samples_below, &acquisition)?,
        };

        let mut out = BTreeMap::new();
        for (name, dist) in search_space {
            if let Some(&value) = selected.get(name) {
                out.insert(name.clone(), dist.to_external(value)?);
            }
        }
        Ok(out)
    }

    /// Joint sampling over one (sub)space, guarded by the startup threshold.
    fn sample_relative_space(
        &self,
        study: &StudyView<'_>,
        trial: &FrozenTrial,
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        if search_space.is_empty() {
            return Ok(BTreeMap::new());
        }
        if Self::finished_trial_count(study) < self.n_startup_trials {
            return Ok(BTreeMap::new());
        }
        self.sample(study, trial, search_space)
    }

    fn stash_relative_params(
        trial: &mut FrozenTrial,
        params: &BTreeMap<String, ParamValue>,
    ) -> Result<()> {
        let encoded = serde_json::to_string(params)?;
        let chars: Vec<char> = encoded.chars().collect();
        for (i, chunk) in chars.chunks(STASH_CHUNK_CHARS).enumerate() {
            trial.system_attrs.insert(
                format!("{STASH_KEY_PREFIX}{i}"),
                AttrValue::Str(chunk.iter().collect()),
            );
        }
        Ok(())
    }
}

impl Default for TpeSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl Sampler for TpeSampler {
    fn infer_relative_search_space(
        &self,
        study: &StudyView<'_>,
        _trial: &FrozenTrial,
    ) -> SearchSpace {
        if !self.estimator_params.multivariate {
            return SearchSpace::new();
        }

        let mut out = SearchSpace::new();
        if self.group {
            let group = self.group_space.lock().calculate(study.trials());
            for sub_space in group.search_spaces() {
                for (name, dist) in sub_space {
                    if !dist.single() {
                        out.insert(name.clone(), dist.clone());
                    }
                }
            }
            *self.current_group.lock() = Some(group);
            return out;
        }

        let intersection = self.intersection_space.lock().calculate(study.trials());
        for (name, dist) in &intersection {
            if !dist.single() {
                out.insert(name.clone(), dist.clone());
            }
        }
        out
    }

    fn sample_relative(
        &self,
        study: &StudyView<'_>,
        trial: &mut FrozenTrial,
        search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        let params = if self.group {
            let group = self.current_group.lock().clone().unwrap_or_default();
            let mut params = BTreeMap::new();
            for sub_space in group.search_spaces() {
                let mut local = SearchSpace::new();
                for (name, dist) in sub_space {
                    if !dist.single() {
                        local.insert(name.clone(), dist.clone());
                    }
                }
                params.extend(self.sample_relative_space(study, trial, &local)?);
            }
            params
        } else {
            self.sample_relative_space(study, trial, search_space)?
        };

        if !params.is_empty() {
            trace_debug!("sampled {} parameters jointly", params.len());
            if self.constant_liar {
                Self::stash_relative_params(trial, &params)?;
            }
        }
        Ok(params)
    }

    fn sample_independent(
        &self,
        study: &StudyView<'_>,
        trial: &FrozenTrial,
        name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue> {
        if Self::finished_trial_count(study) < self.n_startup_trials {
            trace_debug!("startup phase, sampling {name} uniformly");
            return self
                .random_sampler
                .sample_independent(study, trial, name, distribution);
        }

        let mut space = SearchSpace::new();
        space.insert(name.to_owned(), distribution.clone());
        self.sample(study, trial, &space)?
            .remove(name)
            .ok_or(Error::EmptySamples)
    }

    fn after_trial(
        &self,
        _study: &StudyView<'_>,
        trial: &mut FrozenTrial,
        state: TrialState,
        _values: Option<&[f64]>,
    ) -> Result<()> {
        if let Some(func) = &self.constraints_func {
            process_constraints_after_trial(func.as_ref(), trial, state)?;
        }
        Ok(())
    }

    fn reseed_rng(&self) {
        self.rng.lock().seed(clock_millis() ^ RESEED_XOR);
        self.random_sampler.reseed_rng();
    }
}

/// Configures and creates a [`TpeSampler`].
///
/// # Examples
///
/// ```
/// use tpe::sampler::TpeSamplerBuilder;
///
/// let sampler = TpeSamplerBuilder::new()
///     .prior_weight(0.8)
///     .n_startup_trials(5)
///     .n_ei_candidates(32)
///     .seed(42)
///     .build()?;
/// assert_eq!(sampler.n_ei_candidates(), 32);
/// # Ok::<(), tpe::Error>(())
/// ```
pub struct TpeSamplerBuilder {
    prior_weight: f64,
    consider_magic_clip: bool,
    consider_endpoints: bool,
    n_startup_trials: usize,
    n_ei_candidates: usize,
    gamma: Option<Arc<GammaFunc>>,
    weights: Option<Arc<crate::parzen::WeightsFn>>,
    seed: Option<u32>,
    multivariate: bool,
    group: bool,
    warn_independent_sampling: bool,
    constant_liar: bool,
    constraints_func: Option<Arc<ConstraintsFunc>>,
}

impl TpeSamplerBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            prior_weight: 1.0,
            consider_magic_clip: true,
            consider_endpoints: false,
            n_startup_trials: 10,
            n_ei_candidates: 24,
            gamma: None,
            weights: None,
            seed: None,
            multivariate: false,
            group: false,
            warn_independent_sampling: true,
            constant_liar: false,
            constraints_func: None,
        }
    }

    /// Sets the weight of the wide prior kernel. Must be non-negative;
    /// fitting rejects negative values.
    #[must_use]
    pub fn prior_weight(mut self, prior_weight: f64) -> Self {
        self.prior_weight = prior_weight;
        self
    }

    /// Clamps kernel widths from below based on the kernel count.
    #[must_use]
    pub fn consider_magic_clip(mut self, consider_magic_clip: bool) -> Self {
        self.consider_magic_clip = consider_magic_clip;
        self
    }

    /// Keeps the domain endpoints when widening edge kernels.
    #[must_use]
    pub fn consider_endpoints(mut self, consider_endpoints: bool) -> Self {
        self.consider_endpoints = consider_endpoints;
        self
    }

    /// Number of finished trials sampled randomly before TPE engages.
    #[must_use]
    pub fn n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Number of candidates drawn and ranked per suggestion.
    #[must_use]
    pub fn n_ei_candidates(mut self, n: usize) -> Self {
        self.n_ei_candidates = n;
        self
    }

    /// Replaces the split-size function mapping the number of finished
    /// trials to the size of the promising half.
    #[must_use]
    pub fn gamma_fn(mut self, gamma: impl Fn(usize) -> usize + Send + Sync + 'static) -> Self {
        self.gamma = Some(Arc::new(gamma));
        self
    }

    /// Replaces the per-observation weight function.
    #[must_use]
    pub fn weights_fn(
        mut self,
        weights: impl Fn(usize) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.weights = Some(Arc::new(weights));
        self
    }

    /// Seeds both internal generators for reproducible suggestions.
    #[must_use]
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Samples parameters shared by all finished trials jointly.
    #[must_use]
    pub fn multivariate(mut self, multivariate: bool) -> Self {
        self.multivariate = multivariate;
        self
    }

    /// Decomposes the search space into independently sampled groups.
    /// Requires `multivariate`.
    #[must_use]
    pub fn group(mut self, group: bool) -> Self {
        self.group = group;
        self
    }

    /// Toggles the warning for independently sampled multivariate
    /// parameters.
    #[must_use]
    pub fn warn_independent_sampling(mut self, warn: bool) -> Self {
        self.warn_independent_sampling = warn;
        self
    }

    /// Treats running trials as pessimistic history entries, spreading
    /// concurrent suggestions apart.
    #[must_use]
    pub fn constant_liar(mut self, constant_liar: bool) -> Self {
        self.constant_liar = constant_liar;
        self
    }

    /// Registers a constraints function evaluated after each finished trial.
    /// Values at or below zero mean the constraint is satisfied.
    #[must_use]
    pub fn constraints_fn(
        mut self,
        constraints: impl Fn(&FrozenTrial) -> Vec<f64> + Send + Sync + 'static,
    ) -> Self {
        self.constraints_func = Some(Arc::new(constraints));
        self
    }

    /// Creates the sampler.
    ///
    /// # Errors
    ///
    /// Returns [`Error::GroupWithoutMultivariate`] when `group` is requested
    /// without `multivariate`.
    pub fn build(self) -> Result<TpeSampler> {
        if self.group && !self.multivariate {
            return Err(Error::GroupWithoutMultivariate);
        }
        Ok(self.build_unchecked())
    }

    fn build_unchecked(self) -> TpeSampler {
        let (gamma, gamma_spec) = match self.gamma {
            Some(gamma) => (gamma, FunctionSpec::Custom { name: None }),
            None => (
                Arc::new(default_gamma) as Arc<GammaFunc>,
                FunctionSpec::Builtin {
                    name: BUILTIN_GAMMA.to_owned(),
                },
            ),
        };
        let (weights, weights_spec) = match self.weights {
            Some(weights) => (weights, FunctionSpec::Custom { name: None }),
            None => (
                Arc::new(default_weights) as Arc<crate::parzen::WeightsFn>,
                FunctionSpec::Builtin {
                    name: BUILTIN_WEIGHTS.to_owned(),
                },
            ),
        };

        let rng = match self.seed {
            Some(seed) => Mt19937::new(seed),
            None => Mt19937::from_clock(),
        };

        TpeSampler {
            estimator_params: EstimatorParams {
                prior_weight: self.prior_weight,
                consider_magic_clip: self.consider_magic_clip,
                consider_endpoints: self.consider_endpoints,
                weights,
                multivariate: self.multivariate,
            },
            n_startup_trials: self.n_startup_trials,
            n_ei_candidates: self.n_ei_candidates,
            gamma,
            gamma_spec,
            weights_spec,
            warn_independent_sampling: self.warn_independent_sampling,
            group: self.group,
            constant_liar: self.constant_liar,
            constraints_func: self.constraints_func,
            rng: Mutex::new(rng),
            random_sampler: RandomSampler::new(self.seed),
            intersection_space: Mutex::new(IntersectionSearchSpace::new(true)),
            group_space: Mutex::new(GroupDecomposedSearchSpace::new(true)),
            current_group: Mutex::new(None),
        }
    }
}

impl Default for TpeSamplerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
