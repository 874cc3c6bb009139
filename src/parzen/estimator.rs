//! Fitting of per-parameter kernels over observed values.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::distribution::{Distribution, SearchSpace};
use crate::error::{Error, Result};
use crate::num_util::{clip, js_max, EPS};
use crate::parzen::mixture::{ColumnDistribution, MixtureOfProductDistribution};
use crate::parzen::{call_weights_func, WeightsFn};
use crate::rng::Mt19937;
use crate::sorting::argsort;

/// Knobs controlling how kernels are fitted.
#[derive(Clone)]
pub struct EstimatorParams {
    /// Weight of the wide prior kernel appended to every estimator.
    pub prior_weight: f64,
    /// Clamp kernel widths from below based on the kernel count.
    pub consider_magic_clip: bool,
    /// Keep the domain endpoints when widening edge kernels.
    pub consider_endpoints: bool,
    /// Produces per-observation weights from the observation count.
    pub weights: Arc<WeightsFn>,
    /// Use a single shared bandwidth per column instead of per-kernel
    /// neighbor distances.
    pub multivariate: bool,
}

/// Weighted mixture of per-parameter kernels fitted over observations.
///
/// Observations arrive as one internal-representation column per parameter;
/// rows across columns belong to the same trial.
pub struct ParzenEstimator {
    mixture: MixtureOfProductDistribution,
}

impl ParzenEstimator {
    /// Fits an estimator with weights from the configured weight function.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPriorWeight`] for a negative prior weight
    /// and [`Error::InvalidWeights`] when the weight function misbehaves.
    pub fn new(
        observations: &BTreeMap<String, Vec<f64>>,
        search_space: &SearchSpace,
        params: &EstimatorParams,
    ) -> Result<Self> {
        Self::build(observations, search_space, params, None)
    }

    /// Fits an estimator with externally computed per-observation weights.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPriorWeight`] for a negative prior weight
    /// and [`Error::WeightCountMismatch`] when the weight count does not
    /// match the observation count.
    pub fn with_weights(
        observations: &BTreeMap<String, Vec<f64>>,
        search_space: &SearchSpace,
        params: &EstimatorParams,
        predetermined_weights: &[f64],
    ) -> Result<Self> {
        Self::build(observations, search_space, params, Some(predetermined_weights))
    }

    #[allow(clippy::cast_precision_loss)]
    fn build(
        observations: &BTreeMap<String, Vec<f64>>,
        search_space: &SearchSpace,
        params: &EstimatorParams,
        predetermined: Option<&[f64]>,
    ) -> Result<Self> {
        if params.prior_weight < 0.0 {
            return Err(Error::InvalidPriorWeight(params.prior_weight));
        }

        let transformed = transpose_observations(observations, search_space);
        if let Some(pre) = predetermined {
            if transformed.len() != pre.len() {
                return Err(Error::WeightCountMismatch {
                    expected: transformed.len(),
                    got: pre.len(),
                });
            }
        }

        let mut weights = match predetermined {
            Some(pre) => pre.to_vec(),
            None => call_weights_func(params.weights.as_ref(), transformed.len())?,
        };
        if transformed.is_empty() {
            weights = vec![1.0];
        } else {
            weights.push(params.prior_weight);
        }
        let sum: f64 = weights.iter().sum();
        for w in &mut weights {
            *w /= sum;
        }

        let n_params = search_space.len();
        let mut columns = Vec::with_capacity(n_params);
        for (i, (name, dist)) in search_space.iter().enumerate() {
            let column_obs: Vec<f64> = transformed.iter().map(|row| row[i]).collect();
            let column = match dist {
                Distribution::Categorical(d) => {
                    categorical_column(&column_obs, d.choices().len(), params.prior_weight)
                }
                Distribution::Float(d) => numerical_column(
                    &column_obs,
                    d.low(),
                    d.high(),
                    d.step(),
                    d.log_scale(),
                    params,
                    n_params,
                ),
                Distribution::Int(d) => numerical_column(
                    &column_obs,
                    d.low() as f64,
                    d.high() as f64,
                    Some(d.step() as f64),
                    d.log_scale(),
                    params,
                    n_params,
                ),
            };
            columns.push((name.clone(), column));
        }

        Ok(Self {
            mixture: MixtureOfProductDistribution::new(weights, columns),
        })
    }

    /// Draws `batch_size` joint samples in the internal representation.
    pub fn sample(&self, rng: &mut Mt19937, batch_size: usize) -> BTreeMap<String, Vec<f64>> {
        self.mixture.sample(rng, batch_size)
    }

    /// Log density of each sample under the fitted mixture.
    #[must_use]
    pub fn log_pdf(&self, samples: &BTreeMap<String, Vec<f64>>) -> Vec<f64> {
        self.mixture.log_pdf(samples)
    }

    /// The underlying mixture distribution.
    #[must_use]
    pub fn mixture(&self) -> &MixtureOfProductDistribution {
        &self.mixture
    }
}

/// Reshapes per-parameter columns into per-trial rows in search-space key
/// order. The row count follows the first parameter's column.
fn transpose_observations(
    observations: &BTreeMap<String, Vec<f64>>,
    search_space: &SearchSpace,
) -> Vec<Vec<f64>> {
    let Some(first) = search_space.keys().next() else {
        return Vec::new();
    };
    let n = observations.get(first).map_or(0, Vec::len);
    (0..n)
        .map(|i| {
            search_space
                .keys()
                .map(|name| {
                    observations
                        .get(name)
                        .and_then(|col| col.get(i))
                        .copied()
                        .unwrap_or(f64::NAN)
                })
                .collect()
        })
        .collect()
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::float_cmp
)]
fn categorical_column(
    observations: &[f64],
    n_choices: usize,
    prior_weight: f64,
) -> ColumnDistribution {
    if observations.is_empty() {
        return ColumnDistribution::Categorical {
            weights: vec![vec![1.0 / n_choices as f64; n_choices]],
        };
    }

    let n_kernels = observations.len() + 1;
    let mut weights = vec![vec![prior_weight / n_kernels as f64; n_choices]; n_kernels];
    for (row, &obs) in weights.iter_mut().zip(observations) {
        let idx = obs.trunc() as usize;
        if let Some(w) = row.get_mut(idx) {
            *w += 1.0;
        }
    }

    for row in &mut weights {
        let row_sum: f64 = row.iter().sum();
        if row_sum == 0.0 {
            continue;
        }
        for w in row.iter_mut() {
            *w /= row_sum;
        }
    }

    ColumnDistribution::Categorical { weights }
}

#[allow(clippy::cast_precision_loss)]
fn numerical_column(
    observations: &[f64],
    dist_low: f64,
    dist_high: f64,
    step: Option<f64>,
    log_scale: bool,
    params: &EstimatorParams,
    n_params: usize,
) -> ColumnDistribution {
    let mut observations = observations.to_vec();
    let mut low = dist_low;
    let mut high = dist_high;
    if let Some(s) = step {
        low -= s / 2.0;
        high += s / 2.0;
    }
    if log_scale {
        for obs in &mut observations {
            *obs = obs.ln();
        }
        low = low.ln();
        high = high.ln();
    }

    let sigmas = if params.multivariate {
        let sigma = 0.2
            * (observations.len().max(1) as f64).powf(-1.0 / (n_params as f64 + 4.0))
            * (high - low);
        vec![sigma; observations.len()]
    } else {
        univariate_sigmas(&observations, low, high, params.consider_endpoints)
    };

    let max_sigma = high - low;
    let min_sigma = if params.consider_magic_clip {
        // Kernel count including the prior, plus one.
        (high - low) / core::cmp::min(100, observations.len() + 2) as f64
    } else {
        EPS
    };

    let mut mus = observations;
    let mut sigmas: Vec<f64> = sigmas
        .into_iter()
        .map(|s| clip(s, min_sigma, max_sigma))
        .collect();
    mus.push(0.5 * (low + high));
    sigmas.push(high - low);

    match (step, log_scale) {
        (None, false) => ColumnDistribution::TruncNorm {
            mu: mus,
            sigma: sigmas,
            low: dist_low,
            high: dist_high,
        },
        (None, true) => ColumnDistribution::TruncLogNorm {
            mu: mus,
            sigma: sigmas,
            low: dist_low,
            high: dist_high,
        },
        (Some(s), false) => ColumnDistribution::DiscreteTruncNorm {
            mu: mus,
            sigma: sigmas,
            low: dist_low,
            high: dist_high,
            step: s,
        },
        (Some(s), true) => ColumnDistribution::DiscreteTruncLogNorm {
            mu: mus,
            sigma: sigmas,
            low: dist_low,
            high: dist_high,
            step: s,
        },
    }
}

/// Per-kernel widths from the larger gap to each sorted neighbor, with the
/// prior kernel participating in the ordering. Edge kernels drop the
/// distance to the domain endpoint unless endpoints are considered.
fn univariate_sigmas(
    observations: &[f64],
    low: f64,
    high: f64,
    consider_endpoints: bool,
) -> Vec<f64> {
    let prior_mu = 0.5 * (low + high);
    let mut mus_with_prior = observations.to_vec();
    mus_with_prior.push(prior_mu);

    let sorted_indices = argsort(&mus_with_prior);
    let sorted_mus: Vec<f64> = sorted_indices.iter().map(|&i| mus_with_prior[i]).collect();

    let mut fenced = Vec::with_capacity(sorted_mus.len() + 2);
    fenced.push(low);
    fenced.extend_from_slice(&sorted_mus);
    fenced.push(high);

    let mut sorted_sigmas: Vec<f64> = (0..sorted_mus.len())
        .map(|i| js_max(fenced[i + 1] - fenced[i], fenced[i + 2] - fenced[i + 1]))
        .collect();

    if !consider_endpoints && fenced.len() >= 4 {
        sorted_sigmas[0] = fenced[2] - fenced[1];
        let last = sorted_sigmas.len() - 1;
        sorted_sigmas[last] = fenced[fenced.len() - 2] - fenced[fenced.len() - 3];
    }

    let mut inverse = vec![0_usize; sorted_indices.len()];
    for (pos, &idx) in sorted_indices.iter().enumerate() {
        inverse[idx] = pos;
    }

    (0..observations.len())
        .map(|i| sorted_sigmas[inverse[i]])
        .collect()
}
