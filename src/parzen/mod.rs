//! Parzen estimators: weighted mixtures of per-parameter kernels fitted
//! over past observations.
//!
//! The sampler fits one estimator over the promising trials and one over
//! the rest, then ranks candidates by the log density ratio of the two.
//! Numerical parameters get truncated normal kernels (log-transformed and
//! discretized variants included), categorical parameters get weighted
//! index distributions. Kernel weights decay with observation age by
//! default and always include a wide prior kernel.

mod estimator;
mod mixture;

pub use estimator::{EstimatorParams, ParzenEstimator};
pub use mixture::{ColumnDistribution, MixtureOfProductDistribution};

use crate::error::{Error, Result};

/// Weight function type: maps the observation count to per-observation
/// kernel weights.
pub type WeightsFn = dyn Fn(usize) -> Vec<f64> + Send + Sync;

/// Default split point: a tenth of the trials, capped at 25.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn default_gamma(n: usize) -> usize {
    core::cmp::min((0.1 * n as f64).ceil() as usize, 25)
}

/// Default kernel weights: a linear ramp over older observations and flat
/// weight one over the 25 most recent.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn default_weights(n: usize) -> Vec<f64> {
    if n == 0 {
        return Vec::new();
    }
    if n < 25 {
        return vec![1.0; n];
    }
    let n_ramp = n - 25;
    let base = 1.0 / n as f64;
    let mut weights = Vec::with_capacity(n);
    if n_ramp == 1 {
        weights.push(base);
    } else {
        for i in 0..n_ramp {
            weights.push(base + (1.0 - base) * i as f64 / (n_ramp - 1) as f64);
        }
    }
    weights.extend(core::iter::repeat(1.0).take(25));
    weights
}

/// Invokes a weight function and validates its output.
///
/// The result is truncated to `n` entries; extra entries are ignored.
///
/// # Errors
///
/// Returns [`Error::InvalidWeights`] when the function produces negative,
/// non-finite, or all-zero weights.
pub fn call_weights_func(weights_func: &WeightsFn, n: usize) -> Result<Vec<f64>> {
    let mut weights = weights_func(n);
    weights.truncate(n);
    for &value in &weights {
        if value < 0.0 {
            return Err(Error::InvalidWeights {
                reason: "negative values",
            });
        }
        if !value.is_finite() {
            return Err(Error::InvalidWeights {
                reason: "non-finite values",
            });
        }
    }
    if !weights.is_empty() {
        let sum: f64 = weights.iter().sum();
        if sum <= 0.0 {
            return Err(Error::InvalidWeights {
                reason: "all-zero values",
            });
        }
    }
    Ok(weights)
}
