//! Product-of-columns mixture distribution shared by the density
//! estimators.

use std::collections::BTreeMap;

use crate::num_util::{clip, round_to_nearest_even};
use crate::rng::Mt19937;
use crate::truncnorm::{log_gauss_mass, truncnorm_logpdf, truncnorm_ppf};

/// Kernel family fitted for one parameter column.
///
/// Numerical variants keep the untransformed domain bounds; log and
/// half-step adjustments are applied where the kernels are evaluated.
#[derive(Clone, Debug)]
pub enum ColumnDistribution {
    /// Per-kernel choice weights, one row per kernel.
    Categorical {
        /// Rows of choice probabilities, each row summing to one.
        weights: Vec<Vec<f64>>,
    },
    /// Truncated normal kernels on a linear domain.
    TruncNorm {
        /// Kernel centers, prior kernel last.
        mu: Vec<f64>,
        /// Kernel widths, prior kernel last.
        sigma: Vec<f64>,
        /// Domain lower bound.
        low: f64,
        /// Domain upper bound.
        high: f64,
    },
    /// Truncated normal kernels on a log-transformed domain.
    TruncLogNorm {
        /// Kernel centers in log space, prior kernel last.
        mu: Vec<f64>,
        /// Kernel widths in log space, prior kernel last.
        sigma: Vec<f64>,
        /// Domain lower bound, untransformed.
        low: f64,
        /// Domain upper bound, untransformed.
        high: f64,
    },
    /// Truncated normal kernels over a linear step grid.
    DiscreteTruncNorm {
        /// Kernel centers, prior kernel last.
        mu: Vec<f64>,
        /// Kernel widths, prior kernel last.
        sigma: Vec<f64>,
        /// Grid lower bound.
        low: f64,
        /// Grid upper bound.
        high: f64,
        /// Grid step.
        step: f64,
    },
    /// Truncated normal kernels over a log-transformed step grid.
    DiscreteTruncLogNorm {
        /// Kernel centers in log space, prior kernel last.
        mu: Vec<f64>,
        /// Kernel widths in log space, prior kernel last.
        sigma: Vec<f64>,
        /// Grid lower bound, untransformed.
        low: f64,
        /// Grid upper bound, untransformed.
        high: f64,
        /// Grid step, untransformed.
        step: f64,
    },
}

struct ActiveNumeric<'a> {
    col: usize,
    mu: &'a [f64],
    sigma: &'a [f64],
    low: f64,
    high: f64,
}

/// Mixture over kernel indices whose columns factorize per parameter.
///
/// Every kernel index selects one row of every column, so a draw picks a
/// kernel first and then samples each column conditioned on it.
#[derive(Clone, Debug)]
pub struct MixtureOfProductDistribution {
    weights: Vec<f64>,
    columns: Vec<(String, ColumnDistribution)>,
}

impl MixtureOfProductDistribution {
    /// Creates a mixture from normalized kernel weights and named columns.
    #[must_use]
    pub fn new(weights: Vec<f64>, columns: Vec<(String, ColumnDistribution)>) -> Self {
        Self { weights, columns }
    }

    /// Normalized kernel weights, prior kernel last.
    #[must_use]
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Fitted columns in parameter-name order.
    #[must_use]
    pub fn columns(&self) -> &[(String, ColumnDistribution)] {
        &self.columns
    }

    /// Draws `batch_size` joint samples in the internal representation.
    ///
    /// The RNG consumption order is fixed: one weighted batch of kernel
    /// indices, then one quantile batch per categorical column, then one
    /// quantile per row for each numerical column.
    #[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
    pub fn sample(&self, rng: &mut Mt19937, batch_size: usize) -> BTreeMap<String, Vec<f64>> {
        let active = rng.choice_weighted(&self.weights, batch_size);
        let mut ret = vec![vec![0.0; self.columns.len()]; batch_size];

        let mut numeric: Vec<ActiveNumeric> = Vec::new();
        let mut log_cols: Vec<usize> = Vec::new();
        let mut disc_cols: Vec<(usize, f64, f64, f64)> = Vec::new();

        for (col, (_, dist)) in self.columns.iter().enumerate() {
            match dist {
                ColumnDistribution::Categorical { weights } => {
                    let quantiles = rng.random_samples(batch_size);
                    for (row, out) in ret.iter_mut().enumerate() {
                        let kernel_weights = &weights[active[row]];
                        let mut cum = 0.0;
                        let mut choice = 0;
                        while choice < kernel_weights.len() {
                            cum += kernel_weights[choice];
                            if choice == kernel_weights.len() - 1 {
                                cum = 1.0;
                            }
                            if !(cum < quantiles[row]) {
                                break;
                            }
                            choice += 1;
                        }
                        out[col] = choice as f64;
                    }
                }
                ColumnDistribution::TruncNorm {
                    mu,
                    sigma,
                    low,
                    high,
                } => {
                    numeric.push(ActiveNumeric {
                        col,
                        mu,
                        sigma,
                        low: *low,
                        high: *high,
                    });
                }
                ColumnDistribution::TruncLogNorm {
                    mu,
                    sigma,
                    low,
                    high,
                } => {
                    numeric.push(ActiveNumeric {
                        col,
                        mu,
                        sigma,
                        low: low.ln(),
                        high: high.ln(),
                    });
                    log_cols.push(col);
                }
                ColumnDistribution::DiscreteTruncNorm {
                    mu,
                    sigma,
                    low,
                    high,
                    step,
                } => {
                    numeric.push(ActiveNumeric {
                        col,
                        mu,
                        sigma,
                        low: low - step / 2.0,
                        high: high + step / 2.0,
                    });
                    disc_cols.push((col, *low, *high, *step));
                }
                ColumnDistribution::DiscreteTruncLogNorm {
                    mu,
                    sigma,
                    low,
                    high,
                    step,
                } => {
                    numeric.push(ActiveNumeric {
                        col,
                        mu,
                        sigma,
                        low: (low - step / 2.0).ln(),
                        high: (high + step / 2.0).ln(),
                    });
                    log_cols.push(col);
                    disc_cols.push((col, *low, *high, *step));
                }
            }
        }

        for num in &numeric {
            for (out, &kernel) in ret.iter_mut().zip(&active) {
                let mu = num.mu[kernel];
                let sigma = num.sigma[kernel];
                let a = (num.low - mu) / sigma;
                let b = (num.high - mu) / sigma;
                let q = rng.random_sample();
                out[num.col] = truncnorm_ppf(q, a, b) * sigma + mu;
            }
        }

        for &col in &log_cols {
            for out in &mut ret {
                out[col] = out[col].exp();
            }
        }

        for &(col, low, high, step) in &disc_cols {
            for out in &mut ret {
                let rounded = low + round_to_nearest_even((out[col] - low) / step) * step;
                out[col] = clip(rounded, low, high);
            }
        }

        let mut result = BTreeMap::new();
        for (col, (name, _)) in self.columns.iter().enumerate() {
            result.insert(name.clone(), ret.iter().map(|row| row[col]).collect());
        }
        result
    }

    /// Log density of each sample under the mixture.
    ///
    /// Missing or short sample columns poison the affected entries with
    /// NaN rather than failing.
    #[must_use]
    #[allow(clippy::float_cmp, clippy::too_many_lines)]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn log_pdf(&self, samples: &BTreeMap<String, Vec<f64>>) -> Vec<f64> {
        let Some((first_name, _)) = self.columns.first() else {
            return Vec::new();
        };
        let n_samples = samples.get(first_name).map_or(0, Vec::len);
        let n_weights = self.weights.len();
        let mut out = Vec::with_capacity(n_samples);

        for s in 0..n_samples {
            let mut weighted = vec![0.0; n_weights];

            for (name, dist) in &self.columns {
                let x = samples
                    .get(name)
                    .and_then(|col| col.get(s))
                    .copied()
                    .unwrap_or(f64::NAN);

                match dist {
                    ColumnDistribution::Categorical { weights } => {
                        let idx = x.trunc() as usize;
                        for (acc, kernel_weights) in weighted.iter_mut().zip(weights) {
                            *acc += kernel_weights.get(idx).copied().unwrap_or(f64::NAN).ln();
                        }
                    }
                    ColumnDistribution::TruncNorm {
                        mu,
                        sigma,
                        low,
                        high,
                    } => {
                        for ((acc, &m), &sg) in weighted.iter_mut().zip(mu).zip(sigma) {
                            let a = (low - m) / sg;
                            let b = (high - m) / sg;
                            *acc += truncnorm_logpdf(x, a, b, m, sg);
                        }
                    }
                    ColumnDistribution::TruncLogNorm {
                        mu,
                        sigma,
                        low,
                        high,
                    } => {
                        let log_x = x.ln();
                        let log_low = low.ln();
                        let log_high = high.ln();
                        for ((acc, &m), &sg) in weighted.iter_mut().zip(mu).zip(sigma) {
                            let a = (log_low - m) / sg;
                            let b = (log_high - m) / sg;
                            *acc += truncnorm_logpdf(log_x, a, b, m, sg);
                        }
                    }
                    ColumnDistribution::DiscreteTruncNorm {
                        mu,
                        sigma,
                        low,
                        high,
                        step,
                    } => {
                        let half = step / 2.0;
                        for ((acc, &m), &sg) in weighted.iter_mut().zip(mu).zip(sigma) {
                            let total_mass =
                                log_gauss_mass((low - half - m) / sg, (high + half - m) / sg);
                            let x_mass = log_gauss_mass((x - half - m) / sg, (x + half - m) / sg);
                            *acc += x_mass - total_mass;
                        }
                    }
                    ColumnDistribution::DiscreteTruncLogNorm {
                        mu,
                        sigma,
                        low,
                        high,
                        step,
                    } => {
                        let half = step / 2.0;
                        let log_x_minus = (x - half).ln();
                        let log_x_plus = (x + half).ln();
                        let log_low_minus = (low - half).ln();
                        let log_high_plus = (high + half).ln();
                        for ((acc, &m), &sg) in weighted.iter_mut().zip(mu).zip(sigma) {
                            let total_mass = log_gauss_mass(
                                (log_low_minus - m) / sg,
                                (log_high_plus - m) / sg,
                            );
                            let x_mass =
                                log_gauss_mass((log_x_minus - m) / sg, (log_x_plus - m) / sg);
                            *acc += x_mass - total_mass;
                        }
                    }
                }
            }

            for (acc, &w) in weighted.iter_mut().zip(&self.weights) {
                *acc += w.ln();
            }

            let mut max_value = f64::NEG_INFINITY;
            for &v in &weighted {
                if v > max_value {
                    max_value = v;
                }
            }
            if max_value == f64::NEG_INFINITY {
                max_value = 0.0;
            }

            let sum_exp: f64 = weighted.iter().map(|&v| (v - max_value).exp()).sum();
            out.push(sum_exp.ln() + max_value);
        }

        out
    }
}
