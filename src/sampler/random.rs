//! Uniform random sampling over parameter distributions.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::distribution::{transform, untransform, Distribution, SearchSpace};
use crate::error::Result;
use crate::param::ParamValue;
use crate::rng::{clock_millis, Mt19937, Mt19937State};
use crate::sampler::{Sampler, StudyView};
use crate::trial::FrozenTrial;

/// Seed mixing constant applied when reseeding from the wall clock.
const RESEED_XOR: u32 = 0x9e37_79b9;

/// Samples every parameter uniformly at random, ignoring the trial history.
///
/// Serves as the startup-phase sampler of [`TpeSampler`]. Draws come from a
/// seeded Mersenne Twister, so two samplers built with the same seed suggest
/// identical values.
///
/// [`TpeSampler`]: crate::sampler::TpeSampler
pub(crate) struct RandomSampler {
    rng: Mutex<Mt19937>,
}

impl RandomSampler {
    /// Creates a sampler, seeded from the wall clock when `seed` is `None`.
    #[must_use]
    pub(crate) fn new(seed: Option<u32>) -> Self {
        let rng = match seed {
            Some(seed) => Mt19937::new(seed),
            None => Mt19937::from_clock(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    /// Copies out the generator state.
    #[must_use]
    pub(crate) fn rng_state(&self) -> Mt19937State {
        self.rng.lock().state()
    }

    /// Restores a previously captured generator state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotFormat`] for a malformed state vector.
    ///
    /// [`Error::SnapshotFormat`]: crate::Error::SnapshotFormat
    pub(crate) fn set_rng_state(&self, state: &Mt19937State) -> Result<()> {
        self.rng.lock().set_state(state)
    }
}

impl Sampler for RandomSampler {
    fn infer_relative_search_space(
        &self,
        _study: &StudyView<'_>,
        _trial: &FrozenTrial,
    ) -> SearchSpace {
        SearchSpace::new()
    }

    fn sample_relative(
        &self,
        _study: &StudyView<'_>,
        _trial: &mut FrozenTrial,
        _search_space: &SearchSpace,
    ) -> Result<BTreeMap<String, ParamValue>> {
        Ok(BTreeMap::new())
    }

    fn sample_independent(
        &self,
        _study: &StudyView<'_>,
        _trial: &FrozenTrial,
        _name: &str,
        distribution: &Distribution,
    ) -> Result<ParamValue> {
        sample_from_distribution(&mut self.rng.lock(), distribution)
    }

    fn reseed_rng(&self) {
        self.rng.lock().seed(clock_millis() ^ RESEED_XOR);
    }
}

/// Draws one value uniformly from the distribution's domain.
///
/// Numerical draws happen in the transformed coordinate (log space for
/// log-scale parameters, half-step widened bounds for grids) and map back
/// through the distribution, so every admissible value is reachable.
///
/// # Errors
///
/// Returns an error when the drawn internal value cannot be converted to an
/// external one.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn sample_from_distribution(
    rng: &mut Mt19937,
    distribution: &Distribution,
) -> Result<ParamValue> {
    match distribution {
        Distribution::Categorical(d) => {
            let mut best_idx = 0_usize;
            let mut best_value = rng.uniform(0.0, 1.0);
            for i in 1..d.choices().len() {
                let v = rng.uniform(0.0, 1.0);
                if v > best_value {
                    best_value = v;
                    best_idx = i;
                }
            }
            d.to_external(best_idx as f64)
        }
        Distribution::Float(d) => {
            let (low, high) = match d.step() {
                Some(step) => {
                    let half = 0.5 * step;
                    (
                        transform(d.low(), distribution, true) - half,
                        transform(d.high(), distribution, true) + half,
                    )
                }
                None => (
                    transform(d.low(), distribution, true),
                    transform(d.high(), distribution, true),
                ),
            };
            let drawn = rng.uniform(low, high);
            Ok(ParamValue::Float(untransform(drawn, distribution, true)))
        }
        Distribution::Int(d) => {
            let half = 0.5 * d.step() as f64;
            let (low, high) = if d.log_scale() {
                (
                    transform(d.low() as f64 - half, distribution, true),
                    transform(d.high() as f64 + half, distribution, true),
                )
            } else {
                (
                    transform(d.low() as f64, distribution, true) - half,
                    transform(d.high() as f64, distribution, true) + half,
                )
            };
            let drawn = rng.uniform(low, high);
            Ok(ParamValue::Int(
                untransform(drawn, distribution, true).trunc() as i64,
            ))
        }
    }
}
