#![forbid(unsafe_code)]
#![deny(clippy::all)]
#![deny(unreachable_pub)]
#![deny(clippy::correctness)]
#![deny(clippy::suspicious)]
#![deny(clippy::style)]
#![deny(clippy::complexity)]
#![deny(clippy::perf)]
#![deny(clippy::pedantic)]
#![deny(clippy::std_instead_of_core)]

//! Tree-structured Parzen Estimator (TPE) sampler built around an explicit
//! ask/tell study loop. Sampling is fully deterministic for a fixed seed:
//! Mersenne Twister randomness, stable argsorts, and carefully ordered
//! floating-point arithmetic make runs reproducible down to the last bit, and
//! whole studies serialize to JSON snapshots that restore mid-run RNG state
//! exactly. Multi-objective studies are supported out of the box via
//! non-domination ranking, hypervolume subset selection, and
//! hypervolume-based observation weighting.
//!
//! # Getting Started
//!
//! Minimize a function with an ask/tell loop, no feature flags needed:
//!
//! ```
//! use tpe::prelude::*;
//!
//! fn main() -> tpe::Result<()> {
//!     let sampler = TpeSampler::builder().seed(42).build()?;
//!     let mut study = Study::new(sampler, Direction::Minimize);
//!
//!     for _ in 0..30 {
//!         let mut trial = study.ask();
//!         let x = trial.suggest_float("x", -10.0, 10.0)?;
//!         let number = trial.number();
//!         study.tell(number, (x - 3.0) * (x - 3.0))?;
//!     }
//!
//!     let best = study
//!         .trials()
//!         .iter()
//!         .filter_map(|t| t.value.map(|v| (t.number, v)))
//!         .min_by(|a, b| a.1.total_cmp(&b.1));
//!     println!("best: {best:?}");
//!     Ok(())
//! }
//! ```
//!
//! # Core Concepts
//!
//! | Type | Role |
//! |------|------|
//! | [`Study`] | Drive the ask/tell loop: create trials, record results, hold history. |
//! | [`Trial`] | Handle for one evaluation, suggesting parameter values on demand. |
//! | [`Distribution`] | A search-space domain: [`FloatDistribution`], [`IntDistribution`], [`CategoricalDistribution`]. |
//! | [`TpeSampler`](sampler::TpeSampler) | The sampling strategy: split history, fit Parzen mixtures, pick the acquisition argmax. |
//! | [`ParzenEstimator`](parzen::ParzenEstimator) | Weighted mixture of per-parameter kernels fitted over observations. |
//! | [`Direction`] | Whether the study minimizes or maximizes an objective. |
//!
//! # Feature Flags
//!
//! | Flag | What it enables | Default |
//! |------|----------------|---------|
//! | `tracing` | Structured log events via [`tracing`](https://docs.rs/tracing) at key sampling points | off |

/// Emit a `tracing::info!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_info {
    ($($arg:tt)*) => { tracing::info!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_info {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::debug!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_debug {
    ($($arg:tt)*) => { tracing::debug!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug {
    ($($arg:tt)*) => {};
}

/// Emit a `tracing::warn!` event when the `tracing` feature is enabled.
/// No-op otherwise.
#[cfg(feature = "tracing")]
macro_rules! trace_warn {
    ($($arg:tt)*) => { tracing::warn!($($arg)*) };
}

#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn {
    ($($arg:tt)*) => {};
}

mod distribution;
mod error;
pub mod multi_objective;
mod num_util;
mod param;
pub mod parzen;
mod rng;
pub mod sampler;
mod search_space;
mod sorting;
mod study;
mod trial;
pub mod truncnorm;
mod types;

pub use distribution::{
    CategoricalDistribution, Distribution, FloatDistribution, IntDistribution, SearchSpace,
};
pub use error::{Error, Result};
pub use param::ParamValue;
pub use rng::{Mt19937, Mt19937State};
pub use search_space::{GroupDecomposedSearchSpace, IntersectionSearchSpace, SearchSpaceGroup};
pub use study::{SamplerFunctions, Study, Trial};
pub use trial::{AttrValue, FrozenTrial, CONSTRAINTS_KEY, FIXED_PARAMS_KEY};
pub use types::{Direction, TrialState};

/// Convenient wildcard import for the most common types.
///
/// ```
/// use tpe::prelude::*;
/// ```
pub mod prelude {
    pub use crate::distribution::{
        CategoricalDistribution, Distribution, FloatDistribution, IntDistribution, SearchSpace,
    };
    pub use crate::error::{Error, Result};
    pub use crate::param::ParamValue;
    pub use crate::sampler::{Sampler, StudyView, TpeSampler, TpeSamplerBuilder};
    pub use crate::study::{SamplerFunctions, Study, Trial};
    pub use crate::trial::{AttrValue, FrozenTrial};
    pub use crate::types::{Direction, TrialState};
}
