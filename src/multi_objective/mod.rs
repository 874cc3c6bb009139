//! Multi-objective machinery behind the sampler.
//!
//! Objective vectors are handled as loss vectors where smaller is better;
//! maximized objectives get negated on the way in. [`pareto`] ranks loss
//! vectors by non-domination, [`hypervolume`] measures dominated volume
//! against a reference point, [`hssp`] greedily picks the subset of a front
//! that keeps the most hypervolume, and [`split`] combines the three to
//! partition trial history for the density estimators.

pub mod hssp;
pub mod hypervolume;
pub mod pareto;
pub mod split;

pub use hssp::{get_reference_point, solve_hssp};
pub use hypervolume::compute_hypervolume;
pub use pareto::{calculate_nondomination_rank, fast_non_domination_rank, is_pareto_front};
pub use split::{calculate_weights_below_for_multi_objective, split_trials};
