//! Partitioning of trial history into the "below" and "above" halves that
//! feed the two density estimators.
//!
//! Complete trials are split by objective quality, pruned trials by how
//! deep and how well they ran before pruning, and infeasible trials by
//! total constraint violation. The budget cascades through those groups in
//! that order; running trials always land above.

use core::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::multi_objective::hssp::{get_reference_point, solve_hssp};
use crate::multi_objective::hypervolume::{compute_hypervolume, inclusive_volume};
use crate::multi_objective::pareto::{fast_non_domination_rank, is_pareto_front};
use crate::num_util::{js_max, EPS};
use crate::sampler::ConstraintsFunc;
use crate::trial::FrozenTrial;
use crate::types::{Direction, TrialState};

/// Objective values as losses: maximized objectives are negated.
fn normalized_losses(trial: &FrozenTrial, directions: &[Direction]) -> Vec<f64> {
    trial
        .values
        .as_deref()
        .unwrap_or_default()
        .iter()
        .zip(directions)
        .map(|(v, d)| match d {
            Direction::Minimize => *v,
            Direction::Maximize => -*v,
        })
        .collect()
}

fn split_complete_single<'a>(
    trials: &[&'a FrozenTrial],
    direction: Direction,
    n_below: usize,
) -> (Vec<&'a FrozenTrial>, Vec<&'a FrozenTrial>) {
    let mut sorted = trials.to_vec();
    sorted.sort_by(|a, b| {
        let x = a.value.unwrap_or(f64::NAN);
        let y = b.value.unwrap_or(f64::NAN);
        let ord = x.partial_cmp(&y).unwrap_or(Ordering::Equal);
        match direction {
            Direction::Minimize => ord,
            Direction::Maximize => ord.reverse(),
        }
    });
    let above = sorted.split_off(n_below.min(sorted.len()));
    (sorted, above)
}

#[allow(clippy::cast_possible_wrap)]
fn split_complete_multi<'a>(
    trials: &[&'a FrozenTrial],
    directions: &[Direction],
    n_below: usize,
) -> Result<(Vec<&'a FrozenTrial>, Vec<&'a FrozenTrial>)> {
    if n_below == 0 {
        return Ok((Vec::new(), trials.to_vec()));
    }
    if n_below == trials.len() {
        return Ok((trials.to_vec(), Vec::new()));
    }

    let lvals: Vec<Vec<f64>> = trials
        .iter()
        .map(|t| normalized_losses(t, directions))
        .collect();
    let ranks = fast_non_domination_rank(&lvals, None, Some(n_below as i64))?;

    // Take whole ranks while they fit the budget, then tie-break the next
    // rank by hypervolume subset selection.
    let mut rank_counts: BTreeMap<usize, usize> = BTreeMap::new();
    for &r in &ranks {
        *rank_counts.entry(r).or_insert(0) += 1;
    }
    let mut cum = 0;
    let mut last_full_rank: Option<usize> = None;
    for (&r, &count) in &rank_counts {
        cum += count;
        if cum <= n_below {
            last_full_rank = Some(r);
        }
    }

    let mut indices_below: Vec<usize> = (0..ranks.len())
        .filter(|&i| last_full_rank.is_some_and(|lr| ranks[i] <= lr))
        .collect();

    if indices_below.len() < n_below {
        let need_rank = last_full_rank.map_or(0, |lr| lr + 1);
        let need_indices: Vec<usize> =
            (0..ranks.len()).filter(|&i| ranks[i] == need_rank).collect();
        let rank_loss_vals: Vec<Vec<f64>> =
            need_indices.iter().map(|&i| lvals[i].clone()).collect();
        let subset_size = n_below - indices_below.len();
        let reference_point = get_reference_point(&rank_loss_vals);
        let selected = solve_hssp(&rank_loss_vals, &need_indices, subset_size, &reference_point)?;
        indices_below.extend(selected);
    }

    let below_set: BTreeSet<usize> = indices_below.into_iter().collect();
    let mut below = Vec::new();
    let mut above = Vec::new();
    for (i, t) in trials.iter().enumerate() {
        if below_set.contains(&i) {
            below.push(*t);
        } else {
            above.push(*t);
        }
    }
    Ok((below, above))
}

/// Score of a pruned trial: earlier component prefers deeper runs, later
/// component prefers better last reported values. NaN reports count as the
/// worst value at their step; trials without reports rank behind every
/// reported trial.
fn pruned_trial_score(trial: &FrozenTrial, direction: Direction) -> (f64, f64) {
    let mut entries: Vec<(f64, f64)> = trial
        .intermediate_values
        .iter()
        .map(|(k, v)| (k.parse::<f64>().unwrap_or(f64::NAN), *v))
        .collect();
    if entries.is_empty() {
        return (1.0, 0.0);
    }
    entries.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let (step, value) = entries[entries.len() - 1];
    if value.is_nan() {
        return (-step, f64::INFINITY);
    }
    match direction {
        Direction::Minimize => (-step, value),
        Direction::Maximize => (-step, -value),
    }
}

fn split_pruned<'a>(
    trials: &[&'a FrozenTrial],
    direction: Direction,
    n_below: usize,
) -> (Vec<&'a FrozenTrial>, Vec<&'a FrozenTrial>) {
    let clipped = n_below.min(trials.len());
    let mut scored: Vec<((f64, f64), &'a FrozenTrial)> = trials
        .iter()
        .map(|&t| (pruned_trial_score(t, direction), t))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut below: Vec<&'a FrozenTrial> = scored.into_iter().map(|(_, t)| t).collect();
    let above = below.split_off(clipped);
    (below, above)
}

/// Total positive constraint violation, or infinity when the trial has no
/// usable constraint record.
fn infeasible_trial_score(trial: &FrozenTrial) -> f64 {
    match trial.constraint_values() {
        Some(Some(values)) => values.iter().filter(|v| **v > 0.0).sum(),
        _ => f64::INFINITY,
    }
}

fn split_infeasible<'a>(
    trials: &[&'a FrozenTrial],
    n_below: usize,
) -> (Vec<&'a FrozenTrial>, Vec<&'a FrozenTrial>) {
    let clipped = n_below.min(trials.len());
    let mut scored: Vec<(f64, &'a FrozenTrial)> = trials
        .iter()
        .map(|&t| (infeasible_trial_score(t), t))
        .collect();
    scored.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    let mut below: Vec<&'a FrozenTrial> = scored.into_iter().map(|(_, t)| t).collect();
    let above = below.split_off(clipped);
    (below, above)
}

/// Splits trials into the promising "below" half and the rest.
///
/// At most `n_below` trials go below, preferring complete trials, then
/// pruned ones, then infeasible ones; running trials always go above. Both
/// halves come back ordered by trial number.
///
/// # Errors
///
/// Returns [`Error::UnexpectedTrialState`] for failed or waiting trials and
/// propagates ranking errors from the multi-objective split.
pub fn split_trials<'a>(
    directions: &[Direction],
    trials: &[&'a FrozenTrial],
    n_below: usize,
    constraints_enabled: bool,
) -> Result<(Vec<&'a FrozenTrial>, Vec<&'a FrozenTrial>)> {
    let mut complete = Vec::new();
    let mut pruned = Vec::new();
    let mut running = Vec::new();
    let mut infeasible = Vec::new();

    for &trial in trials {
        if trial.state == TrialState::Running {
            running.push(trial);
        } else if constraints_enabled && infeasible_trial_score(trial) > 0.0 {
            infeasible.push(trial);
        } else {
            match trial.state {
                TrialState::Complete => complete.push(trial),
                TrialState::Pruned => pruned.push(trial),
                state => return Err(Error::UnexpectedTrialState(state)),
            }
        }
    }

    let direction = directions.first().copied().unwrap_or(Direction::Minimize);
    let clipped = n_below.min(complete.len());
    let (below_complete, above_complete) = if directions.len() <= 1 {
        split_complete_single(&complete, direction, clipped)
    } else {
        split_complete_multi(&complete, directions, clipped)?
    };

    let mut remaining = n_below.saturating_sub(below_complete.len());
    let (below_pruned, above_pruned) = split_pruned(&pruned, direction, remaining);
    remaining = remaining.saturating_sub(below_pruned.len());
    let (below_infeasible, above_infeasible) = split_infeasible(&infeasible, remaining);

    let mut below = [below_complete, below_pruned, below_infeasible].concat();
    below.sort_by_key(|t| t.number);
    let mut above = [above_complete, above_pruned, above_infeasible, running].concat();
    above.sort_by_key(|t| t.number);
    Ok((below, above))
}

/// Per-trial kernel weights for the below half of a multi-objective study.
///
/// Feasible trials are weighted by their hypervolume contribution relative
/// to the best contributor; infeasible and non-contributing trials get a
/// small positive floor so every kernel stays usable.
///
/// # Errors
///
/// Propagates hypervolume errors from the contribution computation.
pub fn calculate_weights_below_for_multi_objective(
    directions: &[Direction],
    below_trials: &[&FrozenTrial],
    constraints_func: Option<&ConstraintsFunc>,
) -> Result<Vec<f64>> {
    let feasible_mask: Vec<bool> = below_trials
        .iter()
        .map(|t| constraints_func.map_or(true, |f| f(t).iter().all(|c| *c <= 0.0)))
        .collect();

    let mut weights: Vec<f64> = feasible_mask
        .iter()
        .map(|&ok| if ok { 1.0 } else { EPS })
        .collect();
    let feasible: Vec<usize> = (0..feasible_mask.len())
        .filter(|&i| feasible_mask[i])
        .collect();
    if feasible.len() <= 1 {
        return Ok(weights);
    }

    let lvals: Vec<Vec<f64>> = feasible
        .iter()
        .map(|&i| normalized_losses(below_trials[i], directions))
        .collect();
    let reference_point = get_reference_point(&lvals);
    let on_front = is_pareto_front(&lvals, false);
    let pareto_sols: Vec<Vec<f64>> = lvals
        .iter()
        .zip(&on_front)
        .filter(|(_, &f)| f)
        .map(|(row, _)| row.clone())
        .collect();
    let hv = compute_hypervolume(&pareto_sols, &reference_point, true)?;
    if !hv.is_finite() {
        return Ok(weights);
    }

    let mut contribs = vec![0.0; feasible.len()];
    if directions.len() <= 3 {
        let front_indices: Vec<usize> = (0..on_front.len()).filter(|&i| on_front[i]).collect();
        for (pos, &fi) in front_indices.iter().enumerate() {
            let leave_one_out: Vec<Vec<f64>> = pareto_sols
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != pos)
                .map(|(_, row)| row.clone())
                .collect();
            let hv_loo = compute_hypervolume(&leave_one_out, &reference_point, true)?;
            contribs[fi] = hv - hv_loo;
        }
    } else {
        for (c, row) in contribs.iter_mut().zip(&lvals) {
            *c = inclusive_volume(row, &reference_point);
        }
    }

    let mut max_contrib = EPS;
    for &c in &contribs {
        if c > max_contrib {
            max_contrib = c;
        }
    }
    for (&i, &c) in feasible.iter().zip(&contribs) {
        weights[i] = js_max(c / max_contrib, EPS);
    }
    Ok(weights)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use approx::assert_relative_eq;

    use super::*;
    use crate::trial::{AttrValue, CONSTRAINTS_KEY};

    fn completed(number: usize, value: f64) -> FrozenTrial {
        let mut t = FrozenTrial::new(number);
        t.state = TrialState::Complete;
        t.value = Some(value);
        t
    }

    fn completed_multi(number: usize, values: Vec<f64>) -> FrozenTrial {
        let mut t = FrozenTrial::new(number);
        t.state = TrialState::Complete;
        t.values = Some(values);
        t
    }

    fn numbers(trials: &[&FrozenTrial]) -> Vec<usize> {
        trials.iter().map(|t| t.number).collect()
    }

    #[test]
    fn test_split_single_objective_minimize() {
        let owned: Vec<FrozenTrial> = [5.0, 1.0, 4.0, 2.0, 3.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| completed(i, v))
            .collect();
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let (below, above) = split_trials(&[Direction::Minimize], &trials, 2, false).unwrap();
        assert_eq!(numbers(&below), vec![1, 3]);
        assert_eq!(numbers(&above), vec![0, 2, 4]);
    }

    #[test]
    fn test_split_single_objective_maximize() {
        let owned: Vec<FrozenTrial> = [5.0, 1.0, 4.0]
            .iter()
            .enumerate()
            .map(|(i, &v)| completed(i, v))
            .collect();
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let (below, above) = split_trials(&[Direction::Maximize], &trials, 1, false).unwrap();
        assert_eq!(numbers(&below), vec![0]);
        assert_eq!(numbers(&above), vec![1, 2]);
    }

    #[test]
    fn test_running_trials_always_go_above() {
        let mut owned = vec![completed(0, 1.0), completed(1, 2.0)];
        owned.push(FrozenTrial::new(2));
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let (below, above) = split_trials(&[Direction::Minimize], &trials, 5, false).unwrap();
        assert_eq!(numbers(&below), vec![0, 1]);
        assert_eq!(numbers(&above), vec![2]);
    }

    #[test]
    fn test_unexpected_state_is_rejected() {
        let mut t = FrozenTrial::new(0);
        t.state = TrialState::Fail;
        let trials = [&t];
        assert!(matches!(
            split_trials(&[Direction::Minimize], &trials, 1, false),
            Err(Error::UnexpectedTrialState(TrialState::Fail))
        ));
    }

    #[test]
    fn test_budget_cascades_from_complete_to_pruned() {
        let mut pruned_deep = FrozenTrial::new(1);
        pruned_deep.state = TrialState::Pruned;
        pruned_deep
            .intermediate_values
            .insert("10".to_owned(), 0.5);
        let mut pruned_shallow = FrozenTrial::new(2);
        pruned_shallow.state = TrialState::Pruned;
        pruned_shallow
            .intermediate_values
            .insert("2".to_owned(), 0.1);
        let owned = vec![completed(0, 3.0), pruned_deep, pruned_shallow];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();

        let (below, above) = split_trials(&[Direction::Minimize], &trials, 2, false).unwrap();
        // The deeper pruned run wins the remaining slot.
        assert_eq!(numbers(&below), vec![0, 1]);
        assert_eq!(numbers(&above), vec![2]);
    }

    #[test]
    fn test_pruned_without_reports_ranks_last() {
        let mut with_report = FrozenTrial::new(0);
        with_report.state = TrialState::Pruned;
        with_report.intermediate_values.insert("1".to_owned(), 7.0);
        let mut without_report = FrozenTrial::new(1);
        without_report.state = TrialState::Pruned;
        let owned = vec![with_report, without_report];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();

        let (below, _) = split_trials(&[Direction::Minimize], &trials, 1, false).unwrap();
        assert_eq!(numbers(&below), vec![0]);
    }

    #[test]
    fn test_infeasible_trials_split_by_violation() {
        let mut nearly = completed(0, 9.0);
        nearly
            .system_attrs
            .insert(CONSTRAINTS_KEY.to_owned(), AttrValue::FloatVec(vec![0.5]));
        let mut badly = completed(1, 1.0);
        badly
            .system_attrs
            .insert(CONSTRAINTS_KEY.to_owned(), AttrValue::FloatVec(vec![4.0]));
        let owned = vec![nearly, badly];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();

        let (below, above) = split_trials(&[Direction::Minimize], &trials, 1, true).unwrap();
        assert_eq!(numbers(&below), vec![0]);
        assert_eq!(numbers(&above), vec![1]);
    }

    #[test]
    fn test_multi_objective_tie_break_uses_hypervolume() {
        let owned = vec![
            completed_multi(0, vec![1.0, 1.0]),
            completed_multi(1, vec![1.0, 5.0]),
            completed_multi(2, vec![5.0, 1.0]),
            completed_multi(3, vec![2.0, 2.0]),
        ];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let directions = [Direction::Minimize, Direction::Minimize];

        let (below, above) = split_trials(&directions, &trials, 2, false).unwrap();
        // Rank zero holds only trial 0; among the rank-one ties the
        // balanced point covers the most hypervolume.
        assert_eq!(numbers(&below), vec![0, 3]);
        assert_eq!(numbers(&above), vec![1, 2]);
    }

    #[test]
    fn test_weights_below_follow_hypervolume_contributions() {
        let owned = vec![
            completed_multi(0, vec![1.0, 3.0]),
            completed_multi(1, vec![3.0, 1.0]),
            completed_multi(2, vec![2.0, 2.0]),
            completed_multi(3, vec![10.0, 10.0]),
        ];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let directions = [Direction::Minimize, Direction::Minimize];

        let weights =
            calculate_weights_below_for_multi_objective(&directions, &trials, None).unwrap();
        assert_relative_eq!(weights[0], 1.0, max_relative = 1e-9);
        assert_relative_eq!(weights[1], 1.0, max_relative = 1e-9);
        assert_relative_eq!(weights[2], 0.125, max_relative = 1e-9);
        assert_eq!(weights[3], EPS);
    }

    #[test]
    fn test_weights_below_floor_infeasible_trials() {
        let owned = vec![
            completed_multi(0, vec![1.0, 2.0]),
            completed_multi(1, vec![2.0, 1.0]),
        ];
        let trials: Vec<&FrozenTrial> = owned.iter().collect();
        let directions = [Direction::Minimize, Direction::Minimize];
        let constraints: &ConstraintsFunc =
            &|t: &FrozenTrial| if t.number == 0 { vec![1.0] } else { vec![-1.0] };

        let weights =
            calculate_weights_below_for_multi_objective(&directions, &trials, Some(constraints))
                .unwrap();
        assert_eq!(weights, vec![EPS, 1.0]);
    }
}
