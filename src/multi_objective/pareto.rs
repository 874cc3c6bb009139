//! Pareto-front extraction and non-domination ranking over loss rows.

use core::cmp::Ordering;

use crate::error::{Error, Result};

/// Compares two loss rows lexicographically. Coordinates where either side
/// is NaN compare as equal and the scan moves on.
pub(crate) fn compare_rows_lex(a: &[f64], b: &[f64]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.partial_cmp(y) {
            Some(Ordering::Less) => return Ordering::Less,
            Some(Ordering::Greater) => return Ordering::Greater,
            _ => {}
        }
    }
    Ordering::Equal
}

/// Deduplicated rows in lexicographic order, plus the index of each input
/// row's representative in the unique list.
pub(crate) struct UniqueSortedRows {
    pub(crate) unique: Vec<Vec<f64>>,
    pub(crate) inverse: Vec<usize>,
}

pub(crate) fn unique_sorted_rows_with_inverse(rows: &[Vec<f64>]) -> UniqueSortedRows {
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| compare_rows_lex(&rows[a], &rows[b]));

    let mut unique: Vec<Vec<f64>> = Vec::new();
    let mut inverse = vec![0; rows.len()];
    for &idx in &order {
        let row = &rows[idx];
        let is_new = unique
            .last()
            .map_or(true, |last| compare_rows_lex(row, last) != Ordering::Equal);
        if is_new {
            unique.push(row.clone());
        }
        inverse[idx] = unique.len() - 1;
    }
    UniqueSortedRows { unique, inverse }
}

/// Running-minimum sweep over rows sorted by the first objective.
fn pareto_front_2d(rows: &[Vec<f64>]) -> Vec<bool> {
    let mut on_front = vec![true; rows.len()];
    let mut current_min = rows[0][1];
    for (i, row) in rows.iter().enumerate().skip(1) {
        let v = row[1];
        on_front[i] = v < current_min;
        if v < current_min {
            current_min = v;
        }
    }
    on_front
}

/// Iterative peel for three or more objectives. The first objective is
/// already encoded in the lexicographic order, so only the tail coordinates
/// are compared.
fn pareto_front_nd(rows: &[Vec<f64>]) -> Vec<bool> {
    let tails: Vec<&[f64]> = rows.iter().map(|row| &row[1..]).collect();
    let mut on_front = vec![false; tails.len()];
    let mut remaining: Vec<usize> = (0..tails.len()).collect();

    while let Some(&best) = remaining.first() {
        on_front[best] = true;
        remaining.retain(|&idx| tails[idx].iter().zip(tails[best]).any(|(v, b)| v < b));
    }
    on_front
}

fn pareto_front_unique_sorted(rows: &[Vec<f64>]) -> Vec<bool> {
    match rows[0].len() {
        1 => {
            let mut on_front = vec![false; rows.len()];
            on_front[0] = true;
            on_front
        }
        2 => pareto_front_2d(rows),
        _ => pareto_front_nd(rows),
    }
}

/// Flags the rows lying on the Pareto front of a minimization problem.
///
/// With `assume_unique_lexsorted` the rows must already be deduplicated and
/// lexicographically sorted; otherwise they are deduplicated here and the
/// flags are mapped back onto the original positions, so duplicates of a
/// front row are all flagged.
#[must_use]
pub fn is_pareto_front(rows: &[Vec<f64>], assume_unique_lexsorted: bool) -> Vec<bool> {
    if rows.is_empty() {
        return Vec::new();
    }
    if assume_unique_lexsorted {
        return pareto_front_unique_sorted(rows);
    }
    let UniqueSortedRows { unique, inverse } = unique_sorted_rows_with_inverse(rows);
    let unique_on_front = pareto_front_unique_sorted(&unique);
    inverse.into_iter().map(|i| unique_on_front[i]).collect()
}

/// Dense 0-based ranks of scalar values, equal values sharing a rank.
#[allow(clippy::float_cmp)]
fn dense_value_ranks(loss_values: &[Vec<f64>]) -> Vec<usize> {
    let values: Vec<f64> = loss_values.iter().map(|row| row[0]).collect();
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a == b);
    values
        .iter()
        .map(|v| sorted.partition_point(|u| u < v))
        .collect()
}

/// Assigns 0-based non-domination ranks by repeatedly peeling the Pareto
/// front.
///
/// Once at least `n_below` rows hold a final rank the peeling stops and all
/// remaining rows share the next rank; single-objective inputs always get
/// the full dense ranking. A non-positive budget short-circuits to all
/// zeros.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn calculate_nondomination_rank(loss_values: &[Vec<f64>], n_below: Option<i64>) -> Vec<usize> {
    if loss_values.is_empty() || n_below.is_some_and(|n| n <= 0) {
        return vec![0; loss_values.len()];
    }

    if loss_values[0].len() == 1 {
        return dense_value_ranks(loss_values);
    }

    let UniqueSortedRows { unique, inverse } = unique_sorted_rows_with_inverse(loss_values);
    let n_unique = unique.len();
    let clipped = n_below.unwrap_or(n_unique as i64).min(n_unique as i64);
    let mut ranks = vec![0; n_unique];
    let mut remaining: Vec<usize> = (0..n_unique).collect();
    let mut rank = 0;

    while ((n_unique - remaining.len()) as i64) < clipped {
        let rows: Vec<Vec<f64>> = remaining.iter().map(|&i| unique[i].clone()).collect();
        let on_front = is_pareto_front(&rows, true);
        let mut next = Vec::new();
        for (pos, &idx) in remaining.iter().enumerate() {
            if on_front[pos] {
                ranks[idx] = rank;
            } else {
                next.push(idx);
            }
        }
        remaining = next;
        rank += 1;
    }
    for idx in remaining {
        ranks[idx] = rank;
    }

    inverse.into_iter().map(|i| ranks[i]).collect()
}

/// Non-domination ranks with constraint-violation penalties layered in.
///
/// Feasible rows (penalty <= 0) are ranked by their losses, infeasible rows
/// come next ranked by total violation, and rows with a NaN penalty come
/// last ranked by their losses again. Each group starts one rank after the
/// worst rank of the previous group, and the `n_below` budget is consumed
/// group by group.
///
/// # Errors
///
/// Returns [`Error::NonPositiveRankBudget`] when `n_below` is not positive
/// and [`Error::PenaltyCountMismatch`] when `penalty` and `loss_values`
/// disagree in length.
#[allow(clippy::cast_possible_wrap)]
pub fn fast_non_domination_rank(
    loss_values: &[Vec<f64>],
    penalty: Option<&[f64]>,
    n_below: Option<i64>,
) -> Result<Vec<usize>> {
    if loss_values.is_empty() {
        return Ok(Vec::new());
    }

    let mut budget = n_below.unwrap_or(loss_values.len() as i64);
    if budget <= 0 {
        return Err(Error::NonPositiveRankBudget);
    }

    let Some(penalty) = penalty else {
        return Ok(calculate_nondomination_rank(loss_values, Some(budget)));
    };
    if penalty.len() != loss_values.len() {
        return Err(Error::PenaltyCountMismatch {
            expected: loss_values.len(),
            got: penalty.len(),
        });
    }

    let mut ranks = vec![0; loss_values.len()];
    let mut feasible = Vec::new();
    let mut infeasible = Vec::new();
    let mut nan = Vec::new();
    for (i, p) in penalty.iter().enumerate() {
        if p.is_nan() {
            nan.push(i);
        } else if *p <= 0.0 {
            feasible.push(i);
        } else {
            infeasible.push(i);
        }
    }

    let feasible_losses: Vec<Vec<f64>> = feasible.iter().map(|&i| loss_values[i].clone()).collect();
    let feasible_ranks = calculate_nondomination_rank(&feasible_losses, Some(budget));
    for (&i, &r) in feasible.iter().zip(&feasible_ranks) {
        ranks[i] = r;
    }
    budget -= feasible.len() as i64;

    let top_rank_infeasible = feasible.iter().map(|&i| ranks[i]).max().map_or(0, |m| m + 1);
    let violation_losses: Vec<Vec<f64>> = infeasible.iter().map(|&i| vec![penalty[i]]).collect();
    let infeasible_ranks = calculate_nondomination_rank(&violation_losses, Some(budget));
    for (&i, &r) in infeasible.iter().zip(&infeasible_ranks) {
        ranks[i] = top_rank_infeasible + r;
    }
    budget -= infeasible.len() as i64;

    let top_rank_nan = feasible
        .iter()
        .chain(&infeasible)
        .map(|&i| ranks[i])
        .max()
        .map_or(0, |m| m + 1);
    let nan_losses: Vec<Vec<f64>> = nan.iter().map(|&i| loss_values[i].clone()).collect();
    let nan_ranks = calculate_nondomination_rank(&nan_losses, Some(budget));
    for (&i, &r) in nan.iter().zip(&nan_ranks) {
        ranks[i] = top_rank_nan + r;
    }

    Ok(ranks)
}
