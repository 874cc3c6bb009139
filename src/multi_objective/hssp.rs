//! Greedy hypervolume subset selection.
//!
//! Given the loss rows of one non-domination rank and a budget, pick the
//! subset that greedily maximizes the covered hypervolume. Two objectives
//! use an incremental rectangle sweep; three or more use lazy updates of
//! hypervolume contributions.

use core::cmp::Ordering;

use crate::error::Result;
use crate::multi_objective::hypervolume::{compute_hypervolume, inclusive_volume};
use crate::multi_objective::pareto::{unique_sorted_rows_with_inverse, UniqueSortedRows};
use crate::num_util::{js_max, js_min, EPS};

/// Reference point for a set of loss rows: the componentwise worst values
/// pushed out by 10%, with exact zeros replaced by a small epsilon.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn get_reference_point(loss_vals: &[Vec<f64>]) -> Vec<f64> {
    let dims = loss_vals.first().map_or(0, Vec::len);
    let mut worst = vec![f64::NEG_INFINITY; dims];
    for row in loss_vals {
        for (w, v) in worst.iter_mut().zip(row) {
            if *v > *w {
                *w = *v;
            }
        }
    }
    worst
        .into_iter()
        .map(|w| {
            let r = js_max(1.1 * w, 0.9 * w);
            if r == 0.0 {
                EPS
            } else {
                r
            }
        })
        .collect()
}

/// Incremental rectangle sweep for two objectives. Rows must be unique and
/// lexicographically sorted so that earlier rows have smaller first
/// objectives.
fn solve_hssp_2d(
    rank_loss_vals: &[Vec<f64>],
    rank_indices: &[usize],
    subset_size: usize,
    reference_point: &[f64],
) -> Vec<usize> {
    let n = rank_loss_vals.len();
    let mut sorted_indices: Vec<usize> = (0..n).collect();
    let mut sorted_loss_vals: Vec<Vec<f64>> = rank_loss_vals.to_vec();
    let mut rect_diags: Vec<Vec<f64>> = vec![reference_point.to_vec(); n];
    let mut selected = Vec::with_capacity(subset_size);

    for _ in 0..subset_size {
        let mut max_index = 0;
        let mut max_contrib = f64::NEG_INFINITY;
        for (j, loss) in sorted_loss_vals.iter().enumerate() {
            let contrib = (rect_diags[j][0] - loss[0]) * (rect_diags[j][1] - loss[1]);
            if contrib > max_contrib {
                max_contrib = contrib;
                max_index = j;
            }
        }

        selected.push(rank_indices[sorted_indices[max_index]]);
        let loss = sorted_loss_vals[max_index].clone();

        sorted_indices.remove(max_index);
        rect_diags.remove(max_index);
        sorted_loss_vals.remove(max_index);

        // Rows left of the removed one lose x range, rows right of it lose
        // y range.
        for (j, rect) in rect_diags.iter_mut().enumerate() {
            if j < max_index {
                rect[0] = js_min(loss[0], rect[0]);
            } else {
                rect[1] = js_min(loss[1], rect[1]);
            }
        }
    }
    selected
}

/// Refreshes the hypervolume contribution upper bounds after a selection.
///
/// `selected_vecs` carries the rows picked so far plus one trailing
/// all-zeros slot; the fast path reuses that slot for the candidate row
/// when recomputing exactly.
fn lazy_contribs_update(
    contribs: &[f64],
    pareto_loss_values: &[Vec<f64>],
    selected_vecs: &[Vec<f64>],
    reference_point: &[f64],
    hv_selected: f64,
) -> Result<Vec<f64>> {
    if !hv_selected.is_finite() {
        return Ok(vec![f64::INFINITY; contribs.len()]);
    }

    let inclusive_hvs: Vec<f64> = pareto_loss_values
        .iter()
        .map(|row| inclusive_volume(row, reference_point))
        .collect();

    let n_selected = selected_vecs.len() - 1;
    let intersections: Vec<Vec<Vec<f64>>> = pareto_loss_values
        .iter()
        .map(|row| {
            selected_vecs[..n_selected]
                .iter()
                .map(|sel| row.iter().zip(sel).map(|(v, s)| js_max(*v, *s)).collect())
                .collect()
        })
        .collect();

    let latest = &selected_vecs[n_selected];
    let mut updated = contribs.to_vec();
    for (i, row) in pareto_loss_values.iter().enumerate() {
        let latest_volume: f64 = row
            .iter()
            .zip(latest)
            .zip(reference_point)
            .map(|((v, s), r)| r - js_max(*v, *s))
            .product();
        updated[i] = js_min(updated[i], inclusive_hvs[i] - latest_volume);
    }

    let mut max_contrib = 0.0;
    let is_fast = pareto_loss_values[0].len() <= 3;
    let mut order: Vec<usize> = (0..updated.len()).collect();
    order.sort_by(|&a, &b| updated[b].partial_cmp(&updated[a]).unwrap_or(Ordering::Equal));

    for i in order {
        if !inclusive_hvs[i].is_finite() {
            updated[i] = f64::INFINITY;
            max_contrib = f64::INFINITY;
            continue;
        }
        if updated[i] < max_contrib {
            continue;
        }

        if is_fast {
            let mut plus_set = selected_vecs.to_vec();
            plus_set[n_selected] = pareto_loss_values[i].clone();
            let hv_plus = compute_hypervolume(&plus_set, reference_point, true)?;
            updated[i] = hv_plus - hv_selected;
        } else {
            updated[i] =
                inclusive_hvs[i] - compute_hypervolume(&intersections[i], reference_point, false)?;
        }

        if updated[i] > max_contrib {
            max_contrib = updated[i];
        }
    }

    Ok(updated)
}

fn solve_hssp_on_unique(
    rank_loss_vals: &[Vec<f64>],
    rank_indices: &[usize],
    subset_size: usize,
    reference_point: &[f64],
) -> Result<Vec<usize>> {
    if !reference_point.iter().all(|v| v.is_finite()) {
        return Ok(rank_indices[..subset_size.min(rank_indices.len())].to_vec());
    }
    if rank_indices.len() == subset_size {
        return Ok(rank_indices.to_vec());
    }
    if rank_loss_vals[0].len() == 2 {
        return Ok(solve_hssp_2d(
            rank_loss_vals,
            rank_indices,
            subset_size,
            reference_point,
        ));
    }

    let mut contribs: Vec<f64> = rank_loss_vals
        .iter()
        .map(|row| inclusive_volume(row, reference_point))
        .collect();
    let mut selected_indices: Vec<usize> = Vec::with_capacity(subset_size);
    let mut selected_vecs: Vec<Vec<f64>> = Vec::with_capacity(subset_size);
    let mut indices: Vec<usize> = (0..rank_loss_vals.len()).collect();
    let mut loss_vals: Vec<Vec<f64>> = rank_loss_vals.to_vec();
    let mut hv = 0.0;

    for k in 0..subset_size {
        let mut max_index = 0;
        for (i, c) in contribs.iter().enumerate().skip(1) {
            if *c > contribs[max_index] {
                max_index = i;
            }
        }

        hv += contribs[max_index];
        selected_indices.push(indices[max_index]);
        selected_vecs.push(loss_vals[max_index].clone());

        if k == subset_size - 1 {
            break;
        }

        contribs.remove(max_index);
        indices.remove(max_index);
        loss_vals.remove(max_index);

        let mut selected_for_update = selected_vecs.clone();
        selected_for_update.push(vec![0.0; reference_point.len()]);
        contribs = lazy_contribs_update(
            &contribs,
            &loss_vals,
            &selected_for_update,
            reference_point,
            hv,
        )?;
    }

    Ok(selected_indices.iter().map(|&i| rank_indices[i]).collect())
}

/// Selects `subset_size` rows greedily maximizing the covered hypervolume
/// and returns their identifiers from `rank_indices` in selection order.
///
/// Duplicate rows are collapsed to their first occurrence before selection;
/// if fewer unique rows exist than the budget asks for, the earliest
/// duplicates fill the remainder and the result follows input order
/// instead.
///
/// # Errors
///
/// Propagates hypervolume errors for rows beyond the reference point.
pub fn solve_hssp(
    rank_loss_vals: &[Vec<f64>],
    rank_indices: &[usize],
    subset_size: usize,
    reference_point: &[f64],
) -> Result<Vec<usize>> {
    if subset_size == rank_indices.len() {
        return Ok(rank_indices.to_vec());
    }

    let UniqueSortedRows { unique, inverse } = unique_sorted_rows_with_inverse(rank_loss_vals);
    let mut first_occurrence = vec![usize::MAX; unique.len()];
    for (i, &u) in inverse.iter().enumerate() {
        if first_occurrence[u] == usize::MAX {
            first_occurrence[u] = i;
        }
    }

    if unique.len() < subset_size {
        let mut chosen = vec![false; rank_indices.len()];
        for &idx in &first_occurrence {
            chosen[idx] = true;
        }
        let duplicated: Vec<usize> = (0..chosen.len()).filter(|&i| !chosen[i]).collect();
        for &idx in duplicated.iter().take(subset_size - unique.len()) {
            chosen[idx] = true;
        }
        return Ok(chosen
            .iter()
            .enumerate()
            .filter(|(_, &c)| c)
            .map(|(i, _)| rank_indices[i])
            .collect());
    }

    let selected_unique =
        solve_hssp_on_unique(&unique, &first_occurrence, subset_size, reference_point)?;
    Ok(selected_unique.iter().map(|&i| rank_indices[i]).collect())
}
