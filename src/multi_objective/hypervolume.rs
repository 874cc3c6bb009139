//! Exact hypervolume computation against a reference point.
//!
//! All coordinates are losses, so a point dominates the region between
//! itself and the reference point, and every point must be componentwise
//! less than or equal to the reference point.

use core::cmp::Ordering;

use crate::error::{Error, Result};
use crate::multi_objective::pareto::{
    is_pareto_front, unique_sorted_rows_with_inverse, UniqueSortedRows,
};
use crate::num_util::js_max;

/// Volume of the box spanned by a single point and the reference point.
pub(crate) fn inclusive_volume(row: &[f64], reference_point: &[f64]) -> f64 {
    row.iter()
        .zip(reference_point)
        .map(|(v, r)| r - v)
        .product()
}

/// Rectangle sweep over points sorted by the first objective.
fn compute_2d(sorted_pareto: &[Vec<f64>], reference_point: &[f64]) -> f64 {
    let mut hv = 0.0;
    for (i, sol) in sorted_pareto.iter().enumerate() {
        let rect_diag_y = if i == 0 {
            reference_point[1]
        } else {
            sorted_pareto[i - 1][1]
        };
        hv += (reference_point[0] - sol[0]) * (rect_diag_y - sol[1]);
    }
    hv
}

/// Grid decomposition over x and y orders with prefix-maximized z heights.
fn compute_3d(sorted_pareto: &[Vec<f64>], reference_point: &[f64]) -> f64 {
    let n = sorted_pareto.len();
    let mut y_order: Vec<usize> = (0..n).collect();
    y_order.sort_by(|&a, &b| {
        sorted_pareto[a][1]
            .partial_cmp(&sorted_pareto[b][1])
            .unwrap_or(Ordering::Equal)
    });

    // Rows follow the x order, columns the y order.
    let mut z_delta = vec![vec![0.0; n]; n];
    for (j, &row) in y_order.iter().enumerate() {
        z_delta[row][j] = reference_point[2] - sorted_pareto[row][2];
    }
    for row in &mut z_delta {
        for j in 1..n {
            if row[j] < row[j - 1] {
                row[j] = row[j - 1];
            }
        }
    }
    for j in 0..n {
        for i in 1..n {
            if z_delta[i][j] < z_delta[i - 1][j] {
                z_delta[i][j] = z_delta[i - 1][j];
            }
        }
    }

    let x_vals: Vec<f64> = sorted_pareto.iter().map(|row| row[0]).collect();
    let y_vals: Vec<f64> = y_order.iter().map(|&idx| sorted_pareto[idx][1]).collect();
    let mut x_delta = vec![0.0; n];
    let mut y_delta = vec![0.0; n];
    for i in 0..n {
        x_delta[i] = if i + 1 < n {
            x_vals[i + 1]
        } else {
            reference_point[0]
        } - x_vals[i];
        y_delta[i] = if i + 1 < n {
            y_vals[i + 1]
        } else {
            reference_point[1]
        } - y_vals[i];
    }

    let mut hv = 0.0;
    for i in 0..n {
        for j in 0..n {
            hv += z_delta[j][i] * y_delta[i] * x_delta[j];
        }
    }
    hv
}

/// Inclusion-exclusion over points sorted by the first objective.
fn compute_hv_recursive(sorted_loss_vals: &[Vec<f64>], reference_point: &[f64]) -> f64 {
    let n = sorted_loss_vals.len();
    if n == 0 {
        return 0.0;
    }
    if n == 1 {
        return inclusive_volume(&sorted_loss_vals[0], reference_point);
    }
    if n == 2 {
        let mut hv1 = 1.0;
        let mut hv2 = 1.0;
        let mut inter = 1.0;
        for (d, r) in reference_point.iter().enumerate() {
            hv1 *= r - sorted_loss_vals[0][d];
            hv2 *= r - sorted_loss_vals[1][d];
            inter *= r - js_max(sorted_loss_vals[0][d], sorted_loss_vals[1][d]);
        }
        return hv1 + hv2 - inter;
    }

    let inclusive_hvs: Vec<f64> = sorted_loss_vals
        .iter()
        .map(|row| inclusive_volume(row, reference_point))
        .collect();

    let mut hv = inclusive_hvs[n - 1];
    for i in 0..n - 1 {
        let limited: Vec<Vec<f64>> = sorted_loss_vals[i + 1..]
            .iter()
            .map(|row_j| {
                sorted_loss_vals[i]
                    .iter()
                    .zip(row_j)
                    .map(|(v, w)| js_max(*v, *w))
                    .collect()
            })
            .collect();
        hv += compute_exclusive_hv(&limited, inclusive_hvs[i], reference_point);
    }
    hv
}

/// Volume a point adds beyond the points that limit it.
fn compute_exclusive_hv(
    limited_sols: &[Vec<f64>],
    inclusive_hv: f64,
    reference_point: &[f64],
) -> f64 {
    if limited_sols.len() <= 3 {
        return inclusive_hv - compute_hv_recursive(limited_sols, reference_point);
    }
    let on_front = is_pareto_front(limited_sols, true);
    let front: Vec<Vec<f64>> = limited_sols
        .iter()
        .zip(&on_front)
        .filter(|(_, &keep)| keep)
        .map(|(row, _)| row.clone())
        .collect();
    inclusive_hv - compute_hv_recursive(&front, reference_point)
}

/// Computes the hypervolume dominated by `loss_vals` up to
/// `reference_point`.
///
/// With `assume_pareto` the rows are taken as a Pareto front and only sorted
/// by their first objective; otherwise they are deduplicated and reduced to
/// their front first. A reference point with non-finite coordinates yields
/// `f64::INFINITY`, as does any overflowing volume.
///
/// # Errors
///
/// Returns [`Error::ReferencePointNotDominant`] when any point exceeds the
/// reference point in some coordinate.
pub fn compute_hypervolume(
    loss_vals: &[Vec<f64>],
    reference_point: &[f64],
    assume_pareto: bool,
) -> Result<f64> {
    for row in loss_vals {
        for (v, r) in row.iter().zip(reference_point) {
            if v > r {
                return Err(Error::ReferencePointNotDominant);
            }
        }
    }
    if !reference_point.iter().all(|r| r.is_finite()) {
        return Ok(f64::INFINITY);
    }
    if loss_vals.is_empty() {
        return Ok(0.0);
    }

    let sorted_pareto: Vec<Vec<f64>> = if assume_pareto {
        let mut sols = loss_vals.to_vec();
        sols.sort_by(|a, b| a[0].partial_cmp(&b[0]).unwrap_or(Ordering::Equal));
        sols
    } else {
        let UniqueSortedRows { unique, .. } = unique_sorted_rows_with_inverse(loss_vals);
        let on_front = is_pareto_front(&unique, true);
        unique
            .into_iter()
            .zip(on_front)
            .filter(|(_, keep)| *keep)
            .map(|(row, _)| row)
            .collect()
    };

    let hv = match reference_point.len() {
        2 => compute_2d(&sorted_pareto, reference_point),
        3 => compute_3d(&sorted_pareto, reference_point),
        _ => compute_hv_recursive(&sorted_pareto, reference_point),
    };
    Ok(if hv.is_finite() { hv } else { f64::INFINITY })
}
