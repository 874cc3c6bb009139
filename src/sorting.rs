//! Introsort-style argsort reproducing numpy's quicksort order, including
//! its exact pivoting and tie behavior. Kernel bandwidth selection depends
//! on this ordering, so the standard library sort is not a drop-in here.

use crate::num_util::msb;

const SMALL_QUICKSORT: usize = 15;

fn less(values: &[f64], indices: &[usize], i: usize, j: usize) -> bool {
    values[indices[i]] < values[indices[j]]
}

fn sift_down(values: &[f64], indices: &mut [usize], start: usize, mut root: usize, size: usize) {
    loop {
        let mut child = root * 2 + 1;
        if child >= size {
            return;
        }
        if child + 1 < size && less(values, indices, start + child, start + child + 1) {
            child += 1;
        }
        if less(values, indices, start + root, start + child) {
            indices.swap(start + root, start + child);
            root = child;
        } else {
            return;
        }
    }
}

/// Heapsorts `indices[start..=end]` by the values they point at.
fn heapsort_segment(values: &[f64], indices: &mut [usize], start: usize, end: usize) {
    let size = end - start + 1;
    for root in (0..size / 2).rev() {
        sift_down(values, indices, start, root, size);
    }
    for i in (1..size).rev() {
        indices.swap(start, start + i);
        sift_down(values, indices, start, 0, i);
    }
}

/// Returns indices that sort `values` ascending, in numpy quicksort order.
///
/// Median-of-three pivoting with a depth-limited Hoare partition, insertion
/// sort below [`SMALL_QUICKSORT`] elements, heapsort once the depth budget
/// runs out.
pub(crate) fn argsort(values: &[f64]) -> Vec<usize> {
    let num = values.len();
    let mut tosort: Vec<usize> = (0..num).collect();
    if num <= 1 {
        return tosort;
    }

    let mut stack: Vec<(usize, usize, i32)> = Vec::new();
    let mut pl = 0usize;
    let mut pr = num - 1;
    let mut cdepth = msb(num) * 2;

    loop {
        if cdepth < 0 {
            heapsort_segment(values, &mut tosort, pl, pr);
            if let Some((l, r, d)) = stack.pop() {
                pl = l;
                pr = r;
                cdepth = d;
                continue;
            }
            break;
        }

        while pr - pl > SMALL_QUICKSORT {
            let pm = pl + ((pr - pl) >> 1);
            if less(values, &tosort, pm, pl) {
                tosort.swap(pm, pl);
            }
            if less(values, &tosort, pr, pm) {
                tosort.swap(pr, pm);
            }
            if less(values, &tosort, pm, pl) {
                tosort.swap(pm, pl);
            }

            let vp = values[tosort[pm]];
            let mut pi = pl;
            let mut pj = pr - 1;
            tosort.swap(pm, pj);

            loop {
                pi += 1;
                while values[tosort[pi]] < vp {
                    pi += 1;
                }
                pj -= 1;
                while vp < values[tosort[pj]] {
                    pj -= 1;
                }
                if pi >= pj {
                    break;
                }
                tosort.swap(pi, pj);
            }
            tosort.swap(pi, pr - 1);

            cdepth -= 1;
            if pi - pl < pr - pi {
                stack.push((pi + 1, pr, cdepth));
                pr = pi - 1;
            } else {
                stack.push((pl, pi - 1, cdepth));
                pl = pi + 1;
            }
        }

        for pi in pl + 1..=pr {
            let vi = tosort[pi];
            let vp = values[vi];
            let mut pj = pi;
            while pj > pl && vp < values[tosort[pj - 1]] {
                tosort[pj] = tosort[pj - 1];
                pj -= 1;
            }
            tosort[pj] = vi;
        }

        if let Some((l, r, d)) = stack.pop() {
            pl = l;
            pr = r;
            cdepth = d;
        } else {
            break;
        }
    }

    tosort
}
