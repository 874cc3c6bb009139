//! Small numeric helpers shared across the sampler internals.
//!
//! These mirror IEEE-754 double semantics precisely (NaN propagation
//! included) so that sampling stays reproducible bit for bit.

/// Shared epsilon for degenerate weights, sigmas, and reference points.
pub(crate) const EPS: f64 = 1e-12;

/// Clamps `value` into `[low, high]`, letting NaN pass through unchanged.
pub(crate) fn clip(value: f64, low: f64, high: f64) -> f64 {
    if value < low {
        low
    } else if value > high {
        high
    } else {
        value
    }
}

/// `min` that propagates NaN from either operand.
pub(crate) fn js_min(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if b < a {
        b
    } else {
        a
    }
}

/// `max` that propagates NaN from either operand.
pub(crate) fn js_max(a: f64, b: f64) -> f64 {
    if a.is_nan() || b.is_nan() {
        f64::NAN
    } else if b > a {
        b
    } else {
        a
    }
}

/// Rounds to the nearest integer, breaking exact halves toward the even
/// floor. A small epsilon guards against fractions that are only half due
/// to representation error.
pub(crate) fn round_to_nearest_even(value: f64) -> f64 {
    let floor_value = value.floor();
    let fraction = value - floor_value;
    let eps = 1e-12;
    if fraction < 0.5 - eps {
        floor_value
    } else if fraction > 0.5 + eps {
        floor_value + 1.0
    } else if floor_value % 2.0 == 0.0 {
        floor_value
    } else {
        floor_value + 1.0
    }
}

/// The next representable double after `x` in the direction of `y`.
pub(crate) fn next_after(x: f64, y: f64) -> f64 {
    if x.is_nan() || y.is_nan() {
        return f64::NAN;
    }
    if x == y {
        return y;
    }
    if !x.is_finite() {
        return x;
    }
    if x == 0.0 {
        return if y > 0.0 {
            f64::from_bits(1)
        } else {
            -f64::from_bits(1)
        };
    }
    let bits = x.to_bits();
    let next = if (y > x) == (x > 0.0) {
        bits + 1
    } else {
        bits - 1
    };
    f64::from_bits(next)
}

/// Index of the most significant set bit, or -1 for zero.
pub(crate) fn msb(n: usize) -> i32 {
    let mut n = n;
    let mut msb = -1;
    while n > 0 {
        n >>= 1;
        msb += 1;
    }
    msb
}
