//! Scalar math for the truncated standard normal distribution.
//!
//! Quantiles are computed in log space: the Gaussian mass of the truncation
//! interval is carried as a log quantity and inverted through [`ndtri_exp`],
//! which stays accurate for intervals far out in the tails where a direct
//! `Phi^-1(Phi(a) + q * mass)` evaluation would collapse to an endpoint.
#![allow(clippy::excessive_precision, clippy::unreadable_literal)]

use core::f64::consts::{PI, SQRT_2};

use crate::num_util::{js_max, js_min};

/// `ln(sqrt(2 * pi))`, the standard normal log-pdf normalization constant.
const LOG_SQRT_2PI: f64 = 0.9189385332046727;

// Rational approximation tables for `erf`, split by argument range.
const ERX: f64 = 8.45062911510467529297e-01;
const EFX: f64 = 1.28379167095512586316e-01;
const TINY: f64 = 3.725290298461914e-09;

const PP: [f64; 5] = [
    1.28379167095512558561e-01,
    -3.25042107247001499370e-01,
    -2.84817495755985104766e-02,
    -5.77027029648944159157e-03,
    -2.37630166566501626084e-05,
];
const QQ: [f64; 6] = [
    1.0,
    3.97917223959155352819e-01,
    6.50222499887672944485e-02,
    5.08130628187576562776e-03,
    1.32494738004321644526e-04,
    -3.96022827877536812320e-06,
];
const PA: [f64; 7] = [
    -2.36211856075265944077e-03,
    4.14856118683748331666e-01,
    -3.72207876035701323847e-01,
    3.18346619901161753674e-01,
    -1.10894694282396677476e-01,
    3.54783043256182359371e-02,
    -2.16637559486879084300e-03,
];
const QA: [f64; 7] = [
    1.0,
    1.06420880400844228286e-01,
    5.40397917702171048937e-01,
    7.18286544141962662868e-02,
    1.26171219808761642112e-01,
    1.36370839120290507362e-02,
    1.19844998467991074170e-02,
];
const RA: [f64; 8] = [
    -9.86494403484714822705e-03,
    -6.93858572707181764372e-01,
    -1.05586262253232909814e+01,
    -6.23753324503260060396e+01,
    -1.62396669462573470355e+02,
    -1.84605092906711035994e+02,
    -8.12874355063065934246e+01,
    -9.81432934416914548592e+00,
];
const SA: [f64; 9] = [
    1.0,
    1.96512716674392571292e+01,
    1.37657754143519042600e+02,
    4.34565877475229228821e+02,
    6.45387271733267880336e+02,
    4.29008140027567833386e+02,
    1.08635005541779435134e+02,
    6.57024977031928170135e+00,
    -6.04244152148580987438e-02,
];
const RB: [f64; 7] = [
    -9.86494292470009928597e-03,
    -7.99283237680523006574e-01,
    -1.77579549177547519889e+01,
    -1.60636384855821916062e+02,
    -6.37566443368389627722e+02,
    -1.02509513161107724954e+03,
    -4.83519191608651397019e+02,
];
const SB: [f64; 8] = [
    1.0,
    3.03380607434824582924e+01,
    3.25792512996573918826e+02,
    1.53672958608443695994e+03,
    3.19985821950859553908e+03,
    2.55305040643316442583e+03,
    4.74528541206955367215e+02,
    -2.24409524465858183362e+01,
];

/// Evaluates a polynomial with `coeffs[i]` the coefficient of `x^i`.
fn poly_eval(coeffs: &[f64], x: f64) -> f64 {
    let mut acc = 0.0;
    for &c in coeffs.iter().rev() {
        acc = acc * x + c;
    }
    acc
}

/// The error function `erf(x)`, via the FDLIBM rational approximations.
#[must_use]
pub fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let ax = x.abs();
    if ax >= 6.0 {
        return sign;
    }
    if ax < TINY {
        return sign * ((1.0 + EFX) * ax);
    }
    if ax < 0.84375 {
        let z = ax * ax;
        return sign * (ax * (1.0 + poly_eval(&PP, z) / poly_eval(&QQ, z)));
    }
    if ax < 1.25 {
        let s = ax - 1.0;
        return sign * (ERX + poly_eval(&PA, s) / poly_eval(&QA, s));
    }
    let z = ax * ax;
    let s = 1.0 / z;
    let r = if ax < 1.0 / 0.35 {
        (-z - 0.5625 + poly_eval(&RA, s) / poly_eval(&SA, s)).exp()
    } else {
        (-z - 0.5625 + poly_eval(&RB, s) / poly_eval(&SB, s)).exp()
    };
    sign * (1.0 - r / ax)
}

/// The standard normal cdf `Phi(x)`, clamped into `[0, 1]`.
#[must_use]
pub fn ndtr(x: f64) -> f64 {
    let v = 0.5 + 0.5 * erf(x / SQRT_2);
    if v <= 0.0 {
        0.0
    } else if v >= 1.0 {
        1.0
    } else {
        v
    }
}

/// `ln(Phi(x))`, switching to an asymptotic expansion deep in the lower tail.
#[must_use]
pub fn log_ndtr(x: f64) -> f64 {
    if x > 6.0 {
        return -ndtr(-x);
    }
    if x > -20.0 {
        return ndtr(x).ln();
    }
    // Asymptotic series for the Mills ratio, summed until it stops moving.
    let log_lhs = -0.5 * x * x - (-x).ln() - LOG_SQRT_2PI;
    let denom_cons = 1.0 / (x * x);
    let mut last_total: f64 = 0.0;
    let mut rhs = 1.0;
    let mut numerator = 1.0;
    let mut denom_factor = 1.0;
    let mut sign = 1.0;
    let mut i = 0.0;
    while (last_total - rhs).abs() > f64::EPSILON {
        i += 1.0;
        last_total = rhs;
        sign = -sign;
        denom_factor *= denom_cons;
        numerator *= 2.0 * i - 1.0;
        rhs += sign * numerator * denom_factor;
    }
    log_lhs + rhs.ln()
}

/// `ln(exp(log_p) + exp(log_q))` without leaving log space.
fn log_sum(log_p: f64, log_q: f64) -> f64 {
    let max = js_max(log_p, log_q);
    let min = js_min(log_p, log_q);
    max + (min - max).exp().ln_1p()
}

/// `ln(exp(log_p) - exp(log_q))`, with a `-inf` floor for empty differences.
fn log_diff(log_p: f64, log_q: f64) -> f64 {
    if log_q >= log_p {
        return f64::NEG_INFINITY;
    }
    log_p + (-((log_q - log_p).exp())).ln_1p()
}

/// `ln(Phi(b) - Phi(a))`, evaluated in whichever tail keeps precision.
#[must_use]
pub fn log_gauss_mass(a: f64, b: f64) -> f64 {
    if b <= 0.0 {
        log_diff(log_ndtr(b), log_ndtr(a))
    } else if a > 0.0 {
        log_gauss_mass(-b, -a)
    } else {
        // Interval straddles zero; the central mass is safe in linear space
        // unless cancellation wiped it out.
        let central = 1.0 - ndtr(a) - ndtr(-b);
        if central > 0.0 {
            central.ln()
        } else {
            log_sum(
                log_diff(log_ndtr(0.0), log_ndtr(a)),
                log_diff(log_ndtr(b), log_ndtr(0.0)),
            )
        }
    }
}

/// Inverse of [`log_ndtr`]: returns `x` with `ln(Phi(x)) = y`.
///
/// Newton iteration on the log-cdf from a tail-dependent initial guess.
#[must_use]
pub fn ndtri_exp(y: f64) -> f64 {
    let flipped = y > -1e-2;
    let z = if flipped { (-y.exp_m1()).ln() } else { y };
    let approx_c = 3.0_f64.sqrt() / PI;
    let mut x = if z < -5.0 {
        -(-2.0 * (z + LOG_SQRT_2PI)).sqrt()
    } else {
        -approx_c * (-z).exp_m1().ln()
    };
    for _ in 0..100 {
        let log_cdf = log_ndtr(x);
        let log_pdf = -0.5 * x * x - LOG_SQRT_2PI;
        let dx = (log_cdf - z) * (log_cdf - log_pdf).exp();
        x -= dx;
        if dx.abs() < 1e-8 * x.abs() {
            break;
        }
    }
    if flipped {
        -x
    } else {
        x
    }
}

/// Quantile of the standard normal truncated to `[a, b]`.
///
/// Returns `a` at `q == 0`, `b` at `q == 1`, and `NaN` for a degenerate
/// interval.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn truncnorm_ppf(q: f64, a: f64, b: f64) -> f64 {
    if q == 0.0 {
        return a;
    }
    if q == 1.0 {
        return b;
    }
    if a == b {
        return f64::NAN;
    }
    let log_mass = log_gauss_mass(a, b);
    if a < 0.0 {
        ndtri_exp(log_sum(log_ndtr(a), q.ln() + log_mass))
    } else {
        // Mirror the interval so the accumulation runs in the lower tail.
        -ndtri_exp(log_sum(log_ndtr(-b), (-q).ln_1p() + log_mass))
    }
}

/// Log-density at `x` of a normal `(loc, scale)` truncated to
/// `[loc + a * scale, loc + b * scale]`.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn truncnorm_logpdf(x: f64, a: f64, b: f64, loc: f64, scale: f64) -> f64 {
    if a == b {
        return f64::NAN;
    }
    let xn = (x - loc) / scale;
    if xn < a || xn > b {
        return f64::NEG_INFINITY;
    }
    -0.5 * xn * xn - LOG_SQRT_2PI - log_gauss_mass(a, b) - scale.ln()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]

    use super::*;

    #[test]
    fn test_erf_reference_values() {
        assert_eq!(erf(0.0), 0.0);
        assert!((erf(1.0) - 0.8427007929497149).abs() < 1e-15);
        assert!((erf(0.5) - 0.5204998778130465).abs() < 1e-15);
        assert!((erf(2.0) - 0.9953222650189527).abs() < 1e-15);
        assert!((erf(3.0) - 0.9999779095030014).abs() < 1e-15);
        assert_eq!(erf(6.5), 1.0);
        assert_eq!(erf(-7.0), -1.0);
    }

    #[test]
    fn test_erf_is_odd() {
        for x in [0.3, 0.9, 1.7, 2.9, 4.5] {
            assert_eq!(erf(-x), -erf(x));
        }
    }

    #[test]
    fn test_erf_tiny_argument_is_linear() {
        let x = 1e-300;
        assert_eq!(erf(x), (1.0 + EFX) * x);
    }

    #[test]
    fn test_ndtr_basic() {
        assert_eq!(ndtr(0.0), 0.5);
        assert!((ndtr(1.96) - 0.9750021048517795).abs() < 1e-12);
        assert_eq!(ndtr(-40.0), 0.0);
        assert_eq!(ndtr(40.0), 1.0);
        assert!((ndtr(-1.0) - 0.15865525393145707).abs() < 1e-12);
    }

    #[test]
    fn test_log_ndtr_branches() {
        // Upper tail short-circuits through the complementary cdf.
        assert_eq!(log_ndtr(7.0), -ndtr(-7.0));
        // Moderate range is a plain logarithm.
        assert_eq!(log_ndtr(-1.0), ndtr(-1.0).ln());
        // Deep tail uses the asymptotic series.
        let deep = log_ndtr(-25.0);
        assert!((deep - -316.63940800802015).abs() / 316.0 < 1e-12);
    }

    #[test]
    fn test_log_gauss_mass_matches_cdf_difference() {
        assert!((log_gauss_mass(-1.0, 1.0).exp() - 0.6826894921370859).abs() < 1e-13);
        assert!((log_gauss_mass(1.0, 2.0).exp() - 0.13590512198327787).abs() < 1e-13);
        // Mirrored intervals hold the same mass.
        assert_eq!(log_gauss_mass(-2.0, -1.0), log_gauss_mass(1.0, 2.0));
        // Tail masses stay finite in log space on both sides of the
        // asymptotic switchover.
        assert!(log_gauss_mass(5.0, 6.0).is_finite());
        assert!(log_gauss_mass(-25.0, -24.0).is_finite());
    }

    #[test]
    fn test_ndtri_exp_inverts_log_ndtr() {
        for x in [-30.0, -7.0, -4.0, -1.0, 0.5, 3.0] {
            let recovered = ndtri_exp(log_ndtr(x));
            assert!(
                (recovered - x).abs() <= 1e-6 * x.abs(),
                "x = {x}, recovered = {recovered}"
            );
        }
    }

    #[test]
    fn test_truncnorm_ppf_endpoints() {
        assert_eq!(truncnorm_ppf(0.0, -2.0, 3.0), -2.0);
        assert_eq!(truncnorm_ppf(1.0, -2.0, 3.0), 3.0);
        assert!(truncnorm_ppf(0.5, 1.0, 1.0).is_nan());
    }

    #[test]
    fn test_truncnorm_ppf_symmetric_median() {
        assert!(truncnorm_ppf(0.5, -2.0, 2.0).abs() < 1e-8);
    }

    #[test]
    fn test_truncnorm_ppf_monotone_within_bounds() {
        let quantiles = [0.1, 0.25, 0.5, 0.75, 0.9];
        let mut prev = f64::NEG_INFINITY;
        for q in quantiles {
            let v = truncnorm_ppf(q, -3.0, 1.0);
            assert!(v > prev);
            assert!((-3.0..=1.0).contains(&v));
            prev = v;
        }
    }

    #[test]
    fn test_truncnorm_ppf_offset_tail_interval() {
        // A linear-space Phi round trip already loses the interval here.
        let v = truncnorm_ppf(0.5, 4.0, 5.0);
        assert!(v > 4.0 && v < 5.0);
        assert!(truncnorm_ppf(0.2, 4.0, 5.0) < v);
    }

    #[test]
    fn test_truncnorm_logpdf() {
        assert!((truncnorm_logpdf(0.0, -1.0, 1.0, 0.0, 1.0) - -0.5372233869025465).abs() < 1e-12);
        assert_eq!(
            truncnorm_logpdf(5.0, -1.0, 1.0, 0.0, 1.0),
            f64::NEG_INFINITY
        );
        assert!(truncnorm_logpdf(0.5, 2.0, 2.0, 0.0, 1.0).is_nan());
    }

    #[test]
    fn test_truncnorm_logpdf_integrates_against_mass() {
        // pdf at the location of a wide symmetric interval approaches the
        // untruncated normal density.
        let wide = truncnorm_logpdf(0.0, -40.0, 40.0, 0.0, 1.0);
        assert!((wide - -0.9189385332046727).abs() < 1e-12);
    }
}
