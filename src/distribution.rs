//! Parameter distribution types and the numeric transform between external
//! and internal parameter representations.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::num_util::{clip, js_min, next_after, round_to_nearest_even};
use crate::param::ParamValue;

/// A named mapping from parameter names to their distributions.
pub type SearchSpace = BTreeMap<String, Distribution>;

/// Distribution for floating-point parameters over `[low, high]`.
///
/// With a `step`, `high` is adjusted down to the last grid point unless it
/// already sits on the grid (within `1e-15`).
#[derive(Clone, Debug, PartialEq)]
pub struct FloatDistribution {
    low: f64,
    high: f64,
    log_scale: bool,
    step: Option<f64>,
}

impl FloatDistribution {
    /// Creates a float distribution, validating bounds, log domain, and step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepWithLogScale`] when both `log_scale` and `step`
    /// are given, [`Error::InvalidBounds`] when `low > high`,
    /// [`Error::InvalidLogBounds`] when a log domain starts at or below zero,
    /// and [`Error::InvalidStep`] for a non-positive step.
    pub fn new(low: f64, high: f64, log_scale: bool, step: Option<f64>) -> Result<Self> {
        if log_scale && step.is_some() {
            return Err(Error::StepWithLogScale);
        }
        if low > high {
            return Err(Error::InvalidBounds { low, high });
        }
        if log_scale && low <= 0.0 {
            return Err(Error::InvalidLogBounds { low });
        }
        if let Some(s) = step {
            if s <= 0.0 {
                return Err(Error::InvalidStep { step: s });
            }
        }
        let high = match step {
            Some(s) => {
                let q = ((high - low) / s).floor();
                let adjusted = q * s + low;
                if (adjusted - high).abs() < 1e-15 {
                    high
                } else {
                    adjusted
                }
            }
            None => high,
        };
        Ok(Self {
            low,
            high,
            log_scale,
            step,
        })
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Upper bound (inclusive), possibly step-adjusted.
    #[must_use]
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Whether the parameter is sampled in log space.
    #[must_use]
    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    /// Discretization step, if any.
    #[must_use]
    pub fn step(&self) -> Option<f64> {
        self.step
    }

    /// Whether the domain contains exactly one value.
    #[must_use]
    #[allow(clippy::float_cmp)]
    pub fn single(&self) -> bool {
        match self.step {
            None => self.low == self.high,
            Some(s) => self.low == self.high || self.high - self.low < s,
        }
    }

    /// Converts an external value into the internal `f64` representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonNumericParamValue`], [`Error::NanParamValue`], or
    /// [`Error::NonPositiveLogValue`] for values outside the numeric domain.
    pub fn to_internal(&self, value: &ParamValue) -> Result<f64> {
        numeric_internal(value, self.log_scale)
    }

    /// Converts an internal `f64` back into an external value.
    ///
    /// # Errors
    ///
    /// Infallible for float distributions; kept fallible for symmetry with
    /// the other distribution kinds.
    pub fn to_external(&self, value: f64) -> Result<ParamValue> {
        Ok(ParamValue::Float(value))
    }

    /// Whether the value lies in the domain, up to small tolerances on the
    /// bounds and the step grid.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        let Ok(v) = self.to_internal(value) else {
            return false;
        };
        if !v.is_finite() {
            return false;
        }
        if v < self.low - 1e-12 || v > self.high + 1e-12 {
            return false;
        }
        if let Some(s) = self.step {
            let steps = (v - self.low) / s;
            if (steps - steps.round()).abs() > 1e-10 {
                return false;
            }
        }
        true
    }
}

/// Distribution for integer parameters over `[low, high]` with a step grid.
///
/// `high` is adjusted down to the last grid point reachable from `low`.
#[derive(Clone, Debug, PartialEq)]
pub struct IntDistribution {
    low: i64,
    high: i64,
    log_scale: bool,
    step: i64,
}

impl IntDistribution {
    /// Creates an integer distribution, validating bounds, log domain, and
    /// step.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StepWithLogScale`] when `log_scale` is combined with
    /// a step other than 1, [`Error::InvalidBounds`] when `low > high`,
    /// [`Error::InvalidLogBounds`] when a log domain starts below 1, and
    /// [`Error::InvalidStep`] for a non-positive step.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(low: i64, high: i64, log_scale: bool, step: i64) -> Result<Self> {
        if log_scale && step != 1 {
            return Err(Error::StepWithLogScale);
        }
        if low > high {
            return Err(Error::InvalidBounds {
                low: low as f64,
                high: high as f64,
            });
        }
        if log_scale && low < 1 {
            return Err(Error::InvalidLogBounds { low: low as f64 });
        }
        if step <= 0 {
            return Err(Error::InvalidStep { step: step as f64 });
        }
        let high = (high - low) / step * step + low;
        Ok(Self {
            low,
            high,
            log_scale,
            step,
        })
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub fn low(&self) -> i64 {
        self.low
    }

    /// Upper bound (inclusive), possibly step-adjusted.
    #[must_use]
    pub fn high(&self) -> i64 {
        self.high
    }

    /// Whether the parameter is sampled in log space.
    #[must_use]
    pub fn log_scale(&self) -> bool {
        self.log_scale
    }

    /// Grid step between admissible values.
    #[must_use]
    pub fn step(&self) -> i64 {
        self.step
    }

    /// Whether the domain contains exactly one value.
    #[must_use]
    pub fn single(&self) -> bool {
        if self.log_scale {
            self.low == self.high
        } else {
            self.low == self.high || self.high - self.low < self.step
        }
    }

    /// Converts an external value into the internal `f64` representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NonNumericParamValue`], [`Error::NanParamValue`], or
    /// [`Error::NonPositiveLogValue`] for values outside the numeric domain.
    pub fn to_internal(&self, value: &ParamValue) -> Result<f64> {
        numeric_internal(value, self.log_scale)
    }

    /// Converts an internal `f64` back into an external value.
    ///
    /// # Errors
    ///
    /// Infallible for integer distributions; kept fallible for symmetry with
    /// the other distribution kinds.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_external(&self, value: f64) -> Result<ParamValue> {
        Ok(ParamValue::Int(value.trunc() as i64))
    }

    /// Whether the value is an integer inside the bounds and on the grid, up
    /// to small tolerances.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn contains(&self, value: &ParamValue) -> bool {
        let Ok(v) = self.to_internal(value) else {
            return false;
        };
        if !v.is_finite() {
            return false;
        }
        let low = self.low as f64;
        if v < low - 1e-12 || v > self.high as f64 + 1e-12 {
            return false;
        }
        if (v - v.round()).abs() > 1e-10 {
            return false;
        }
        let steps = (v.round() - low) / self.step as f64;
        (steps - steps.round()).abs() <= 1e-10
    }
}

/// Distribution over an explicit list of choices.
///
/// Equality compares choices by [`ParamValue::same_value`], so two instances
/// with `NaN` in the same slot still compare equal.
#[derive(Clone, Debug)]
pub struct CategoricalDistribution {
    choices: Vec<ParamValue>,
}

impl CategoricalDistribution {
    /// Creates a categorical distribution over the given choices.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyChoices`] when `choices` is empty.
    pub fn new(choices: Vec<ParamValue>) -> Result<Self> {
        if choices.is_empty() {
            return Err(Error::EmptyChoices);
        }
        Ok(Self { choices })
    }

    /// The available choices, in suggestion order.
    #[must_use]
    pub fn choices(&self) -> &[ParamValue] {
        &self.choices
    }

    /// Whether there is only one choice.
    #[must_use]
    pub fn single(&self) -> bool {
        self.choices.len() == 1
    }

    fn position(&self, value: &ParamValue) -> Option<usize> {
        self.choices.iter().position(|c| c.same_value(value))
    }

    /// Converts a choice into its index, as the internal `f64`
    /// representation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChoice`] when the value matches no choice.
    #[allow(clippy::cast_precision_loss)]
    pub fn to_internal(&self, value: &ParamValue) -> Result<f64> {
        self.position(value)
            .map(|idx| idx as f64)
            .ok_or_else(|| Error::UnknownChoice {
                value: value.to_string(),
            })
    }

    /// Converts an internal index back into the choice it names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnknownChoice`] when the index is out of range.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_external(&self, value: f64) -> Result<ParamValue> {
        let idx = value.trunc();
        if !idx.is_finite() || idx < 0.0 {
            return Err(Error::UnknownChoice {
                value: format!("{value}"),
            });
        }
        self.choices
            .get(idx as usize)
            .cloned()
            .ok_or_else(|| Error::UnknownChoice {
                value: format!("{value}"),
            })
    }

    /// Whether the value matches one of the choices.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        self.position(value).is_some()
    }
}

impl PartialEq for CategoricalDistribution {
    fn eq(&self, other: &Self) -> bool {
        self.choices.len() == other.choices.len()
            && self
                .choices
                .iter()
                .zip(&other.choices)
                .all(|(a, b)| a.same_value(b))
    }
}

/// Enum wrapping all parameter distribution types.
#[derive(Clone, Debug, PartialEq)]
pub enum Distribution {
    /// A floating-point distribution.
    Float(FloatDistribution),
    /// An integer distribution.
    Int(IntDistribution),
    /// A categorical distribution.
    Categorical(CategoricalDistribution),
}

impl Distribution {
    /// Whether the domain contains exactly one value.
    #[must_use]
    pub fn single(&self) -> bool {
        match self {
            Self::Float(d) => d.single(),
            Self::Int(d) => d.single(),
            Self::Categorical(d) => d.single(),
        }
    }

    /// Whether the value lies in this distribution's domain.
    #[must_use]
    pub fn contains(&self, value: &ParamValue) -> bool {
        match self {
            Self::Float(d) => d.contains(value),
            Self::Int(d) => d.contains(value),
            Self::Categorical(d) => d.contains(value),
        }
    }

    /// Converts an external value into the internal `f64` representation.
    ///
    /// # Errors
    ///
    /// Propagates the conversion error of the wrapped distribution.
    pub fn to_internal(&self, value: &ParamValue) -> Result<f64> {
        match self {
            Self::Float(d) => d.to_internal(value),
            Self::Int(d) => d.to_internal(value),
            Self::Categorical(d) => d.to_internal(value),
        }
    }

    /// Converts an internal `f64` back into an external value.
    ///
    /// # Errors
    ///
    /// Propagates the conversion error of the wrapped distribution.
    pub fn to_external(&self, value: f64) -> Result<ParamValue> {
        match self {
            Self::Float(d) => d.to_external(value),
            Self::Int(d) => d.to_external(value),
            Self::Categorical(d) => d.to_external(value),
        }
    }
}

impl From<FloatDistribution> for Distribution {
    fn from(d: FloatDistribution) -> Self {
        Self::Float(d)
    }
}

impl From<IntDistribution> for Distribution {
    fn from(d: IntDistribution) -> Self {
        Self::Int(d)
    }
}

impl From<CategoricalDistribution> for Distribution {
    fn from(d: CategoricalDistribution) -> Self {
        Self::Categorical(d)
    }
}

fn numeric_internal(value: &ParamValue, log_scale: bool) -> Result<f64> {
    let v = value.as_f64().ok_or(Error::NonNumericParamValue)?;
    if v.is_nan() {
        return Err(Error::NanParamValue);
    }
    if log_scale && v <= 0.0 {
        return Err(Error::NonPositiveLogValue { value: v });
    }
    Ok(v)
}

/// Maps an external numeric value into the sampling coordinate.
///
/// Log-scale distributions move to log space only when `transform_log` is
/// set; discretized distributions keep their external coordinate here and
/// widen their bounds at the call sites instead.
pub(crate) fn transform(value: f64, dist: &Distribution, transform_log: bool) -> f64 {
    let log_scale = match dist {
        Distribution::Float(d) => d.log_scale(),
        Distribution::Int(d) => d.log_scale(),
        Distribution::Categorical(_) => false,
    };
    if log_scale && transform_log {
        value.ln()
    } else {
        value
    }
}

/// Maps a sampling-coordinate value back into the internal representation,
/// rounding onto step grids and keeping continuous values strictly below the
/// upper bound.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn untransform(value: f64, dist: &Distribution, transform_log: bool) -> f64 {
    match dist {
        Distribution::Float(d) => {
            if d.log_scale() {
                let param = if transform_log { value.exp() } else { value };
                if d.single() {
                    param
                } else {
                    js_min(param, next_after(d.high(), d.high() - 1.0))
                }
            } else if let Some(s) = d.step() {
                let rounded = round_to_nearest_even((value - d.low()) / s) * s + d.low();
                clip(rounded, d.low(), d.high())
            } else if d.single() {
                value
            } else {
                js_min(value, next_after(d.high(), d.high() - 1.0))
            }
        }
        Distribution::Int(d) => {
            let low = d.low() as f64;
            let high = d.high() as f64;
            if d.log_scale() {
                if transform_log {
                    clip(round_to_nearest_even(value.exp()), low, high).trunc()
                } else {
                    value.trunc()
                }
            } else {
                let step = d.step() as f64;
                clip(
                    round_to_nearest_even((value - low) / step) * step + low,
                    low,
                    high,
                )
                .trunc()
            }
        }
        Distribution::Categorical(_) => value,
    }
}
