//! Frozen trial records as stored by a study.

use std::collections::BTreeMap;

use crate::distribution::Distribution;
use crate::param::ParamValue;
use crate::types::TrialState;

/// System attribute key under which constraint evaluations are recorded.
pub const CONSTRAINTS_KEY: &str = "constraints";

/// System attribute key carrying parameters fixed by
/// [`Study::enqueue_trial`](crate::Study::enqueue_trial).
pub const FIXED_PARAMS_KEY: &str = "fixed_params";

/// A value stored in a trial's system attributes.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    /// Explicit null, recorded when a producer yielded no usable value.
    Null,
    /// Integer payload.
    Int(i64),
    /// String payload, also used for chunked JSON blobs.
    Str(String),
    /// Vector of floats, as stored by the constraints hook.
    FloatVec(Vec<f64>),
    /// Parameter assignments attached when a trial is enqueued.
    Params(BTreeMap<String, ParamValue>),
}

/// An immutable record of a trial: its parameters, their distributions, and
/// any reported objective values.
///
/// `value` is set for single-objective studies, `values` for multi-objective
/// ones; both stay `None` while the trial is running.
#[derive(Clone, Debug, PartialEq)]
pub struct FrozenTrial {
    /// Position of the trial within its study, starting at zero.
    pub number: usize,
    /// Lifecycle state.
    pub state: TrialState,
    /// Suggested parameters in their external representation.
    pub params: BTreeMap<String, ParamValue>,
    /// The distribution each parameter was suggested from.
    pub distributions: BTreeMap<String, Distribution>,
    /// Internal bookkeeping attributes.
    pub system_attrs: BTreeMap<String, AttrValue>,
    /// Intermediate objective reports, keyed by the stringified step.
    pub intermediate_values: BTreeMap<String, f64>,
    /// Final objective value of a single-objective trial.
    pub value: Option<f64>,
    /// Final objective values of a multi-objective trial.
    pub values: Option<Vec<f64>>,
}

impl FrozenTrial {
    /// An empty running trial with the given number.
    #[must_use]
    pub fn new(number: usize) -> Self {
        Self {
            number,
            state: TrialState::Running,
            params: BTreeMap::new(),
            distributions: BTreeMap::new(),
            system_attrs: BTreeMap::new(),
            intermediate_values: BTreeMap::new(),
            value: None,
            values: None,
        }
    }

    /// The recorded constraint evaluations, if the constraints hook ran.
    ///
    /// `Some(None)` means the hook ran but produced no usable values.
    #[must_use]
    pub fn constraint_values(&self) -> Option<Option<&[f64]>> {
        match self.system_attrs.get(CONSTRAINTS_KEY) {
            Some(AttrValue::FloatVec(v)) => Some(Some(v)),
            Some(_) => Some(None),
            None => None,
        }
    }
}
