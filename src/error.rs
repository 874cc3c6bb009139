//! Crate-wide error type.

/// Everything that can go wrong while defining search spaces, sampling, or
/// snapshotting a study.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Returned when the lower bound is greater than the upper bound.
    #[error("invalid bounds: low ({low}) must be less than or equal to high ({high})")]
    InvalidBounds {
        /// The lower bound value.
        low: f64,
        /// The upper bound value.
        high: f64,
    },

    /// Returned when log scale is used with a non-positive lower bound.
    #[error("invalid log bounds: low ({low}) must be positive for log scale")]
    InvalidLogBounds {
        /// The offending lower bound value.
        low: f64,
    },

    /// Returned when a step size is not positive.
    #[error("invalid step: step ({step}) must be positive")]
    InvalidStep {
        /// The offending step value.
        step: f64,
    },

    /// Returned when a step grid is combined with log scale.
    #[error("step is not supported together with log scale")]
    StepWithLogScale,

    /// Returned when categorical choices are empty.
    #[error("categorical choices cannot be empty")]
    EmptyChoices,

    /// Returned when a NaN value is passed where a parameter value is expected.
    #[error("parameter value cannot be NaN")]
    NanParamValue,

    /// Returned when a non-numeric value is passed to a numeric distribution.
    #[error("expected a numeric parameter value")]
    NonNumericParamValue,

    /// Returned when a value is outside the domain of a log-scale distribution.
    #[error("value ({value}) must be positive on a log-scale domain")]
    NonPositiveLogValue {
        /// The offending value.
        value: f64,
    },

    /// Returned when a value is not among the choices of a categorical
    /// distribution.
    #[error("value ({value}) is not among the categorical choices")]
    UnknownChoice {
        /// Display form of the offending value.
        value: String,
    },

    /// Returned when a suggested value cannot be converted to the requested
    /// Rust type, e.g. a fixed string parameter suggested as a float.
    #[error("parameter '{name}' cannot be converted to the requested type")]
    ParamTypeMismatch {
        /// The name of the parameter.
        name: String,
    },

    /// Returned when the Parzen prior weight is negative.
    #[error("prior weight ({0}) must be non-negative")]
    InvalidPriorWeight(f64),

    /// Returned when a weights function produces an unusable vector.
    #[error("invalid kernel weights: {reason}")]
    InvalidWeights {
        /// What was wrong with the weights.
        reason: &'static str,
    },

    /// Returned when predetermined kernel weights do not cover every
    /// observation row.
    #[error("weight count mismatch: expected {expected} weights, got {got}")]
    WeightCountMismatch {
        /// The number of observation rows.
        expected: usize,
        /// The number of weights provided.
        got: usize,
    },

    /// Returned when candidate comparison receives an empty sample batch.
    #[error("samples size must be positive")]
    EmptySamples,

    /// Returned when the sample batch and acquisition values disagree in size.
    #[error("samples size ({samples}) and acquisition size ({acquisition}) mismatch")]
    AcquisitionSizeMismatch {
        /// The number of candidate samples.
        samples: usize,
        /// The number of acquisition values.
        acquisition: usize,
    },

    /// Returned when a non-domination rank is requested with a budget of zero.
    #[error("rank budget must be positive")]
    NonPositiveRankBudget,

    /// Returned when a penalty vector does not match the number of loss rows.
    #[error("penalty length ({got}) does not match loss rows ({expected})")]
    PenaltyCountMismatch {
        /// The number of loss rows.
        expected: usize,
        /// The number of penalty values.
        got: usize,
    },

    /// Returned when a hypervolume is requested for points that do not
    /// dominate the reference point.
    #[error("all points must dominate or equal the reference point")]
    ReferencePointNotDominant,

    /// Returned when a trial in an unexpected state reaches the history split.
    #[error("unexpected trial state {0:?} in split")]
    UnexpectedTrialState(crate::types::TrialState),

    /// Returned when group decomposition is requested without multivariate
    /// sampling.
    #[error("group decomposition requires multivariate sampling")]
    GroupWithoutMultivariate,

    /// Returned when a constraints function produces a NaN component.
    #[error("constraint values cannot be NaN")]
    NanConstraint,

    /// Returned when a study is created without directions.
    #[error("study requires at least one direction")]
    EmptyDirections,

    /// Returned when a single-objective trial completes without a value.
    #[error("single-objective study requires a numeric value on a complete trial")]
    MissingObjectiveValue,

    /// Returned when a multi-objective trial completes without values.
    #[error("multi-objective study requires objective values on a complete trial")]
    MissingObjectiveValues,

    /// Returned when a trial number does not exist in the study.
    #[error("unknown trial number {0}")]
    UnknownTrial(usize),

    /// Returned when a study snapshot is malformed or unsupported.
    #[error("invalid study snapshot: {0}")]
    SnapshotFormat(String),

    /// Returned when snapshot JSON cannot be produced or parsed.
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Alias for `Result` with this crate's [`Error`].
pub type Result<T> = core::result::Result<T, Error>;
