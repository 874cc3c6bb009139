//! JSON snapshots capturing a study mid-run.
//!
//! A snapshot freezes the whole optimization: directions, every trial, the
//! sampler configuration, and both RNG states. Restoring it resumes the run
//! bit-for-bit, as long as any custom functions are supplied again.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::distribution::{
    CategoricalDistribution, Distribution, FloatDistribution, IntDistribution,
};
use crate::error::{Error, Result};
use crate::param::ParamValue;
use crate::parzen::WeightsFn;
use crate::rng::Mt19937State;
use crate::sampler::{ConstraintsFunc, FunctionSpec, GammaFunc, TpeSampler};
use crate::trial::{AttrValue, FrozenTrial};
use crate::types::{Direction, TrialState};

use super::Study;

const SNAPSHOT_MAGIC: &str = "optuna_tpe_study_snapshot";
const SNAPSHOT_VERSION: u64 = 1;

/// Marker key wrapping numbers JSON cannot represent directly.
const SPECIAL_NUMBER_MARKER: &str = "__optuna_tpe_special_number__";

const BUILTIN_GAMMA: &str = "defaultGamma";
const BUILTIN_WEIGHTS: &str = "defaultWeights";

/// Custom functions a snapshot cannot carry.
///
/// Function specs in a snapshot record only whether a builtin or a custom
/// function was configured. Restoring a study whose sampler used custom
/// functions requires providing them again here.
#[derive(Clone, Default)]
pub struct SamplerFunctions {
    /// Replacement for a custom split-size function.
    pub gamma: Option<Arc<GammaFunc>>,
    /// Replacement for a custom observation-weight function.
    pub weights: Option<Arc<WeightsFn>>,
    /// Replacement for a custom constraints function.
    pub constraints: Option<Arc<ConstraintsFunc>>,
}

impl Study<TpeSampler> {
    /// Serializes the study, its trials, and the full sampler state.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if assembling the JSON value fails.
    pub fn to_snapshot(&self) -> Result<Value> {
        let trials: Vec<Value> = self.trials.iter().map(trial_to_value).collect();
        trace_info!("snapshot captured with {} trials", trials.len());
        Ok(json!({
            "magic": SNAPSHOT_MAGIC,
            "version": SNAPSHOT_VERSION,
            "directions": serde_json::to_value(&self.directions)?,
            "sampler": sampler_to_value(&self.sampler)?,
            "trials": trials,
        }))
    }

    /// Serializes the study to a JSON string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] if serialization fails.
    pub fn to_snapshot_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.to_snapshot()?)?)
    }

    /// Restores a study from a snapshot value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotFormat`] for malformed payloads, including a
    /// custom function spec without a matching entry in `functions`.
    pub fn from_snapshot(snapshot: &Value, functions: &SamplerFunctions) -> Result<Self> {
        let obj = snapshot
            .as_object()
            .ok_or_else(|| Error::SnapshotFormat("study snapshot must be an object".to_owned()))?;

        match obj.get("magic").and_then(Value::as_str) {
            Some(SNAPSHOT_MAGIC) => {}
            other => {
                return Err(Error::SnapshotFormat(format!(
                    "invalid study snapshot magic {other:?}"
                )))
            }
        }
        match obj.get("version").and_then(Value::as_u64) {
            Some(SNAPSHOT_VERSION) => {}
            other => {
                return Err(Error::SnapshotFormat(format!(
                    "unsupported study snapshot version {other:?}"
                )))
            }
        }

        let directions: Vec<Direction> = serde_json::from_value(
            obj.get("directions").cloned().unwrap_or(Value::Null),
        )
        .map_err(|_| Error::SnapshotFormat("missing or invalid directions".to_owned()))?;
        if directions.is_empty() {
            return Err(Error::SnapshotFormat("missing directions".to_owned()));
        }

        let sampler_payload = obj
            .get("sampler")
            .ok_or_else(|| Error::SnapshotFormat("missing sampler payload".to_owned()))?;
        let sampler = sampler_from_value(sampler_payload, functions)?;

        let trial_payloads = obj
            .get("trials")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::SnapshotFormat("missing trials array".to_owned()))?;
        let trials = trial_payloads
            .iter()
            .map(trial_from_value)
            .collect::<Result<Vec<_>>>()?;
        trace_info!("snapshot restored with {} trials", trials.len());

        Ok(Self {
            sampler,
            directions,
            trials,
        })
    }

    /// Restores a study from a snapshot string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`] for invalid JSON and [`Error::SnapshotFormat`]
    /// for structurally invalid snapshots.
    pub fn from_snapshot_str(snapshot: &str, functions: &SamplerFunctions) -> Result<Self> {
        let value: Value = serde_json::from_str(snapshot)?;
        Self::from_snapshot(&value, functions)
    }
}

fn special_number(token: &str) -> Value {
    let mut map = Map::new();
    map.insert(
        SPECIAL_NUMBER_MARKER.to_owned(),
        Value::String(token.to_owned()),
    );
    Value::Object(map)
}

fn encode_f64(value: f64) -> Value {
    if value.is_nan() {
        return special_number("NaN");
    }
    if value == f64::INFINITY {
        return special_number("+Infinity");
    }
    if value == f64::NEG_INFINITY {
        return special_number("-Infinity");
    }
    if value == 0.0 && value.is_sign_negative() {
        return special_number("-0");
    }
    json!(value)
}

fn decode_f64(value: &Value) -> Result<f64> {
    if let Some(number) = value.as_f64() {
        return Ok(number);
    }
    if let Some(obj) = value.as_object() {
        if obj.len() == 1 {
            if let Some(token) = obj.get(SPECIAL_NUMBER_MARKER).and_then(Value::as_str) {
                return match token {
                    "NaN" => Ok(f64::NAN),
                    "+Infinity" => Ok(f64::INFINITY),
                    "-Infinity" => Ok(f64::NEG_INFINITY),
                    "-0" => Ok(-0.0),
                    other => Err(Error::SnapshotFormat(format!(
                        "unknown serialized number token {other:?}"
                    ))),
                };
            }
        }
    }
    Err(Error::SnapshotFormat(format!(
        "expected a number, got {value}"
    )))
}

fn encode_param(value: &ParamValue) -> Value {
    match value {
        ParamValue::Int(i) => json!(i),
        ParamValue::Float(f) => encode_f64(*f),
        ParamValue::Bool(b) => json!(b),
        ParamValue::Str(s) => json!(s),
    }
}

fn decode_param(value: &Value) -> Result<ParamValue> {
    match value {
        Value::Bool(b) => Ok(ParamValue::Bool(*b)),
        Value::String(s) => Ok(ParamValue::Str(s.clone())),
        Value::Number(n) => n.as_i64().map_or_else(
            || {
                n.as_f64().map(ParamValue::Float).ok_or_else(|| {
                    Error::SnapshotFormat(format!("unrepresentable parameter value {n}"))
                })
            },
            |i| Ok(ParamValue::Int(i)),
        ),
        Value::Object(_) => Ok(ParamValue::Float(decode_f64(value)?)),
        other => Err(Error::SnapshotFormat(format!(
            "invalid parameter value {other}"
        ))),
    }
}

fn encode_attr(attr: &AttrValue) -> Value {
    match attr {
        AttrValue::Null => Value::Null,
        AttrValue::Int(i) => json!(i),
        AttrValue::Str(s) => json!(s),
        AttrValue::FloatVec(values) => {
            Value::Array(values.iter().map(|&v| encode_f64(v)).collect())
        }
        AttrValue::Params(params) => Value::Object(
            params
                .iter()
                .map(|(name, value)| (name.clone(), encode_param(value)))
                .collect(),
        ),
    }
}

fn decode_attr(value: &Value) -> Result<AttrValue> {
    match value {
        Value::Null => Ok(AttrValue::Null),
        Value::String(s) => Ok(AttrValue::Str(s.clone())),
        Value::Number(n) => n.as_i64().map(AttrValue::Int).ok_or_else(|| {
            Error::SnapshotFormat(format!("unsupported system attribute value {n}"))
        }),
        Value::Bool(b) => Err(Error::SnapshotFormat(format!(
            "unsupported system attribute value {b}"
        ))),
        Value::Array(items) => Ok(AttrValue::FloatVec(
            items.iter().map(decode_f64).collect::<Result<Vec<_>>>()?,
        )),
        Value::Object(entries) => {
            let mut params = BTreeMap::new();
            for (name, item) in entries {
                params.insert(name.clone(), decode_param(item)?);
            }
            Ok(AttrValue::Params(params))
        }
    }
}

fn distribution_to_value(distribution: &Distribution) -> Value {
    match distribution {
        Distribution::Float(d) => json!({
            "type": "FloatDistribution",
            "low": encode_f64(d.low()),
            "high": encode_f64(d.high()),
            "log": d.log_scale(),
            "step": d.step().map_or(Value::Null, encode_f64),
        }),
        Distribution::Int(d) => json!({
            "type": "IntDistribution",
            "low": d.low(),
            "high": d.high(),
            "log": d.log_scale(),
            "step": d.step(),
        }),
        Distribution::Categorical(d) => json!({
            "type": "CategoricalDistribution",
            "choices": d.choices().iter().map(encode_param).collect::<Vec<_>>(),
        }),
    }
}

fn distribution_from_value(value: &Value) -> Result<Distribution> {
    let obj = value.as_object().ok_or_else(|| {
        Error::SnapshotFormat("distribution payload must be an object".to_owned())
    })?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::SnapshotFormat("distribution payload missing type".to_owned()))?;
    let log = obj.get("log").and_then(Value::as_bool).unwrap_or(false);

    match kind {
        "FloatDistribution" => {
            let low = decode_f64(obj.get("low").unwrap_or(&Value::Null))?;
            let high = decode_f64(obj.get("high").unwrap_or(&Value::Null))?;
            let step = match obj.get("step") {
                None | Some(Value::Null) => None,
                Some(v) => Some(decode_f64(v)?),
            };
            Ok(Distribution::Float(FloatDistribution::new(
                low, high, log, step,
            )?))
        }
        "IntDistribution" => {
            let low = int_field(obj, "low")?;
            let high = int_field(obj, "high")?;
            let step = int_field(obj, "step")?;
            Ok(Distribution::Int(IntDistribution::new(
                low, high, log, step,
            )?))
        }
        "CategoricalDistribution" => {
            let choices = obj
                .get("choices")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_param).collect::<Result<Vec<_>>>())
                .transpose()?
                .unwrap_or_default();
            Ok(Distribution::Categorical(CategoricalDistribution::new(
                choices,
            )?))
        }
        other => Err(Error::SnapshotFormat(format!(
            "unknown serialized distribution type {other:?}"
        ))),
    }
}

fn int_field(obj: &Map<String, Value>, key: &str) -> Result<i64> {
    obj.get(key).and_then(Value::as_i64).ok_or_else(|| {
        Error::SnapshotFormat(format!("distribution payload field {key:?} must be an integer"))
    })
}

fn trial_to_value(trial: &FrozenTrial) -> Value {
    let params: Map<String, Value> = trial
        .params
        .iter()
        .map(|(name, value)| (name.clone(), encode_param(value)))
        .collect();
    let distributions: Map<String, Value> = trial
        .distributions
        .iter()
        .map(|(name, dist)| (name.clone(), distribution_to_value(dist)))
        .collect();
    let system_attrs: Map<String, Value> = trial
        .system_attrs
        .iter()
        .map(|(name, attr)| (name.clone(), encode_attr(attr)))
        .collect();
    let intermediate_values: Map<String, Value> = trial
        .intermediate_values
        .iter()
        .map(|(step, value)| (step.clone(), encode_f64(*value)))
        .collect();

    json!({
        "number": trial.number,
        "state": trial.state,
        "params": params,
        "distributions": distributions,
        "system_attrs": system_attrs,
        "intermediate_values": intermediate_values,
        "value": trial.value.map_or(Value::Null, encode_f64),
        "values": trial.values.as_ref().map_or(Value::Null, |values| {
            Value::Array(values.iter().map(|&v| encode_f64(v)).collect())
        }),
    })
}

fn trial_from_value(value: &Value) -> Result<FrozenTrial> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::SnapshotFormat("trial payload must be an object".to_owned()))?;

    let number = obj
        .get("number")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
        .ok_or_else(|| Error::SnapshotFormat("trial payload missing number".to_owned()))?;
    let state: TrialState =
        serde_json::from_value(obj.get("state").cloned().unwrap_or(Value::Null))
            .map_err(|_| Error::SnapshotFormat("trial payload has an invalid state".to_owned()))?;

    let mut trial = FrozenTrial::new(number);
    trial.state = state;

    if let Some(params) = obj.get("params").and_then(Value::as_object) {
        for (name, item) in params {
            trial.params.insert(name.clone(), decode_param(item)?);
        }
    }
    if let Some(distributions) = obj.get("distributions").and_then(Value::as_object) {
        for (name, item) in distributions {
            trial
                .distributions
                .insert(name.clone(), distribution_from_value(item)?);
        }
    }
    if let Some(attrs) = obj.get("system_attrs").and_then(Value::as_object) {
        for (name, item) in attrs {
            trial.system_attrs.insert(name.clone(), decode_attr(item)?);
        }
    }
    if let Some(intermediate) = obj.get("intermediate_values").and_then(Value::as_object) {
        for (step, item) in intermediate {
            trial
                .intermediate_values
                .insert(step.clone(), decode_f64(item)?);
        }
    }
    trial.value = match obj.get("value") {
        None | Some(Value::Null) => None,
        Some(v) => Some(decode_f64(v)?),
    };
    trial.values = match obj.get("values") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(items.iter().map(decode_f64).collect::<Result<_>>()?),
        Some(other) => {
            return Err(Error::SnapshotFormat(format!(
                "trial values must be an array, got {other}"
            )))
        }
    };

    Ok(trial)
}

fn sampler_to_value(sampler: &TpeSampler) -> Result<Value> {
    Ok(json!({
        "samplerType": "TPESampler",
        "config": {
            "priorWeight": sampler.prior_weight(),
            "considerMagicClip": sampler.consider_magic_clip(),
            "considerEndpoints": sampler.consider_endpoints(),
            "nStartupTrials": sampler.n_startup_trials(),
            "nEiCandidates": sampler.n_ei_candidates(),
            "multivariate": sampler.multivariate(),
            "group": sampler.group(),
            "warnIndependentSampling": sampler.warn_independent_sampling(),
            "constantLiar": sampler.constant_liar(),
            "gamma": serde_json::to_value(sampler.gamma_spec())?,
            "weights": serde_json::to_value(sampler.weights_spec())?,
            "constraintsFunc": serde_json::to_value(sampler.constraints_spec())?,
            "categoricalDistanceFunc": serde_json::to_value(FunctionSpec::None)?,
        },
        "rngState": serde_json::to_value(sampler.rng_state())?,
        "randomSamplerRngState": serde_json::to_value(sampler.random_sampler_rng_state())?,
    }))
}

fn function_spec_field(config: &Map<String, Value>, key: &str) -> Result<FunctionSpec> {
    let value = config
        .get(key)
        .ok_or_else(|| Error::SnapshotFormat(format!("missing function spec for {key:?}")))?;
    serde_json::from_value(value.clone())
        .map_err(|_| Error::SnapshotFormat(format!("invalid function spec for {key:?}")))
}

#[allow(clippy::too_many_lines)]
fn sampler_from_value(payload: &Value, functions: &SamplerFunctions) -> Result<TpeSampler> {
    let obj = payload
        .as_object()
        .ok_or_else(|| Error::SnapshotFormat("sampler payload must be an object".to_owned()))?;
    if obj.get("samplerType").and_then(Value::as_str) != Some("TPESampler") {
        return Err(Error::SnapshotFormat(
            "unsupported sampler snapshot payload".to_owned(),
        ));
    }

    let empty = Map::new();
    let config = obj
        .get("config")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let mut builder = TpeSampler::builder().seed(0);
    if let Some(v) = config.get("priorWeight").and_then(Value::as_f64) {
        builder = builder.prior_weight(v);
    }
    builder = builder.consider_magic_clip(
        config
            .get("considerMagicClip")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );
    builder = builder.consider_endpoints(
        config
            .get("considerEndpoints")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );
    if let Some(n) = config
        .get("nStartupTrials")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
    {
        builder = builder.n_startup_trials(n);
    }
    if let Some(n) = config
        .get("nEiCandidates")
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
    {
        builder = builder.n_ei_candidates(n);
    }
    builder = builder.multivariate(
        config
            .get("multivariate")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );
    builder = builder.group(config.get("group").and_then(Value::as_bool).unwrap_or(false));
    builder = builder.warn_independent_sampling(
        config
            .get("warnIndependentSampling")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );
    builder = builder.constant_liar(
        config
            .get("constantLiar")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    );

    match function_spec_field(config, "gamma")? {
        FunctionSpec::Builtin { name } if name == BUILTIN_GAMMA => {}
        FunctionSpec::Builtin { name } => {
            return Err(Error::SnapshotFormat(format!(
                "unknown builtin function {name:?} for \"gamma\""
            )))
        }
        FunctionSpec::Custom { .. } => match &functions.gamma {
            Some(gamma) => {
                let gamma = Arc::clone(gamma);
                builder = builder.gamma_fn(move |n| gamma(n));
            }
            None => {
                return Err(Error::SnapshotFormat(
                    "snapshot requires a custom function for \"gamma\"".to_owned(),
                ))
            }
        },
        FunctionSpec::None => {
            return Err(Error::SnapshotFormat(
                "unsupported function spec kind \"none\" for \"gamma\"".to_owned(),
            ))
        }
    }

    match function_spec_field(config, "weights")? {
        FunctionSpec::Builtin { name } if name == BUILTIN_WEIGHTS => {}
        FunctionSpec::Builtin { name } => {
            return Err(Error::SnapshotFormat(format!(
                "unknown builtin function {name:?} for \"weights\""
            )))
        }
        FunctionSpec::Custom { .. } => match &functions.weights {
            Some(weights) => {
                let weights = Arc::clone(weights);
                builder = builder.weights_fn(move |n| weights(n));
            }
            None => {
                return Err(Error::SnapshotFormat(
                    "snapshot requires a custom function for \"weights\"".to_owned(),
                ))
            }
        },
        FunctionSpec::None => {
            return Err(Error::SnapshotFormat(
                "unsupported function spec kind \"none\" for \"weights\"".to_owned(),
            ))
        }
    }

    match function_spec_field(config, "constraintsFunc")? {
        FunctionSpec::None => {}
        FunctionSpec::Custom { .. } => match &functions.constraints {
            Some(constraints) => {
                let constraints = Arc::clone(constraints);
                builder = builder.constraints_fn(move |trial| constraints(trial));
            }
            None => {
                return Err(Error::SnapshotFormat(
                    "snapshot requires a custom function for \"constraintsFunc\"".to_owned(),
                ))
            }
        },
        FunctionSpec::Builtin { .. } => {
            return Err(Error::SnapshotFormat(
                "unsupported function spec kind \"builtin\" for \"constraintsFunc\"".to_owned(),
            ))
        }
    }

    match function_spec_field(config, "categoricalDistanceFunc")? {
        FunctionSpec::None => {}
        _ => {
            return Err(Error::SnapshotFormat(
                "categorical distance functions are not supported".to_owned(),
            ))
        }
    }

    let sampler = builder.build()?;

    let rng_state: Mt19937State = serde_json::from_value(
        obj.get("rngState").cloned().unwrap_or(Value::Null),
    )
    .map_err(|_| Error::SnapshotFormat("invalid RNG state payload".to_owned()))?;
    sampler.set_rng_state(&rng_state)?;

    let random_state: Mt19937State = serde_json::from_value(
        obj.get("randomSamplerRngState").cloned().unwrap_or(Value::Null),
    )
    .map_err(|_| Error::SnapshotFormat("invalid RNG state payload".to_owned()))?;
    sampler.set_random_sampler_rng_state(&random_state)?;

    Ok(sampler)
}
