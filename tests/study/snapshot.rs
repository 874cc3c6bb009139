use std::sync::Arc;

use tpe::prelude::*;
use tpe::CONSTRAINTS_KEY;

fn run_trials(study: &mut Study<TpeSampler>, count: usize) {
    for _ in 0..count {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        let i = trial.suggest_int("i", 0, 10).unwrap();
        let number = trial.number();
        study
            .tell(number, (x - 1.0).powi(2) + (i as f64 - 3.0).powi(2))
            .unwrap();
    }
}

#[test]
fn test_restore_continues_bit_for_bit() {
    let sampler = TpeSampler::builder()
        .seed(23)
        .n_startup_trials(3)
        .build()
        .unwrap();
    let mut original = Study::new(sampler, Direction::Minimize);
    run_trials(&mut original, 8);

    let encoded = original.to_snapshot_string().unwrap();
    let mut restored =
        Study::from_snapshot_str(&encoded, &SamplerFunctions::default()).unwrap();

    assert_eq!(original.trials(), restored.trials());

    run_trials(&mut original, 12);
    run_trials(&mut restored, 12);
    assert_eq!(original.trials(), restored.trials());
}

#[test]
fn test_restore_preserves_every_trial_detail() {
    let sampler = TpeSampler::builder()
        .seed(29)
        .n_startup_trials(4)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for round in 0..9 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        let number = trial.number();
        match round % 3 {
            0 => study.tell(number, x * x).unwrap(),
            1 => {
                trial.report(x.abs(), 0);
                trial.report(x.abs() / 2.0, 1);
                study.tell_pruned(number).unwrap();
            }
            _ => study.tell_failed(number).unwrap(),
        }
    }

    let encoded = study.to_snapshot_string().unwrap();
    let restored =
        Study::from_snapshot_str(&encoded, &SamplerFunctions::default()).unwrap();

    assert_eq!(study.trials(), restored.trials());
    assert_eq!(study.directions(), restored.directions());
}

#[test]
fn test_restore_covers_multivariate_liar_state() {
    let build = || {
        TpeSampler::builder()
            .seed(31)
            .n_startup_trials(4)
            .multivariate(true)
            .constant_liar(true)
            .build()
            .unwrap()
    };
    let mut original = Study::new(build(), Direction::Minimize);
    run_trials(&mut original, 10);

    let snapshot = original.to_snapshot().unwrap();
    let mut restored =
        Study::from_snapshot(&snapshot, &SamplerFunctions::default()).unwrap();

    assert!(restored.sampler().multivariate());
    assert!(restored.sampler().constant_liar());

    run_trials(&mut original, 8);
    run_trials(&mut restored, 8);
    assert_eq!(original.trials(), restored.trials());
}

#[test]
fn test_restore_requires_custom_function_overrides() {
    let sampler = TpeSampler::builder()
        .seed(37)
        .n_startup_trials(3)
        .gamma_fn(|n| (n / 3).clamp(1, 25))
        .build()
        .unwrap();
    let mut original = Study::new(sampler, Direction::Minimize);
    run_trials(&mut original, 8);

    let encoded = original.to_snapshot_string().unwrap();

    // Without the override the snapshot cannot name the custom gamma.
    assert!(Study::from_snapshot_str(&encoded, &SamplerFunctions::default()).is_err());

    let functions = SamplerFunctions {
        gamma: Some(Arc::new(|n| (n / 3).clamp(1, 25))),
        ..SamplerFunctions::default()
    };
    let mut restored = Study::from_snapshot_str(&encoded, &functions).unwrap();

    run_trials(&mut original, 8);
    run_trials(&mut restored, 8);
    assert_eq!(original.trials(), restored.trials());
}

#[test]
fn test_restore_reattaches_constraints() {
    let constraint = |trial: &FrozenTrial| {
        let x = match trial.params.get("x") {
            Some(ParamValue::Float(v)) => *v,
            _ => 0.0,
        };
        vec![x - 1.0]
    };
    let sampler = TpeSampler::builder()
        .seed(41)
        .n_startup_trials(3)
        .constraints_fn(constraint)
        .build()
        .unwrap();
    let mut original = Study::new(sampler, Direction::Minimize);
    run_trials(&mut original, 6);

    let encoded = original.to_snapshot_string().unwrap();
    let functions = SamplerFunctions {
        constraints: Some(Arc::new(constraint)),
        ..SamplerFunctions::default()
    };
    let mut restored = Study::from_snapshot_str(&encoded, &functions).unwrap();

    run_trials(&mut restored, 4);
    assert!(restored
        .trials()
        .iter()
        .skip(6)
        .all(|t| t.system_attrs.contains_key(CONSTRAINTS_KEY)));
}

#[test]
fn test_restore_keeps_directions() {
    let sampler = TpeSampler::builder().seed(43).build().unwrap();
    let mut study = Study::with_directions(
        sampler,
        vec![Direction::Minimize, Direction::Maximize],
    )
    .unwrap();

    for _ in 0..5 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
        let number = trial.number();
        study.tell_values(number, vec![x, 1.0 - x]).unwrap();
    }

    let encoded = study.to_snapshot_string().unwrap();
    let restored =
        Study::from_snapshot_str(&encoded, &SamplerFunctions::default()).unwrap();

    assert_eq!(
        restored.directions(),
        &[Direction::Minimize, Direction::Maximize]
    );
    assert!(restored.is_multi_objective());
    assert_eq!(study.trials(), restored.trials());
}

#[test]
fn test_snapshot_is_plain_json() {
    let sampler = TpeSampler::builder().seed(47).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);
    run_trials(&mut study, 3);

    let encoded = study.to_snapshot_string().unwrap();
    let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
    assert_eq!(value["magic"], "optuna_tpe_study_snapshot");
    assert_eq!(value["version"], 1);
    assert_eq!(value["trials"].as_array().map(Vec::len), Some(3));
}
