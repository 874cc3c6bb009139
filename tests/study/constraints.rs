use tpe::prelude::*;
use tpe::{Error, CONSTRAINTS_KEY};

#[test]
fn test_constraints_are_recorded_on_completion() {
    // Feasible iff x <= 0; the constraint value is x itself.
    let sampler = TpeSampler::builder()
        .seed(41)
        .constraints_fn(|trial: &FrozenTrial| {
            let x = match trial.params.get("x") {
                Some(ParamValue::Float(v)) => *v,
                _ => 0.0,
            };
            vec![x]
        })
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..10 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
        let number = trial.number();
        study.tell(number, x * x).unwrap();
    }

    for trial in study.trials() {
        let x = match trial.params.get("x") {
            Some(ParamValue::Float(v)) => *v,
            other => panic!("missing x: {other:?}"),
        };
        match trial.system_attrs.get(CONSTRAINTS_KEY) {
            Some(AttrValue::FloatVec(cs)) => assert_eq!(cs, &vec![x]),
            other => panic!("constraints not recorded: {other:?}"),
        }
    }
}

#[test]
fn test_nan_constraint_marks_the_trial_and_errors() {
    let sampler = TpeSampler::builder()
        .seed(43)
        .constraints_fn(|_: &FrozenTrial| vec![f64::NAN])
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    let mut trial = study.ask();
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    let number = trial.number();
    let result = study.tell(number, x);
    assert!(matches!(result, Err(Error::NanConstraint)));

    // The trial itself still finishes; only the constraint entry is void.
    let frozen = &study.trials()[0];
    assert_eq!(frozen.state, TrialState::Complete);
    assert_eq!(frozen.value, Some(x));
    assert_eq!(frozen.system_attrs.get(CONSTRAINTS_KEY), Some(&AttrValue::Null));
}

#[test]
fn test_constraints_cover_pruned_but_not_failed_trials() {
    let sampler = TpeSampler::builder()
        .seed(47)
        .constraints_fn(|_: &FrozenTrial| vec![-1.0])
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    let mut trial = study.ask();
    let _ = trial.suggest_float("x", 0.0, 1.0).unwrap();
    let number = trial.number();
    study.tell_failed(number).unwrap();

    let mut trial = study.ask();
    let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
    let number = trial.number();
    study.tell_pruned(number).unwrap();

    let mut trial = study.ask();
    let _ = trial.suggest_float("x", 0.0, 1.0).unwrap();
    let number = trial.number();
    study.tell(number, x).unwrap();

    let trials = study.trials();
    assert!(!trials[0].system_attrs.contains_key(CONSTRAINTS_KEY));
    assert!(trials[1].system_attrs.contains_key(CONSTRAINTS_KEY));
    assert!(trials[2].system_attrs.contains_key(CONSTRAINTS_KEY));
}

#[test]
fn test_constrained_study_samples_past_startup() {
    let sampler = TpeSampler::builder()
        .seed(53)
        .n_startup_trials(5)
        .constraints_fn(|trial: &FrozenTrial| {
            let x = match trial.params.get("x") {
                Some(ParamValue::Float(v)) => *v,
                _ => 0.0,
            };
            // Feasible region is x >= 1.
            vec![1.0 - x]
        })
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..40 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        let number = trial.number();
        study.tell(number, (x - 2.0).powi(2)).unwrap();
    }

    assert_eq!(study.trials().len(), 40);
    assert!(study
        .trials()
        .iter()
        .all(|t| t.system_attrs.contains_key(CONSTRAINTS_KEY)));
}
