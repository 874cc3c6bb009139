use tpe::prelude::*;
use tpe::Error;

#[test]
fn test_ask_assigns_sequential_numbers() {
    let sampler = TpeSampler::builder().seed(1).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for expected in 0..5 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
        assert_eq!(trial.number(), expected);
        let number = trial.number();
        study.tell(number, x).unwrap();
    }

    assert_eq!(study.trials().len(), 5);
    for (i, trial) in study.trials().iter().enumerate() {
        assert_eq!(trial.number, i);
        assert_eq!(trial.state, TrialState::Complete);
    }
}

#[test]
fn test_repeated_suggest_returns_the_stored_value() {
    let sampler = TpeSampler::builder().seed(2).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    let mut trial = study.ask();
    let first = trial.suggest_float("x", -1.0, 1.0).unwrap();
    let second = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert_eq!(first, second);

    let number = trial.number();
    study.tell(number, first).unwrap();
    assert_eq!(
        study.trials()[0].params.get("x"),
        Some(&ParamValue::Float(first))
    );
}

#[test]
fn test_tell_rejects_unknown_trial_numbers() {
    let sampler = TpeSampler::builder().seed(3).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);
    assert!(matches!(study.tell(4, 1.0), Err(Error::UnknownTrial(4))));
}

#[test]
fn test_objective_arity_is_validated() {
    let sampler = TpeSampler::builder().seed(4).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);
    let mut trial = study.ask();
    let _ = trial.suggest_float("x", 0.0, 1.0).unwrap();
    let number = trial.number();
    assert!(study.tell_values(number, vec![1.0, 2.0]).is_err());
    study.tell(number, 1.0).unwrap();

    let sampler = TpeSampler::builder().seed(4).build().unwrap();
    let mut multi = Study::with_directions(
        sampler,
        vec![Direction::Minimize, Direction::Maximize],
    )
    .unwrap();
    let mut trial = multi.ask();
    let _ = trial.suggest_float("x", 0.0, 1.0).unwrap();
    let number = trial.number();
    assert!(multi.tell(number, 1.0).is_err());
    multi.tell_values(number, vec![1.0, 2.0]).unwrap();

    let frozen = &multi.trials()[0];
    assert_eq!(frozen.values.as_deref(), Some(&[1.0, 2.0][..]));
    assert_eq!(frozen.value, None);
}

#[test]
fn test_study_requires_at_least_one_direction() {
    let sampler = TpeSampler::builder().seed(5).build().unwrap();
    assert!(Study::with_directions(sampler, vec![]).is_err());
}

#[test]
fn test_report_records_intermediate_values() {
    let sampler = TpeSampler::builder().seed(6).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    let mut trial = study.ask();
    let _ = trial.suggest_float("x", 0.0, 1.0).unwrap();
    trial.report(0.9, 0);
    trial.report(0.5, 1);
    trial.report(0.3, 10);
    let number = trial.number();
    study.tell_pruned(number).unwrap();

    let frozen = &study.trials()[0];
    assert_eq!(frozen.state, TrialState::Pruned);
    assert_eq!(frozen.intermediate_values.get("0"), Some(&0.9));
    assert_eq!(frozen.intermediate_values.get("1"), Some(&0.5));
    assert_eq!(frozen.intermediate_values.get("10"), Some(&0.3));
    assert_eq!(frozen.value, None);
}

#[test]
fn test_get_trials_filters_by_state() {
    let sampler = TpeSampler::builder().seed(7).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for round in 0..6 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
        let number = trial.number();
        match round % 3 {
            0 => study.tell(number, x).unwrap(),
            1 => study.tell_pruned(number).unwrap(),
            _ => study.tell_failed(number).unwrap(),
        }
    }

    assert_eq!(study.get_trials(&[TrialState::Complete]).len(), 2);
    assert_eq!(study.get_trials(&[TrialState::Pruned]).len(), 2);
    assert_eq!(study.get_trials(&[TrialState::Fail]).len(), 2);
    assert_eq!(
        study
            .get_trials(&[TrialState::Complete, TrialState::Pruned])
            .len(),
        4
    );
}

#[test]
fn test_distributions_are_recorded_per_trial() {
    let sampler = TpeSampler::builder().seed(8).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    let mut trial = study.ask();
    let _ = trial.suggest_float_log("lr", 1e-4, 1e-1).unwrap();
    let _ = trial.suggest_int("depth", 1, 8).unwrap();
    let number = trial.number();
    study.tell(number, 0.0).unwrap();

    let dists = &study.trials()[0].distributions;
    match dists.get("lr") {
        Some(Distribution::Float(d)) => {
            assert!(d.log_scale());
            assert_eq!(d.low(), 1e-4);
            assert_eq!(d.high(), 1e-1);
        }
        other => panic!("unexpected lr distribution: {other:?}"),
    }
    match dists.get("depth") {
        Some(Distribution::Int(d)) => {
            assert_eq!(d.low(), 1);
            assert_eq!(d.high(), 8);
        }
        other => panic!("unexpected depth distribution: {other:?}"),
    }
}

#[test]
fn test_multi_objective_studies_sample_after_startup() {
    let sampler = TpeSampler::builder()
        .seed(9)
        .n_startup_trials(5)
        .build()
        .unwrap();
    let mut study = Study::with_directions(
        sampler,
        vec![Direction::Minimize, Direction::Minimize],
    )
    .unwrap();

    // Simple bi-objective tradeoff: f1 = x^2, f2 = (x - 2)^2.
    for _ in 0..30 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -4.0, 6.0).unwrap();
        let number = trial.number();
        study
            .tell_values(number, vec![x * x, (x - 2.0).powi(2)])
            .unwrap();
    }

    assert_eq!(study.trials().len(), 30);
    assert!(study
        .trials()
        .iter()
        .all(|t| t.state == TrialState::Complete && t.values.is_some()));
}
