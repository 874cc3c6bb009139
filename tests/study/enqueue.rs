use std::collections::BTreeMap;

use tpe::prelude::*;

fn fixed(pairs: &[(&str, ParamValue)]) -> BTreeMap<String, ParamValue> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_owned(), v.clone()))
        .collect()
}

#[test]
fn test_enqueued_params_are_used_verbatim() {
    let sampler = TpeSampler::builder().seed(61).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    study.enqueue_trial(fixed(&[("x", ParamValue::Float(0.25))]));
    study.enqueue_trial(fixed(&[("x", ParamValue::Float(-0.75))]));

    let mut trial = study.ask();
    assert_eq!(trial.number(), 0);
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert_eq!(x, 0.25);
    study.tell(0, x * x).unwrap();

    let mut trial = study.ask();
    assert_eq!(trial.number(), 1);
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert_eq!(x, -0.75);
    study.tell(1, x * x).unwrap();

    // Queue exhausted: the next ask samples normally.
    let mut trial = study.ask();
    assert_eq!(trial.number(), 2);
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert!((-1.0..=1.0).contains(&x));
    study.tell(2, x * x).unwrap();
}

#[test]
fn test_enqueued_trials_record_the_distribution() {
    let sampler = TpeSampler::builder().seed(67).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    study.enqueue_trial(fixed(&[("depth", ParamValue::Int(4))]));
    let mut trial = study.ask();
    let depth = trial.suggest_int("depth", 1, 8).unwrap();
    assert_eq!(depth, 4);
    study.tell(0, 0.0).unwrap();

    let frozen = &study.trials()[0];
    assert!(matches!(
        frozen.distributions.get("depth"),
        Some(Distribution::Int(_))
    ));
    assert_eq!(frozen.params.get("depth"), Some(&ParamValue::Int(4)));
}

#[test]
fn test_out_of_range_fixed_values_are_kept() {
    let sampler = TpeSampler::builder().seed(71).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    study.enqueue_trial(fixed(&[("x", ParamValue::Float(9.5))]));
    let mut trial = study.ask();
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert_eq!(x, 9.5);
    study.tell(0, x).unwrap();
}

#[test]
fn test_partial_fixed_params_mix_with_sampling() {
    let sampler = TpeSampler::builder().seed(73).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    study.enqueue_trial(fixed(&[("x", ParamValue::Float(0.5))]));
    let mut trial = study.ask();
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    let y = trial.suggest_float("y", -1.0, 1.0).unwrap();
    assert_eq!(x, 0.5);
    assert!((-1.0..=1.0).contains(&y));
    study.tell(0, x + y).unwrap();
}

#[test]
fn test_enqueue_after_history_continues_numbering() {
    let sampler = TpeSampler::builder().seed(79).build().unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..3 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
        let number = trial.number();
        study.tell(number, x).unwrap();
    }

    study.enqueue_trial(fixed(&[("x", ParamValue::Float(0.0))]));
    let mut trial = study.ask();
    assert_eq!(trial.number(), 3);
    let x = trial.suggest_float("x", -1.0, 1.0).unwrap();
    assert_eq!(x, 0.0);
    study.tell(3, 0.0).unwrap();
    assert_eq!(study.trials().len(), 4);
}
