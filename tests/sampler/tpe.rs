use tpe::prelude::*;

fn best_value<S: Sampler>(study: &Study<S>) -> f64 {
    study
        .trials()
        .iter()
        .filter(|t| t.state == TrialState::Complete)
        .filter_map(|t| t.value)
        .fold(f64::INFINITY, f64::min)
}

#[test]
fn test_tpe_minimizes_quadratic() {
    // f(x) = (x - 3)^2 over [-10, 10], global minimum at x = 3.
    let sampler = TpeSampler::builder()
        .seed(42)
        .n_startup_trials(10)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..100 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -10.0, 10.0).unwrap();
        let number = trial.number();
        study.tell(number, (x - 3.0).powi(2)).unwrap();
    }

    let best = best_value(&study);
    assert!(best < 5.0, "should approach the minimum, got {best}");
}

#[test]
fn test_tpe_maximizes_when_asked() {
    // f(x) = 10 - (x - 2)^2 over [-10, 10], global maximum 10 at x = 2.
    let sampler = TpeSampler::builder()
        .seed(42)
        .n_startup_trials(10)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Maximize);

    for _ in 0..100 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -10.0, 10.0).unwrap();
        let number = trial.number();
        study.tell(number, 10.0 - (x - 2.0).powi(2)).unwrap();
    }

    let best = study
        .trials()
        .iter()
        .filter(|t| t.state == TrialState::Complete)
        .filter_map(|t| t.value)
        .fold(f64::NEG_INFINITY, f64::max);
    assert!(best > 5.0, "should approach the maximum, got {best}");
}

#[test]
fn test_tpe_handles_integer_domains() {
    // f(i) = (i - 7)^2 over 0..=15, minimum at i = 7.
    let sampler = TpeSampler::builder()
        .seed(5)
        .n_startup_trials(8)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..40 {
        let mut trial = study.ask();
        let i = trial.suggest_int("i", 0, 15).unwrap();
        let number = trial.number();
        study.tell(number, ((i - 7) * (i - 7)) as f64).unwrap();
    }

    let best = best_value(&study);
    assert!(best <= 4.0, "should land within two of the optimum, got {best}");
}

#[test]
fn test_tpe_handles_categorical_domains() {
    let choices = vec![
        ParamValue::Str("a".to_owned()),
        ParamValue::Str("b".to_owned()),
        ParamValue::Str("c".to_owned()),
    ];
    let sampler = TpeSampler::builder()
        .seed(9)
        .n_startup_trials(8)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..40 {
        let mut trial = study.ask();
        let c = trial.suggest_categorical("c", choices.clone()).unwrap();
        let score = match &c {
            ParamValue::Str(s) if s == "a" => 1.0,
            ParamValue::Str(s) if s == "b" => 0.2,
            _ => 3.0,
        };
        let number = trial.number();
        study.tell(number, score).unwrap();
    }

    let best = best_value(&study);
    assert!(best <= 1.0, "should avoid the worst choice, got {best}");
}

#[test]
fn test_tpe_respects_log_and_step_domains() {
    let sampler = TpeSampler::builder()
        .seed(3)
        .n_startup_trials(5)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    // Run well past startup so the Parzen path produces most of the draws.
    for _ in 0..30 {
        let mut trial = study.ask();
        let lr = trial.suggest_float_log("lr", 1e-5, 1e-1).unwrap();
        let q = trial.suggest_float_step("q", -1.0, 1.0, 0.1).unwrap();
        let layers = trial.suggest_int_log("layers", 1, 64).unwrap();
        let units = trial.suggest_int_step("units", 32, 256, 32).unwrap();

        assert!((1e-5..=1e-1).contains(&lr), "lr out of range: {lr}");
        assert!((-1.0..=1.0).contains(&q), "q out of range: {q}");
        assert!(
            (q / 0.1 - (q / 0.1).round()).abs() < 1e-9,
            "q off the step grid: {q}"
        );
        assert!((1..=64).contains(&layers), "layers out of range: {layers}");
        assert!((32..=256).contains(&units), "units out of range: {units}");
        assert_eq!(units % 32, 0, "units off the step grid: {units}");

        let number = trial.number();
        study.tell(number, lr.ln().abs() + q.abs()).unwrap();
    }

    assert_eq!(study.trials().len(), 30);
}

#[test]
fn test_tpe_is_deterministic_for_fixed_seed() {
    let run = || {
        let sampler = TpeSampler::builder()
            .seed(7)
            .n_startup_trials(5)
            .build()
            .unwrap();
        let mut study = Study::new(sampler, Direction::Minimize);
        for _ in 0..60 {
            let mut trial = study.ask();
            let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
            let i = trial.suggest_int("i", 0, 10).unwrap();
            let c = trial
                .suggest_categorical(
                    "c",
                    vec![ParamValue::Int(0), ParamValue::Int(1), ParamValue::Int(2)],
                )
                .unwrap();
            let bonus = match c {
                ParamValue::Int(v) => v as f64,
                _ => 0.0,
            };
            let number = trial.number();
            study
                .tell(number, x.powi(2) + (i as f64 - 4.0).powi(2) + bonus)
                .unwrap();
        }
        study
    };

    let a = run();
    let b = run();
    assert_eq!(a.trials().len(), b.trials().len());
    for (ta, tb) in a.trials().iter().zip(b.trials()) {
        assert_eq!(ta.params, tb.params, "trial {} diverged", ta.number);
        assert_eq!(ta.value, tb.value, "trial {} value diverged", ta.number);
    }
}

#[test]
fn test_custom_gamma_and_weights_are_used() {
    let sampler = TpeSampler::builder()
        .seed(21)
        .n_startup_trials(5)
        .gamma_fn(|n| (n / 4).clamp(1, 25))
        .weights_fn(|n| vec![1.0; n])
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..30 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -10.0, 10.0).unwrap();
        let number = trial.number();
        study.tell(number, (x - 1.0).powi(2)).unwrap();
    }

    let best = best_value(&study);
    assert!(best < 25.0, "custom split should still optimize, got {best}");
}

#[test]
fn test_pruned_trials_still_inform_sampling() {
    let sampler = TpeSampler::builder()
        .seed(17)
        .n_startup_trials(5)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for round in 0..40 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -10.0, 10.0).unwrap();
        let number = trial.number();
        if round % 3 == 2 {
            trial.report(x.powi(2), 0);
            study.tell_pruned(number).unwrap();
        } else {
            study.tell(number, x.powi(2)).unwrap();
        }
    }

    let pruned = study
        .trials()
        .iter()
        .filter(|t| t.state == TrialState::Pruned)
        .count();
    assert_eq!(pruned, 13);
    assert!(
        study
            .trials()
            .iter()
            .filter(|t| t.state == TrialState::Pruned)
            .all(|t| t.value.is_none() && !t.intermediate_values.is_empty()),
        "pruned trials keep reports but no final value"
    );
    assert!(best_value(&study) < 25.0);
}

#[test]
fn test_failed_trials_carry_no_value() {
    let sampler = TpeSampler::builder()
        .seed(29)
        .n_startup_trials(4)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for round in 0..30 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", 0.0, 1.0).unwrap();
        let number = trial.number();
        if round % 5 == 4 {
            study.tell_failed(number).unwrap();
        } else {
            study.tell(number, x).unwrap();
        }
    }

    let failed: Vec<_> = study
        .trials()
        .iter()
        .filter(|t| t.state == TrialState::Fail)
        .collect();
    assert_eq!(failed.len(), 6);
    assert!(failed.iter().all(|t| t.value.is_none()));
    assert!(best_value(&study).is_finite());
}
