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
fn test_multivariate_minimizes_sphere() {
    // f(x, y) = x^2 + y^2 over [-5, 5]^2, sampled jointly.
    let sampler = TpeSampler::builder()
        .seed(42)
        .n_startup_trials(10)
        .multivariate(true)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..100 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        let y = trial.suggest_float("y", -5.0, 5.0).unwrap();
        let number = trial.number();
        study.tell(number, x * x + y * y).unwrap();
    }

    let best = best_value(&study);
    assert!(best < 5.0, "joint sampling should converge, got {best}");
}

#[test]
fn test_multivariate_is_deterministic() {
    let run = || {
        let sampler = TpeSampler::builder()
            .seed(11)
            .n_startup_trials(6)
            .multivariate(true)
            .build()
            .unwrap();
        let mut study = Study::new(sampler, Direction::Minimize);
        for _ in 0..40 {
            let mut trial = study.ask();
            let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
            let i = trial.suggest_int("i", 0, 20).unwrap();
            let number = trial.number();
            study.tell(number, x * x + (i as f64 - 10.0).powi(2)).unwrap();
        }
        study
    };

    let a = run();
    let b = run();
    for (ta, tb) in a.trials().iter().zip(b.trials()) {
        assert_eq!(ta.params, tb.params, "trial {} diverged", ta.number);
    }
}

#[test]
fn test_group_decomposition_handles_conditional_spaces() {
    let run = || {
        let sampler = TpeSampler::builder()
            .seed(19)
            .n_startup_trials(8)
            .multivariate(true)
            .group(true)
            .build()
            .unwrap();
        let mut study = Study::new(sampler, Direction::Minimize);
        for _ in 0..50 {
            let mut trial = study.ask();
            let arch = trial
                .suggest_categorical(
                    "arch",
                    vec![
                        ParamValue::Str("small".to_owned()),
                        ParamValue::Str("big".to_owned()),
                    ],
                )
                .unwrap();
            let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
            let score = if arch == ParamValue::Str("big".to_owned()) {
                let y = trial.suggest_float("y", -5.0, 5.0).unwrap();
                x * x + y * y + 1.0
            } else {
                x * x
            };
            let number = trial.number();
            study.tell(number, score).unwrap();
        }
        study
    };

    let study = run();
    for trial in study.trials() {
        let has_big = trial.params.get("arch")
            == Some(&ParamValue::Str("big".to_owned()));
        assert_eq!(
            trial.params.contains_key("y"),
            has_big,
            "trial {}: y only exists for the big arch",
            trial.number
        );
        if let Some(ParamValue::Float(x)) = trial.params.get("x") {
            assert!((-5.0..=5.0).contains(x));
        }
    }

    let again = run();
    for (ta, tb) in study.trials().iter().zip(again.trials()) {
        assert_eq!(ta.params, tb.params, "trial {} diverged", ta.number);
    }
}

#[test]
fn test_constant_liar_stashes_joint_draws() {
    let sampler = TpeSampler::builder()
        .seed(33)
        .n_startup_trials(5)
        .multivariate(true)
        .constant_liar(true)
        .build()
        .unwrap();
    let mut study = Study::new(sampler, Direction::Minimize);

    for _ in 0..30 {
        let mut trial = study.ask();
        let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
        let y = trial.suggest_float("y", -5.0, 5.0).unwrap();
        let number = trial.number();
        study.tell(number, x * x + y * y).unwrap();
    }

    let stashed = study
        .trials()
        .iter()
        .filter(|t| {
            t.system_attrs
                .keys()
                .any(|k| k.starts_with("tpe:relative_params:"))
        })
        .count();
    assert!(
        stashed > 0,
        "joint draws should be recorded on trials while they run"
    );
}

#[test]
fn test_constant_liar_supports_interleaved_asks() {
    let run = || {
        let sampler = TpeSampler::builder()
            .seed(51)
            .n_startup_trials(4)
            .multivariate(true)
            .constant_liar(true)
            .build()
            .unwrap();
        let mut study = Study::new(sampler, Direction::Minimize);

        // Pretend three workers evaluate in parallel: ask a batch, then
        // tell the batch back in order.
        for _ in 0..10 {
            let mut batch = Vec::new();
            for _ in 0..3 {
                let mut trial = study.ask();
                let x = trial.suggest_float("x", -5.0, 5.0).unwrap();
                let y = trial.suggest_float("y", -5.0, 5.0).unwrap();
                batch.push((trial.number(), x * x + y * y));
            }
            for (number, value) in batch {
                study.tell(number, value).unwrap();
            }
        }
        study
    };

    let a = run();
    let b = run();
    assert_eq!(a.trials().len(), 30);
    for (ta, tb) in a.trials().iter().zip(b.trials()) {
        assert_eq!(ta.params, tb.params, "trial {} diverged", ta.number);
        if let Some(ParamValue::Float(x)) = ta.params.get("x") {
            assert!((-5.0..=5.0).contains(x));
        }
    }
}
