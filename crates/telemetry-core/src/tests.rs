use crate::{
    next_snapshot, Comparator, DomainConfig, DomainSimulator, DriftSpec, Formula, GateSpec,
    MetricKind, MetricSet, MetricSnapshot, StatusLabels, SystemStatus, TelemetryError,
    ThresholdSet, APPROVED_REASON, MEAN_REVERSION_RATE,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::thread;

fn negentropy() -> Formula {
    Formula::product(vec![
        Formula::metric("lambda"),
        Formula::metric("phi"),
        Formula::complement(Formula::metric("gamma")),
    ])
}

fn dummy_metrics(volatility: f64) -> BTreeMap<String, MetricKind> {
    let mut metrics = BTreeMap::new();
    metrics.insert(
        "lambda".to_string(),
        MetricKind::Independent(DriftSpec::new(0.95, 0.95, volatility, 0.80, 1.0)),
    );
    metrics.insert(
        "phi".to_string(),
        MetricKind::Independent(DriftSpec::new(0.82, 0.82, volatility, 0.60, 1.0)),
    );
    metrics.insert(
        "gamma".to_string(),
        MetricKind::Independent(DriftSpec::new(0.12, 0.10, volatility, 0.0, 0.40)),
    );
    metrics.insert(
        "xi".to_string(),
        MetricKind::Derived {
            formula: negentropy(),
            min: 0.0,
            max: 1.0,
        },
    );
    metrics
}

fn dummy_thresholds() -> ThresholdSet {
    ThresholdSet::new(vec![
        GateSpec::primary("consciousness_ok", "phi", Comparator::AtLeast, 0.7734),
        GateSpec::primary("coherence_ok", "lambda", Comparator::AtLeast, 0.85),
        GateSpec::stability("stability_ok", "gamma", Comparator::Below, 0.30),
    ])
}

fn dummy_config(volatility: f64, seed: Option<u64>) -> DomainConfig {
    DomainConfig {
        name: "consciousness".into(),
        metrics: dummy_metrics(volatility),
        thresholds: dummy_thresholds(),
        labels: StatusLabels::new("sovereign", "stabilizing", "degraded", "critical"),
        seed,
    }
}

fn snapshot(lambda: f64, phi: f64, gamma: f64) -> MetricSnapshot {
    let mut values = BTreeMap::new();
    values.insert("lambda".to_string(), lambda);
    values.insert("phi".to_string(), phi);
    values.insert("gamma".to_string(), gamma);
    values.insert("xi".to_string(), lambda * phi * (1.0 - gamma));
    MetricSnapshot::new(values, 1_700_000_000_000)
}

fn delta(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

#[test]
fn drift_stays_bounded_over_ten_thousand_steps() {
    let mut rng = rand::thread_rng();
    for _ in 0..20 {
        let min = rng.gen_range(-10.0..10.0);
        let max = min + rng.gen_range(0.0..5.0);
        let baseline = rng.gen_range(min..=max);
        let target = rng.gen_range(min..=max);
        let volatility = rng.gen_range(0.0..3.0);
        let spec = DriftSpec::new(baseline, target, volatility, min, max);

        let mut current = None;
        for _ in 0..10_000 {
            let value = spec.next_value(current, &mut rng);
            assert!(value >= min && value <= max, "{value} escaped [{min}, {max}]");
            current = Some(value);
        }
    }
}

proptest! {
    #[test]
    fn drift_never_leaves_bounds(
        min in -100.0f64..100.0,
        span in 0.0f64..50.0,
        baseline_at in 0.0f64..1.0,
        target_at in 0.0f64..1.0,
        volatility in 0.0f64..20.0,
        seed in any::<u64>(),
    ) {
        let max = min + span;
        let spec = DriftSpec::new(min + baseline_at * span, min + target_at * span, volatility, min, max);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut current = None;
        for _ in 0..1_000 {
            let value = spec.next_value(current, &mut rng);
            prop_assert!(value >= min && value <= max);
            current = Some(value);
        }
    }
}

#[test]
fn zero_noise_converges_monotonically_to_target() {
    let steps = (1e-6f64.ln() / (1.0 - MEAN_REVERSION_RATE).ln()).ceil() as usize;
    assert_eq!(steps, 132);

    let spec = DriftSpec::new(0.5, 0.5, 0.0, 0.0, 1.0);
    let mut rng = rand::thread_rng();
    for start in [spec.min, spec.max] {
        let mut current = start;
        let mut distance = (spec.target - current).abs();
        for _ in 0..steps {
            let next = spec.next_value(Some(current), &mut rng);
            let next_distance = (spec.target - next).abs();
            assert!(next_distance <= distance);
            current = next;
            distance = next_distance;
        }
        assert!(distance < 1e-6, "still {distance} away after {steps} steps");
    }
}

#[test]
fn first_value_without_noise_is_exact_baseline() {
    let spec = DriftSpec::steady(0.98, 0.8, 1.0);
    let mut rng = rand::thread_rng();
    assert_eq!(spec.next_value(None, &mut rng), 0.98);
}

#[test]
fn first_value_is_clamped_into_bounds() {
    let spec = DriftSpec::new(1.0, 1.0, 0.5, 0.0, 1.0);
    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let value = spec.next_value(None, &mut rng);
        assert!((0.5..=1.0).contains(&value));
    }
}

#[test]
fn snapshot_holds_exactly_configured_metrics_with_derived_values() {
    let metrics = MetricSet::new(dummy_metrics(0.03)).unwrap();
    let mut rng = rand::thread_rng();
    let mut last: Option<MetricSnapshot> = None;
    for step in 0..500 {
        let next = next_snapshot(last.as_ref(), &metrics, &mut rng, 1_000 + step);
        let names: Vec<&str> = next.names().collect();
        assert_eq!(names, vec!["gamma", "lambda", "phi", "xi"]);

        let (lambda, phi, gamma) = (
            next.get("lambda").unwrap(),
            next.get("phi").unwrap(),
            next.get("gamma").unwrap(),
        );
        assert!((next.get("xi").unwrap() - lambda * phi * (1.0 - gamma)).abs() < 1e-12);
        for (name, value) in &next.values {
            let (min, max) = metrics.get(name).unwrap().bounds();
            assert!(*value >= min && *value <= max);
        }
        last = Some(next);
    }
}

#[test]
fn snapshot_timestamp_never_goes_backwards() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let mut rng = rand::thread_rng();
    let first = next_snapshot(None, &metrics, &mut rng, 5_000);
    let second = next_snapshot(Some(&first), &metrics, &mut rng, 4_000);
    assert_eq!(first.timestamp, 5_000);
    assert_eq!(second.timestamp, 5_000);
}

#[test]
fn derived_metrics_resolve_in_dependency_order() {
    let mut metrics = dummy_metrics(0.0);
    // `a_scaled` sorts before `xi` but reads it.
    metrics.insert(
        "a_scaled".to_string(),
        MetricKind::Derived {
            formula: Formula::scale(2.0, Formula::metric("xi")),
            min: 0.0,
            max: 2.0,
        },
    );
    let set = MetricSet::new(metrics).unwrap();
    let order: Vec<&str> = set.derived().map(|(name, ..)| name).collect();
    assert_eq!(order, vec!["xi", "a_scaled"]);

    let snap = next_snapshot(None, &set, &mut rand::thread_rng(), 0);
    let expected = 2.0 * 0.95 * 0.82 * (1.0 - 0.12);
    assert!((snap.get("a_scaled").unwrap() - expected).abs() < 1e-12);
}

#[test]
fn invalid_specs_are_configuration_errors() {
    let cases: Vec<(&str, MetricKind)> = vec![
        ("inverted", MetricKind::Independent(DriftSpec::new(0.5, 0.5, 0.1, 1.0, 0.0))),
        ("baseline_out", MetricKind::Independent(DriftSpec::new(2.0, 0.5, 0.1, 0.0, 1.0))),
        ("target_out", MetricKind::Independent(DriftSpec::new(0.5, -1.0, 0.1, 0.0, 1.0))),
        ("negative_vol", MetricKind::Independent(DriftSpec::new(0.5, 0.5, -0.1, 0.0, 1.0))),
        ("nan", MetricKind::Independent(DriftSpec::new(f64::NAN, 0.5, 0.1, 0.0, 1.0))),
        (
            "unknown_ref",
            MetricKind::Derived {
                formula: Formula::metric("nope"),
                min: 0.0,
                max: 1.0,
            },
        ),
        (
            "self_ref",
            MetricKind::Derived {
                formula: Formula::metric("self_ref"),
                min: 0.0,
                max: 1.0,
            },
        ),
        (
            "empty_mean",
            MetricKind::Derived {
                formula: Formula::mean(vec![]),
                min: 0.0,
                max: 1.0,
            },
        ),
    ];

    for (name, kind) in cases {
        let mut metrics = dummy_metrics(0.0);
        metrics.insert(name.to_string(), kind);
        let err = MetricSet::new(metrics).unwrap_err();
        assert!(
            matches!(err, TelemetryError::Configuration(_)),
            "{name} produced {err:?}"
        );
    }
}

#[test]
fn derived_cycle_is_rejected() {
    let mut metrics = dummy_metrics(0.0);
    metrics.insert(
        "left".to_string(),
        MetricKind::Derived {
            formula: Formula::metric("right"),
            min: 0.0,
            max: 1.0,
        },
    );
    metrics.insert(
        "right".to_string(),
        MetricKind::Derived {
            formula: Formula::metric("left"),
            min: 0.0,
            max: 1.0,
        },
    );
    let err = MetricSet::new(metrics).unwrap_err();
    assert!(err.to_string().contains("cycle"));
}

#[test]
fn bad_thresholds_prevent_domain_creation() {
    let mut config = dummy_config(0.0, None);
    config
        .thresholds
        .gates
        .push(GateSpec::primary("stability_ok", "gamma", Comparator::Below, 0.2));
    assert!(matches!(
        DomainSimulator::create(config),
        Err(TelemetryError::Configuration(_))
    ));

    let mut config = dummy_config(0.0, None);
    config
        .thresholds
        .gates
        .push(GateSpec::primary("torsion_ok", "theta", Comparator::Above, 40.0));
    let err = DomainSimulator::create(config).err().unwrap();
    assert!(err.to_string().contains("theta"));
    assert!(err.to_string().contains("consciousness"));
}

#[test]
fn gate_operand_outside_metric_bounds_is_rejected() {
    let mut config = dummy_config(0.0, None);
    config.thresholds.gates[2] =
        GateSpec::stability("stability_ok", "gamma", Comparator::Below, 0.5);
    let err = DomainSimulator::create(config).err().unwrap();
    assert!(matches!(err, TelemetryError::Configuration(_)));
    assert!(err.to_string().contains("outside `gamma` bounds"));

    // Operands sitting exactly on a bound are still accepted.
    let mut config = dummy_config(0.0, None);
    config.thresholds.gates[2] =
        GateSpec::stability("stability_ok", "gamma", Comparator::Below, 0.40);
    assert!(DomainSimulator::create(config).is_ok());
}

#[test]
fn classification_follows_priority_order() {
    let thresholds = dummy_thresholds();
    assert_eq!(thresholds.classify(&snapshot(0.95, 0.82, 0.12)), SystemStatus::Nominal);
    assert_eq!(
        thresholds.classify(&snapshot(0.95, 0.82, 0.31)),
        SystemStatus::Stabilizing
    );
    assert_eq!(thresholds.classify(&snapshot(0.95, 0.70, 0.12)), SystemStatus::Degraded);
    assert_eq!(thresholds.classify(&snapshot(0.95, 0.70, 0.35)), SystemStatus::Degraded);
    // Both primaries down while gamma sits above 80% of its cap.
    assert_eq!(thresholds.classify(&snapshot(0.80, 0.70, 0.25)), SystemStatus::Critical);
    assert_eq!(thresholds.classify(&snapshot(0.80, 0.70, 0.33)), SystemStatus::Critical);
    // Both primaries down but stability comfortably inside its band.
    assert_eq!(thresholds.classify(&snapshot(0.80, 0.70, 0.10)), SystemStatus::Degraded);
}

#[test]
fn lower_bound_stability_gate_uses_inverse_ratio() {
    let thresholds = ThresholdSet::new(vec![
        GateSpec::primary("a_ok", "lambda", Comparator::AtLeast, 0.9),
        GateSpec::primary("b_ok", "phi", Comparator::AtLeast, 0.9),
        GateSpec::stability("floor_ok", "gamma", Comparator::Above, 0.08),
    ]);
    // 0.08 / 0.8 = 0.1: gamma at 0.095 is near the floor, 0.2 is not.
    assert_eq!(thresholds.classify(&snapshot(0.8, 0.8, 0.095)), SystemStatus::Critical);
    assert_eq!(thresholds.classify(&snapshot(0.8, 0.8, 0.2)), SystemStatus::Degraded);
}

#[test]
fn missing_metric_fails_its_gate() {
    let thresholds = dummy_thresholds();
    let mut snap = snapshot(0.95, 0.82, 0.12);
    snap.values.remove("gamma");
    let outcomes = thresholds.evaluate(&snap);
    let stability = outcomes.iter().find(|o| o.name == "stability_ok").unwrap();
    assert!(!stability.passed);
    assert_eq!(stability.value, None);
    assert_eq!(thresholds.classify(&snap), SystemStatus::Stabilizing);
}

#[test]
fn classification_is_idempotent_and_consistent_with_gates() {
    let thresholds = dummy_thresholds();
    let mut rng = rand::thread_rng();
    for _ in 0..2_000 {
        let snap = snapshot(
            rng.gen_range(0.7..1.0),
            rng.gen_range(0.6..1.0),
            rng.gen_range(0.0..0.45),
        );
        let status = thresholds.classify(&snap);
        assert_eq!(status, thresholds.classify(&snap));

        let all_pass = thresholds.evaluate(&snap).iter().all(|o| o.passed);
        assert_eq!(status == SystemStatus::Nominal, all_pass);

        let empty = BTreeMap::new();
        let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
        let eval = thresholds.evaluate_operation(&metrics, &snap, &empty).unwrap();
        assert_eq!(eval.approved, all_pass);
        assert_eq!(eval.projected_status, status);
    }
}

#[test]
fn rejection_names_only_the_violated_gate() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let thresholds = dummy_thresholds();
    let current = snapshot(0.95, 0.82, 0.29);

    let eval = thresholds
        .evaluate_operation(&metrics, &current, &delta(&[("gamma", 0.02)]))
        .unwrap();

    assert!(!eval.approved);
    assert_eq!(eval.failed_gates, vec!["stability_ok".to_string()]);
    assert!(eval.reason.contains("stability_ok"));
    assert!(!eval.reason.contains("consciousness_ok"));
    assert!(!eval.reason.contains("coherence_ok"));
    assert_eq!(eval.gates.get("stability_ok"), Some(&false));
    assert_eq!(eval.gates.get("coherence_ok"), Some(&true));
    assert_eq!(eval.current, current);
}

#[test]
fn rejection_lists_every_failed_gate() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let thresholds = dummy_thresholds();
    let current = snapshot(0.86, 0.78, 0.29);

    let eval = thresholds
        .evaluate_operation(
            &metrics,
            &current,
            &delta(&[("lambda", -0.05), ("phi", -0.05), ("gamma", 0.05)]),
        )
        .unwrap();
    assert_eq!(
        eval.reason,
        "gate violation: consciousness_ok, coherence_ok, stability_ok"
    );
    assert_eq!(eval.projected_status, SystemStatus::Critical);
}

#[test]
fn approval_boundary_on_consciousness_gate() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let thresholds = dummy_thresholds();
    let current = snapshot(0.95, 0.77, 0.12);
    assert_eq!(thresholds.classify(&current), SystemStatus::Degraded);

    let eval = thresholds
        .evaluate_operation(&metrics, &current, &delta(&[("phi", 0.01)]))
        .unwrap();
    assert!(eval.approved);
    assert_eq!(eval.reason, APPROVED_REASON);
    assert!((eval.projected.get("phi").unwrap() - 0.78).abs() < 1e-12);
    assert_eq!(eval.projected_status, SystemStatus::Nominal);
}

#[test]
fn projection_is_not_clamped() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let thresholds = dummy_thresholds();
    let current = snapshot(0.95, 0.82, 0.30);

    let eval = thresholds
        .evaluate_operation(&metrics, &current, &delta(&[("gamma", 0.15)]))
        .unwrap();
    assert!((eval.projected.get("gamma").unwrap() - 0.45).abs() < 1e-12);
    assert!(!eval.approved);
}

#[test]
fn malformed_delta_is_invalid_input() {
    let metrics = MetricSet::new(dummy_metrics(0.0)).unwrap();
    let thresholds = dummy_thresholds();
    let current = snapshot(0.95, 0.82, 0.12);

    let err = thresholds
        .evaluate_operation(&metrics, &current, &delta(&[("omega", 0.1)]))
        .unwrap_err();
    assert!(matches!(err, TelemetryError::InvalidInput(ref m) if m.contains("omega")));

    let err = thresholds
        .evaluate_operation(&metrics, &current, &delta(&[("phi", f64::INFINITY)]))
        .unwrap_err();
    assert!(matches!(err, TelemetryError::InvalidInput(_)));
}

#[test]
fn initial_snapshot_is_exact_baseline_without_noise() {
    let mut config = dummy_config(0.0, None);
    config.metrics.insert(
        "lambda".to_string(),
        MetricKind::Independent(DriftSpec::steady(0.98, 0.80, 1.0)),
    );
    let sim = DomainSimulator::create(config).unwrap();

    let reading = sim.snapshot();
    assert_eq!(reading.snapshot.get("lambda"), Some(0.98));
    assert_eq!(reading.status, SystemStatus::Nominal);
    assert_eq!(reading.label, "sovereign");
    assert_eq!(reading.gate_map().get("coherence_ok"), Some(&true));
}

#[test]
fn seeded_domains_replay_the_same_walk() {
    let a = DomainSimulator::create(dummy_config(0.03, Some(42))).unwrap();
    let b = DomainSimulator::create(dummy_config(0.03, Some(42))).unwrap();
    for _ in 0..50 {
        assert_eq!(a.snapshot().snapshot.values, b.snapshot().snapshot.values);
    }
}

#[test]
fn concurrent_snapshots_store_exactly_one_output() {
    let sim = DomainSimulator::create(dummy_config(0.03, None)).unwrap();

    let outputs: Vec<MetricSnapshot> = thread::scope(|scope| {
        let handles: Vec<_> = (0..100)
            .map(|_| scope.spawn(|| sim.snapshot().snapshot))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let stored = sim.current();
    assert_eq!(outputs.iter().filter(|o| **o == stored).count(), 1);
    for out in &outputs {
        let xi = out.get("lambda").unwrap() * out.get("phi").unwrap()
            * (1.0 - out.get("gamma").unwrap());
        assert!((out.get("xi").unwrap() - xi).abs() < 1e-12);
    }
}

#[test]
fn evaluate_never_commits() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    let before = sim.current();
    let eval = sim.evaluate(&delta(&[("phi", 0.05)])).unwrap();
    assert!(eval.approved);
    assert_eq!(sim.current(), before);
}

#[test]
fn apply_commits_only_approved_projections() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    let before = sim.current();

    let rejected = sim.apply(&delta(&[("gamma", 0.5)])).unwrap();
    assert!(!rejected.committed);
    assert_eq!(sim.current(), before);

    let approved = sim.apply(&delta(&[("phi", 0.05)])).unwrap();
    assert!(approved.committed);
    let after = sim.current();
    assert!((after.get("phi").unwrap() - 0.87).abs() < 1e-12);
    assert!(after.timestamp >= before.timestamp);
}

#[test]
fn committed_projection_is_clamped_into_bounds() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    let applied = sim.apply(&delta(&[("lambda", 0.5)])).unwrap();
    assert!(applied.committed);
    assert!((applied.evaluation.projected.get("lambda").unwrap() - 1.45).abs() < 1e-12);
    assert_eq!(sim.current().get("lambda"), Some(1.0));
}

#[test]
fn committed_projection_recomputes_derived_metrics() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    let applied = sim
        .apply(&delta(&[("lambda", 0.03), ("gamma", 0.1)]))
        .unwrap();
    assert!(applied.committed);

    let stored = sim.current();
    let lambda = stored.get("lambda").unwrap();
    let phi = stored.get("phi").unwrap();
    let gamma = stored.get("gamma").unwrap();
    assert!((lambda - 0.98).abs() < 1e-12);
    assert!((gamma - 0.22).abs() < 1e-12);
    let xi = stored.get("xi").unwrap();
    assert!((xi - lambda * phi * (1.0 - gamma)).abs() < 1e-12);
    assert!((xi - 0.98 * 0.82 * 0.78).abs() < 1e-12);

    // Derived values follow the clamped inputs, not the raw projection.
    sim.apply(&delta(&[("lambda", 0.5)])).unwrap();
    let stored = sim.current();
    assert_eq!(stored.get("lambda"), Some(1.0));
    assert!((stored.get("xi").unwrap() - 1.0 * 0.82 * 0.78).abs() < 1e-12);
}

#[test]
fn invalid_apply_leaves_state_untouched() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    let before = sim.current();
    assert!(sim.apply(&delta(&[("omega", 1.0)])).is_err());
    assert_eq!(sim.current(), before);
}

#[test]
fn reset_restarts_from_baseline() {
    let sim = DomainSimulator::create(dummy_config(0.0, None)).unwrap();
    sim.apply(&delta(&[("phi", 0.1)])).unwrap();
    assert!((sim.current().get("phi").unwrap() - 0.92).abs() < 1e-12);
    sim.reset();
    assert_eq!(sim.current().get("phi"), Some(0.82));
}

#[test]
fn domain_config_parses_from_json() {
    let raw = r#"{
        "name": "telemetry",
        "metrics": {
            "lambda": {"kind": "independent", "baseline": 0.95, "target": 0.95,
                       "volatility": 0.0, "min": 0.8, "max": 1.0},
            "xi": {"kind": "derived", "min": 0.0, "max": 1.0,
                   "formula": {"op": "product", "of": [
                       {"op": "metric", "name": "lambda"},
                       {"op": "complement", "of": {"op": "constant", "value": 0.1}}
                   ]}}
        },
        "thresholds": {"gates": [
            {"name": "coherence_ok", "metric": "lambda", "comparator": ">=", "operand": 0.85}
        ]}
    }"#;
    let config: DomainConfig = serde_json::from_str(raw).unwrap();
    assert_eq!(config.labels, StatusLabels::default());
    assert_eq!(config.thresholds.near_limit_ratio, 0.8);
    assert_eq!(config.thresholds.gates[0].comparator, Comparator::AtLeast);

    let sim = DomainSimulator::create(config).unwrap();
    let reading = sim.snapshot();
    assert!((reading.snapshot.get("xi").unwrap() - 0.855).abs() < 1e-12);
    assert_eq!(reading.label, "nominal");
}
