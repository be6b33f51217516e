use crate::PerformanceEnvelope;
use telemetry_core::{Comparator, DomainConfig, GateSpec, StatusLabels, ThresholdSet};

pub const DOMAIN: &str = "performance";

pub const CPU_MAX: f64 = 85.0;
pub const MEMORY_MAX: f64 = 90.0;
pub const FIDELITY_MIN: f64 = 0.95;
pub const LATENCY_MAX_MS: f64 = 150.0;
pub const INFERENCE_MAX_MS: f64 = 500.0;

pub fn thresholds() -> ThresholdSet {
    ThresholdSet::new(vec![
        GateSpec::primary("cpu_ok", "cpu", Comparator::Below, CPU_MAX),
        GateSpec::primary("memory_ok", "memory", Comparator::Below, MEMORY_MAX),
        GateSpec::primary(
            "fidelity_ok",
            "quantum_fidelity",
            Comparator::AtLeast,
            FIDELITY_MIN,
        ),
        GateSpec::stability(
            "latency_ok",
            "network_latency_ms",
            Comparator::AtMost,
            LATENCY_MAX_MS,
        ),
        GateSpec::stability(
            "inference_ok",
            "inference_ms",
            Comparator::AtMost,
            INFERENCE_MAX_MS,
        ),
    ])
}

/// Stabilizing is reported as `degraded`; the dashboard only knows three states.
pub fn default_for_platform() -> DomainConfig {
    DomainConfig {
        name: DOMAIN.into(),
        metrics: PerformanceEnvelope::default_for_platform().into_metrics(),
        thresholds: thresholds(),
        labels: StatusLabels::new("healthy", "degraded", "degraded", "unhealthy"),
        seed: None,
    }
}
