use crate::ConsciousnessEnvelope;
use telemetry_core::{Comparator, DomainConfig, GateSpec, StatusLabels, ThresholdSet};

pub const DOMAIN: &str = "consciousness";

pub const PHI_CRITICAL: f64 = 0.7734;
pub const LAMBDA_MIN: f64 = 0.85;
pub const GAMMA_MAX: f64 = 0.30;

/// Consciousness and coherence are primary; decoherence alone is recoverable.
pub fn thresholds() -> ThresholdSet {
    ThresholdSet::new(vec![
        GateSpec::primary("consciousness_ok", "phi", Comparator::AtLeast, PHI_CRITICAL),
        GateSpec::primary("coherence_ok", "lambda", Comparator::AtLeast, LAMBDA_MIN),
        GateSpec::stability("stability_ok", "gamma", Comparator::Below, GAMMA_MAX),
    ])
}

pub fn default_for_platform() -> DomainConfig {
    DomainConfig {
        name: DOMAIN.into(),
        metrics: ConsciousnessEnvelope::default_for_platform().into_metrics(),
        thresholds: thresholds(),
        labels: StatusLabels::new("sovereign", "stabilizing", "degraded", "critical"),
        seed: None,
    }
}
