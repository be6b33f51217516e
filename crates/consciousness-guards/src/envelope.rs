use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemetry_core::{DriftSpec, Formula, MetricKind};

/// Drift parameters of the consciousness telemetry vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsciousnessEnvelope {
    /// Coherence.
    pub lambda: DriftSpec,
    /// Consciousness.
    pub phi: DriftSpec,
    /// Decoherence.
    pub gamma: DriftSpec,
    /// Torsion angle in degrees.
    pub theta: DriftSpec,
}

impl ConsciousnessEnvelope {
    pub fn default_for_platform() -> Self {
        Self {
            lambda: DriftSpec::new(0.95, 0.95, 0.02, 0.80, 1.0),
            phi: DriftSpec::new(0.82, 0.83, 0.03, 0.60, 1.0),
            gamma: DriftSpec::new(0.12, 0.10, 0.02, 0.0, 0.40),
            theta: DriftSpec::new(51.843, 51.843, 0.5, 45.0, 60.0),
        }
    }

    /// Independent metrics plus the derived negentropy `xi`.
    pub fn into_metrics(self) -> BTreeMap<String, MetricKind> {
        let mut metrics = BTreeMap::new();
        metrics.insert("lambda".into(), MetricKind::Independent(self.lambda));
        metrics.insert("phi".into(), MetricKind::Independent(self.phi));
        metrics.insert("gamma".into(), MetricKind::Independent(self.gamma));
        metrics.insert("theta".into(), MetricKind::Independent(self.theta));
        metrics.insert(
            "xi".into(),
            MetricKind::Derived {
                formula: negentropy(),
                min: 0.0,
                max: 1.0,
            },
        );
        metrics
    }
}

/// `xi = lambda * phi * (1 - gamma)`
pub fn negentropy() -> Formula {
    Formula::product(vec![
        Formula::metric("lambda"),
        Formula::metric("phi"),
        Formula::complement(Formula::metric("gamma")),
    ])
}
