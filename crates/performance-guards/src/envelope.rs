use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemetry_core::{DriftSpec, Formula, MetricKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceEnvelope {
    /// Percent.
    pub cpu: DriftSpec,
    /// Percent.
    pub memory: DriftSpec,
    pub network_latency_ms: DriftSpec,
    pub quantum_fidelity: DriftSpec,
    pub inference_ms: DriftSpec,
}

impl PerformanceEnvelope {
    pub fn default_for_platform() -> Self {
        Self {
            cpu: DriftSpec::new(35.0, 40.0, 6.0, 5.0, 98.0),
            memory: DriftSpec::new(55.0, 58.0, 3.0, 20.0, 97.0),
            network_latency_ms: DriftSpec::new(24.0, 22.0, 4.0, 2.0, 250.0),
            quantum_fidelity: DriftSpec::new(0.985, 0.985, 0.004, 0.90, 0.999),
            inference_ms: DriftSpec::new(120.0, 110.0, 15.0, 20.0, 2000.0),
        }
    }

    pub fn into_metrics(self) -> BTreeMap<String, MetricKind> {
        let mut metrics = BTreeMap::new();
        metrics.insert("cpu".into(), MetricKind::Independent(self.cpu));
        metrics.insert("memory".into(), MetricKind::Independent(self.memory));
        metrics.insert(
            "network_latency_ms".into(),
            MetricKind::Independent(self.network_latency_ms),
        );
        metrics.insert(
            "quantum_fidelity".into(),
            MetricKind::Independent(self.quantum_fidelity),
        );
        metrics.insert("inference_ms".into(), MetricKind::Independent(self.inference_ms));
        metrics.insert(
            "headroom".into(),
            MetricKind::Derived {
                formula: headroom(),
                min: 0.0,
                max: 1.0,
            },
        );
        metrics
    }
}

/// Fraction of compute left: `1 - mean(cpu, memory) / 100`.
pub fn headroom() -> Formula {
    Formula::complement(Formula::scale(
        0.01,
        Formula::mean(vec![Formula::metric("cpu"), Formula::metric("memory")]),
    ))
}
