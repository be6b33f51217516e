use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use telemetry_core::{DomainReading, OperationEvaluation};

/// Gauges and counters for every simulated domain, on a private registry.
pub struct DomainMetrics {
    registry: Registry,
    pub metric_value: GaugeVec,
    pub gate_passed: GaugeVec,
    pub status_level: GaugeVec,
    pub operations_total: IntCounterVec,
}

impl DomainMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let metric_value = GaugeVec::new(
            Opts::new("telemetry_metric_value", "Latest simulated value per metric"),
            &["domain", "metric"],
        )?;
        registry.register(Box::new(metric_value.clone()))?;

        let gate_passed = GaugeVec::new(
            Opts::new("telemetry_gate_passed", "1 when the gate passed on the latest snapshot"),
            &["domain", "gate"],
        )?;
        registry.register(Box::new(gate_passed.clone()))?;

        let status_level = GaugeVec::new(
            Opts::new(
                "telemetry_status_level",
                "Domain status, 0 nominal to 3 critical",
            ),
            &["domain"],
        )?;
        registry.register(Box::new(status_level.clone()))?;

        let operations_total = IntCounterVec::new(
            Opts::new("telemetry_operations_total", "Operation requests by outcome"),
            &["domain", "outcome"],
        )?;
        registry.register(Box::new(operations_total.clone()))?;

        Ok(Self {
            registry,
            metric_value,
            gate_passed,
            status_level,
            operations_total,
        })
    }

    pub fn observe_reading(&self, reading: &DomainReading) {
        let domain = reading.domain.as_str();
        for (name, value) in &reading.snapshot.values {
            self.metric_value
                .with_label_values(&[domain, name.as_str()])
                .set(*value);
        }
        for gate in &reading.gates {
            self.gate_passed
                .with_label_values(&[domain, gate.name.as_str()])
                .set(if gate.passed { 1.0 } else { 0.0 });
        }
        self.status_level
            .with_label_values(&[domain])
            .set(f64::from(reading.status.level()));
    }

    pub fn observe_operation(&self, domain: &str, evaluation: &OperationEvaluation) {
        let outcome = if evaluation.approved {
            "approved"
        } else {
            "rejected"
        };
        self.operations_total
            .with_label_values(&[domain, outcome])
            .inc();
    }

    pub fn observe_invalid(&self, domain: &str) {
        self.operations_total
            .with_label_values(&[domain, "invalid"])
            .inc();
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of everything registered.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
