use crate::error::{TelemetryError, TelemetryResult};
use crate::snapshot::MetricSnapshot;
use crate::spec::MetricSet;
use crate::status::SystemStatus;
use crate::threshold::{gate_map, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const APPROVED_REASON: &str = "all gates passed";

/// Verdict on a proposed delta. `approved == false` is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEvaluation {
    pub current: MetricSnapshot,
    pub projected: MetricSnapshot,
    pub projected_status: SystemStatus,
    pub gates: BTreeMap<String, bool>,
    pub failed_gates: Vec<String>,
    pub approved: bool,
    pub reason: String,
}

/// Rejects deltas naming metrics outside the domain or carrying non-finite values.
pub fn validate_delta(metrics: &MetricSet, delta: &BTreeMap<String, f64>) -> TelemetryResult<()> {
    for (name, value) in delta {
        if !metrics.contains(name) {
            return Err(TelemetryError::InvalidInput(format!(
                "unknown metric `{name}` in delta"
            )));
        }
        if !value.is_finite() {
            return Err(TelemetryError::InvalidInput(format!(
                "delta for `{name}` is not a finite number"
            )));
        }
    }
    Ok(())
}

impl ThresholdSet {
    /// Projects `current + delta` and judges the projection with the same
    /// predicates [`ThresholdSet::classify`] uses.
    ///
    /// The projection is deliberately not clamped, so a delta that would push
    /// a metric past its simulated range is still reported as such.
    pub fn evaluate_operation(
        &self,
        metrics: &MetricSet,
        current: &MetricSnapshot,
        delta: &BTreeMap<String, f64>,
    ) -> TelemetryResult<OperationEvaluation> {
        validate_delta(metrics, delta)?;

        let values: BTreeMap<String, f64> = metrics
            .names()
            .filter_map(|name| {
                let base = current.get(name)?;
                let shift = delta.get(name).copied().unwrap_or(0.0);
                Some((name.to_string(), base + shift))
            })
            .collect();
        let projected = MetricSnapshot::new(values, current.timestamp);

        let outcomes = self.evaluate(&projected);
        let failed_gates: Vec<String> = outcomes
            .iter()
            .filter(|o| !o.passed)
            .map(|o| o.name.clone())
            .collect();
        let approved = failed_gates.is_empty();
        let reason = if approved {
            APPROVED_REASON.to_string()
        } else {
            format!("gate violation: {}", failed_gates.join(", "))
        };

        Ok(OperationEvaluation {
            current: current.clone(),
            projected_status: SystemStatus::from_outcomes(&outcomes),
            gates: gate_map(&outcomes),
            projected,
            failed_gates,
            approved,
            reason,
        })
    }
}
