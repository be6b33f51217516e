use crate::snapshot::MetricSnapshot;
use crate::threshold::{GateOutcome, GateRole, ThresholdSet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall health of a domain, derived from gate outcomes and never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SystemStatus {
    Nominal,
    Stabilizing,
    Degraded,
    Critical,
}

impl SystemStatus {
    pub const ALL: [SystemStatus; 4] = [
        SystemStatus::Nominal,
        SystemStatus::Stabilizing,
        SystemStatus::Degraded,
        SystemStatus::Critical,
    ];

    /// 0 for nominal up to 3 for critical.
    pub fn level(self) -> u8 {
        match self {
            SystemStatus::Nominal => 0,
            SystemStatus::Stabilizing => 1,
            SystemStatus::Degraded => 2,
            SystemStatus::Critical => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SystemStatus::Nominal => "nominal",
            SystemStatus::Stabilizing => "stabilizing",
            SystemStatus::Degraded => "degraded",
            SystemStatus::Critical => "critical",
        }
    }

    /// Priority order: all gates pass, then two failing primary gates with
    /// stability at or near its limit, then any failing primary gate, then
    /// stability alone.
    pub fn from_outcomes(outcomes: &[GateOutcome]) -> Self {
        if outcomes.iter().all(|o| o.passed) {
            return SystemStatus::Nominal;
        }

        let primary_failures = outcomes
            .iter()
            .filter(|o| o.role == GateRole::Primary && !o.passed)
            .count();
        let stability_strained = outcomes
            .iter()
            .any(|o| o.role == GateRole::Stability && o.near_limit);

        if primary_failures >= 2 && stability_strained {
            SystemStatus::Critical
        } else if primary_failures >= 1 {
            SystemStatus::Degraded
        } else {
            SystemStatus::Stabilizing
        }
    }
}

impl fmt::Display for SystemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ThresholdSet {
    pub fn classify(&self, snapshot: &MetricSnapshot) -> SystemStatus {
        SystemStatus::from_outcomes(&self.evaluate(snapshot))
    }
}

/// Display names a domain uses for each status level.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusLabels {
    pub nominal: String,
    pub stabilizing: String,
    pub degraded: String,
    pub critical: String,
}

impl StatusLabels {
    pub fn new(
        nominal: impl Into<String>,
        stabilizing: impl Into<String>,
        degraded: impl Into<String>,
        critical: impl Into<String>,
    ) -> Self {
        Self {
            nominal: nominal.into(),
            stabilizing: stabilizing.into(),
            degraded: degraded.into(),
            critical: critical.into(),
        }
    }

    pub fn label(&self, status: SystemStatus) -> &str {
        match status {
            SystemStatus::Nominal => &self.nominal,
            SystemStatus::Stabilizing => &self.stabilizing,
            SystemStatus::Degraded => &self.degraded,
            SystemStatus::Critical => &self.critical,
        }
    }
}

impl Default for StatusLabels {
    fn default() -> Self {
        Self::new("nominal", "stabilizing", "degraded", "critical")
    }
}
