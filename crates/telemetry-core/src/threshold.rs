use crate::error::{TelemetryError, TelemetryResult};
use crate::snapshot::MetricSnapshot;
use crate::spec::MetricSet;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

pub const DEFAULT_NEAR_LIMIT_RATIO: f64 = 0.8;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Comparator {
    #[serde(rename = ">=")]
    AtLeast,
    #[serde(rename = ">")]
    Above,
    #[serde(rename = "<=")]
    AtMost,
    #[serde(rename = "<")]
    Below,
}

impl Comparator {
    pub fn holds(self, value: f64, operand: f64) -> bool {
        match self {
            Comparator::AtLeast => value >= operand,
            Comparator::Above => value > operand,
            Comparator::AtMost => value <= operand,
            Comparator::Below => value < operand,
        }
    }

    /// True for gates that cap a metric from above.
    pub fn is_upper_bound(self) -> bool {
        matches!(self, Comparator::AtMost | Comparator::Below)
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparator::AtLeast => ">=",
            Comparator::Above => ">",
            Comparator::AtMost => "<=",
            Comparator::Below => "<",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Primary gates carry correctness signals; stability gates are recoverable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateRole {
    #[default]
    Primary,
    Stability,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateSpec {
    pub name: String,
    pub metric: String,
    pub comparator: Comparator,
    pub operand: f64,
    #[serde(default)]
    pub role: GateRole,
}

impl GateSpec {
    pub fn new(
        name: impl Into<String>,
        metric: impl Into<String>,
        comparator: Comparator,
        operand: f64,
        role: GateRole,
    ) -> Self {
        Self {
            name: name.into(),
            metric: metric.into(),
            comparator,
            operand,
            role,
        }
    }

    pub fn primary(
        name: impl Into<String>,
        metric: impl Into<String>,
        comparator: Comparator,
        operand: f64,
    ) -> Self {
        Self::new(name, metric, comparator, operand, GateRole::Primary)
    }

    pub fn stability(
        name: impl Into<String>,
        metric: impl Into<String>,
        comparator: Comparator,
        operand: f64,
    ) -> Self {
        Self::new(name, metric, comparator, operand, GateRole::Stability)
    }

    /// The one predicate shared by status classification and operation gating.
    pub fn passes(&self, value: f64) -> bool {
        self.comparator.holds(value, self.operand)
    }

    fn near_limit(&self, value: f64, ratio: f64) -> bool {
        if !self.passes(value) {
            return true;
        }
        if self.comparator.is_upper_bound() {
            value >= self.operand * ratio
        } else {
            value <= self.operand / ratio
        }
    }
}

/// Result of one gate against one snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateOutcome {
    pub name: String,
    pub metric: String,
    pub role: GateRole,
    pub value: Option<f64>,
    pub passed: bool,
    pub near_limit: bool,
}

/// Ordered gate predicates of a domain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ThresholdSet {
    pub gates: Vec<GateSpec>,
    #[serde(default = "default_near_limit_ratio")]
    pub near_limit_ratio: f64,
}

fn default_near_limit_ratio() -> f64 {
    DEFAULT_NEAR_LIMIT_RATIO
}

impl ThresholdSet {
    pub fn new(gates: Vec<GateSpec>) -> Self {
        Self {
            gates,
            near_limit_ratio: DEFAULT_NEAR_LIMIT_RATIO,
        }
    }

    pub fn with_near_limit_ratio(mut self, ratio: f64) -> Self {
        self.near_limit_ratio = ratio;
        self
    }

    /// Checks that gate names are unique and that every gate reads a metric
    /// defined in `metrics` with a finite operand inside that metric's bounds.
    pub fn validate(&self, metrics: &MetricSet) -> TelemetryResult<()> {
        if !(self.near_limit_ratio > 0.0 && self.near_limit_ratio <= 1.0) {
            return Err(TelemetryError::Configuration(format!(
                "near_limit_ratio {} must lie in (0, 1]",
                self.near_limit_ratio
            )));
        }
        let mut seen = BTreeSet::new();
        for gate in &self.gates {
            if gate.name.trim().is_empty() {
                return Err(TelemetryError::Configuration(
                    "gate name must not be empty".into(),
                ));
            }
            if !seen.insert(gate.name.as_str()) {
                return Err(TelemetryError::Configuration(format!(
                    "duplicate gate `{}`",
                    gate.name
                )));
            }
            if !gate.operand.is_finite() {
                return Err(TelemetryError::Configuration(format!(
                    "gate `{}`: operand is not finite",
                    gate.name
                )));
            }
            let Some(kind) = metrics.get(&gate.metric) else {
                return Err(TelemetryError::Configuration(format!(
                    "gate `{}` reads unknown metric `{}`",
                    gate.name, gate.metric
                )));
            };
            let (min, max) = kind.bounds();
            if gate.operand < min || gate.operand > max {
                return Err(TelemetryError::Configuration(format!(
                    "gate `{}`: operand {} lies outside `{}` bounds [{min}, {max}]",
                    gate.name, gate.operand, gate.metric
                )));
            }
        }
        Ok(())
    }

    /// Evaluates every gate against `snapshot`. A missing metric fails its gate.
    pub fn evaluate(&self, snapshot: &MetricSnapshot) -> Vec<GateOutcome> {
        self.evaluate_values(&snapshot.values)
    }

    pub(crate) fn evaluate_values(&self, values: &BTreeMap<String, f64>) -> Vec<GateOutcome> {
        self.gates
            .iter()
            .map(|gate| {
                let value = values.get(&gate.metric).copied();
                let passed = value.map_or(false, |v| gate.passes(v));
                let near_limit =
                    value.map_or(true, |v| gate.near_limit(v, self.near_limit_ratio));
                GateOutcome {
                    name: gate.name.clone(),
                    metric: gate.metric.clone(),
                    role: gate.role,
                    value,
                    passed,
                    near_limit,
                }
            })
            .collect()
    }

    pub fn gate_names(&self) -> impl Iterator<Item = &str> {
        self.gates.iter().map(|g| g.name.as_str())
    }
}

/// Flattens outcomes to the `{gate name: passed}` shape callers consume.
pub fn gate_map(outcomes: &[GateOutcome]) -> BTreeMap<String, bool> {
    outcomes
        .iter()
        .map(|o| (o.name.clone(), o.passed))
        .collect()
}
