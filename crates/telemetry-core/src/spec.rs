use crate::error::{TelemetryError, TelemetryResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Static drift parameters of an independently simulated metric.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DriftSpec {
    pub baseline: f64,
    pub target: f64,
    pub volatility: f64,
    pub min: f64,
    pub max: f64,
}

impl DriftSpec {
    pub fn new(baseline: f64, target: f64, volatility: f64, min: f64, max: f64) -> Self {
        Self {
            baseline,
            target,
            volatility,
            min,
            max,
        }
    }

    /// A spec with no noise, handy for deterministic fixtures.
    pub fn steady(baseline: f64, min: f64, max: f64) -> Self {
        Self::new(baseline, baseline, 0.0, min, max)
    }

    fn validate(&self, name: &str) -> TelemetryResult<()> {
        let fields = [
            ("baseline", self.baseline),
            ("target", self.target),
            ("volatility", self.volatility),
            ("min", self.min),
            ("max", self.max),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(config_error(name, format!("{field} is not finite")));
        }
        check_bounds(name, self.min, self.max)?;
        if self.volatility < 0.0 {
            return Err(config_error(name, "volatility must be non-negative"));
        }
        if !(self.min..=self.max).contains(&self.baseline) {
            return Err(config_error(
                name,
                format!(
                    "baseline {} outside [{}, {}]",
                    self.baseline, self.min, self.max
                ),
            ));
        }
        if !(self.min..=self.max).contains(&self.target) {
            return Err(config_error(
                name,
                format!("target {} outside [{}, {}]", self.target, self.min, self.max),
            ));
        }
        Ok(())
    }
}

/// Declarative expression over sibling metrics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Formula {
    Metric { name: String },
    Constant { value: f64 },
    /// `1 - of`
    Complement { of: Box<Formula> },
    Product { of: Vec<Formula> },
    Mean { of: Vec<Formula> },
    Scale { factor: f64, of: Box<Formula> },
}

impl Formula {
    pub fn metric(name: impl Into<String>) -> Self {
        Formula::Metric { name: name.into() }
    }

    pub fn constant(value: f64) -> Self {
        Formula::Constant { value }
    }

    pub fn complement(of: Formula) -> Self {
        Formula::Complement { of: Box::new(of) }
    }

    pub fn product(of: Vec<Formula>) -> Self {
        Formula::Product { of }
    }

    pub fn mean(of: Vec<Formula>) -> Self {
        Formula::Mean { of }
    }

    pub fn scale(factor: f64, of: Formula) -> Self {
        Formula::Scale {
            factor,
            of: Box::new(of),
        }
    }

    /// Collects every metric name the formula reads.
    pub fn dependencies(&self, out: &mut BTreeSet<String>) {
        match self {
            Formula::Metric { name } => {
                out.insert(name.clone());
            }
            Formula::Constant { .. } => {}
            Formula::Complement { of } | Formula::Scale { of, .. } => of.dependencies(out),
            Formula::Product { of } | Formula::Mean { of } => {
                of.iter().for_each(|f| f.dependencies(out));
            }
        }
    }

    /// Missing inputs read as 0.0; [`MetricSet::new`] rules that out for
    /// configured formulas.
    pub fn evaluate(&self, values: &BTreeMap<String, f64>) -> f64 {
        match self {
            Formula::Metric { name } => values.get(name).copied().unwrap_or(0.0),
            Formula::Constant { value } => *value,
            Formula::Complement { of } => 1.0 - of.evaluate(values),
            Formula::Product { of } => of.iter().map(|f| f.evaluate(values)).product(),
            Formula::Mean { of } => {
                let sum: f64 = of.iter().map(|f| f.evaluate(values)).sum();
                sum / of.len().max(1) as f64
            }
            Formula::Scale { factor, of } => factor * of.evaluate(values),
        }
    }

    fn validate(&self, owner: &str) -> TelemetryResult<()> {
        match self {
            Formula::Metric { .. } => Ok(()),
            Formula::Constant { value } if !value.is_finite() => {
                Err(config_error(owner, "formula constant is not finite"))
            }
            Formula::Constant { .. } => Ok(()),
            Formula::Scale { factor, .. } if !factor.is_finite() => {
                Err(config_error(owner, "formula scale factor is not finite"))
            }
            Formula::Complement { of } | Formula::Scale { of, .. } => of.validate(owner),
            Formula::Product { of } | Formula::Mean { of } => {
                if of.is_empty() {
                    return Err(config_error(owner, "formula has an empty operand list"));
                }
                of.iter().try_for_each(|f| f.validate(owner))
            }
        }
    }
}

/// How a metric obtains its value on each snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MetricKind {
    Independent(DriftSpec),
    Derived { formula: Formula, min: f64, max: f64 },
}

impl MetricKind {
    pub fn bounds(&self) -> (f64, f64) {
        match self {
            MetricKind::Independent(spec) => (spec.min, spec.max),
            MetricKind::Derived { min, max, .. } => (*min, *max),
        }
    }

    pub fn is_derived(&self) -> bool {
        matches!(self, MetricKind::Derived { .. })
    }
}

/// Validated metric definitions of one domain.
///
/// Derived metrics carry a precomputed evaluation order so that a derived
/// metric is always computed after everything it reads.
#[derive(Debug, Clone)]
pub struct MetricSet {
    metrics: BTreeMap<String, MetricKind>,
    derived_order: Vec<String>,
}

impl MetricSet {
    pub fn new(metrics: BTreeMap<String, MetricKind>) -> TelemetryResult<Self> {
        if metrics.is_empty() {
            return Err(TelemetryError::Configuration(
                "domain defines no metrics".into(),
            ));
        }

        let mut derived_deps: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
        for (name, kind) in &metrics {
            match kind {
                MetricKind::Independent(spec) => spec.validate(name)?,
                MetricKind::Derived { formula, min, max } => {
                    if !min.is_finite() || !max.is_finite() {
                        return Err(config_error(name, "bounds are not finite"));
                    }
                    check_bounds(name, *min, *max)?;
                    formula.validate(name)?;

                    let mut deps = BTreeSet::new();
                    formula.dependencies(&mut deps);
                    if deps.contains(name) {
                        return Err(config_error(name, "formula references itself"));
                    }
                    if let Some(unknown) = deps.iter().find(|d| !metrics.contains_key(*d)) {
                        return Err(config_error(
                            name,
                            format!("formula references unknown metric `{unknown}`"),
                        ));
                    }
                    derived_deps.insert(name.as_str(), deps);
                }
            }
        }

        let derived_order = resolve_order(&metrics, derived_deps)?;
        Ok(Self {
            metrics,
            derived_order,
        })
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.metrics.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&MetricKind> {
        self.metrics.get(name)
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    pub fn definitions(&self) -> &BTreeMap<String, MetricKind> {
        &self.metrics
    }

    pub fn independent(&self) -> impl Iterator<Item = (&str, &DriftSpec)> {
        self.metrics.iter().filter_map(|(name, kind)| match kind {
            MetricKind::Independent(spec) => Some((name.as_str(), spec)),
            MetricKind::Derived { .. } => None,
        })
    }

    /// Derived metrics in dependency order.
    pub fn derived(&self) -> impl Iterator<Item = (&str, &Formula, f64, f64)> {
        self.derived_order.iter().filter_map(|name| match self.metrics.get(name) {
            Some(MetricKind::Derived { formula, min, max }) => {
                Some((name.as_str(), formula, *min, *max))
            }
            _ => None,
        })
    }

    /// Clamps `value` into the bounds of `name`; unknown names pass through.
    pub fn clamp(&self, name: &str, value: f64) -> f64 {
        match self.metrics.get(name) {
            Some(kind) => {
                let (min, max) = kind.bounds();
                value.clamp(min, max)
            }
            None => value,
        }
    }
}

fn resolve_order(
    metrics: &BTreeMap<String, MetricKind>,
    mut pending: BTreeMap<&str, BTreeSet<String>>,
) -> TelemetryResult<Vec<String>> {
    let mut order = Vec::with_capacity(pending.len());
    let mut resolved: BTreeSet<&str> = metrics
        .iter()
        .filter(|(_, kind)| !kind.is_derived())
        .map(|(name, _)| name.as_str())
        .collect();

    while !pending.is_empty() {
        let ready: Vec<&str> = pending
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| resolved.contains(d.as_str())))
            .map(|(name, _)| *name)
            .collect();
        if ready.is_empty() {
            let stuck: Vec<&str> = pending.keys().copied().collect();
            return Err(TelemetryError::Configuration(format!(
                "derived metrics form a dependency cycle: {}",
                stuck.join(", ")
            )));
        }
        for name in ready {
            pending.remove(name);
            resolved.insert(name);
            order.push(name.to_string());
        }
    }
    Ok(order)
}

fn check_bounds(name: &str, min: f64, max: f64) -> TelemetryResult<()> {
    if min > max {
        return Err(config_error(name, format!("min {min} exceeds max {max}")));
    }
    Ok(())
}

fn config_error(name: &str, msg: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Configuration(format!("metric `{name}`: {msg}"))
}
