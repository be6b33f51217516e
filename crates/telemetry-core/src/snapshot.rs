use crate::spec::MetricSet;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One point-in-time capture of every metric of a domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub values: BTreeMap<String, f64>,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl MetricSnapshot {
    pub fn new(values: BTreeMap<String, f64>, timestamp: i64) -> Self {
        Self { values, timestamp }
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

/// Assembles the next snapshot of `metrics`.
///
/// Independent metrics drift from their value in `last` (or from baseline
/// when absent); derived metrics are then evaluated over the fresh values
/// and clamped to their own bounds. The timestamp never goes backwards
/// relative to `last`.
pub fn next_snapshot<R: Rng + ?Sized>(
    last: Option<&MetricSnapshot>,
    metrics: &MetricSet,
    rng: &mut R,
    now_ms: i64,
) -> MetricSnapshot {
    let mut values = BTreeMap::new();

    for (name, spec) in metrics.independent() {
        let previous = last.and_then(|s| s.get(name));
        values.insert(name.to_string(), spec.next_value(previous, rng));
    }

    derive_into(&mut values, metrics);

    let timestamp = last.map_or(now_ms, |s| s.timestamp.max(now_ms));
    MetricSnapshot::new(values, timestamp)
}

/// Recomputes every derived metric over the independent values already in
/// `values`, in dependency order, clamping each to its bounds.
pub(crate) fn derive_into(values: &mut BTreeMap<String, f64>, metrics: &MetricSet) {
    for (name, formula, min, max) in metrics.derived() {
        let value = formula.evaluate(values).clamp(min, max);
        values.insert(name.to_string(), value);
    }
}

/// Wall-clock milliseconds used to stamp generated snapshots.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
