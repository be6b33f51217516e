use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemetry_core::{DriftSpec, Formula, MetricKind};

/// State of the RGB mouse panel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelEnvelope {
    pub battery_pct: DriftSpec,
    pub polling_latency_ms: DriftSpec,
    pub sensor_temp_c: DriftSpec,
    /// 0.0 (off) to 1.0 (full).
    pub rgb_brightness: DriftSpec,
}

impl PanelEnvelope {
    pub fn default_for_platform() -> Self {
        Self {
            battery_pct: DriftSpec::new(82.0, 80.0, 1.5, 0.0, 100.0),
            polling_latency_ms: DriftSpec::new(1.0, 1.0, 0.3, 0.125, 16.0),
            sensor_temp_c: DriftSpec::new(34.0, 35.0, 0.8, 18.0, 70.0),
            rgb_brightness: DriftSpec::new(0.75, 0.80, 0.05, 0.0, 1.0),
        }
    }

    pub fn into_metrics(self) -> BTreeMap<String, MetricKind> {
        let mut metrics = BTreeMap::new();
        metrics.insert("battery_pct".into(), MetricKind::Independent(self.battery_pct));
        metrics.insert(
            "polling_latency_ms".into(),
            MetricKind::Independent(self.polling_latency_ms),
        );
        metrics.insert("sensor_temp_c".into(), MetricKind::Independent(self.sensor_temp_c));
        metrics.insert(
            "rgb_brightness".into(),
            MetricKind::Independent(self.rgb_brightness),
        );
        metrics.insert(
            "glow".into(),
            MetricKind::Derived {
                formula: glow(),
                min: 0.0,
                max: 1.0,
            },
        );
        metrics
    }
}

/// Effective LED output: brightness dimmed by remaining battery.
pub fn glow() -> Formula {
    Formula::product(vec![
        Formula::metric("rgb_brightness"),
        Formula::scale(0.01, Formula::metric("battery_pct")),
    ])
}
