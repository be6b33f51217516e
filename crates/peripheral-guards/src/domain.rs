use crate::PanelEnvelope;
use telemetry_core::{Comparator, DomainConfig, GateSpec, StatusLabels, ThresholdSet};

pub const DOMAIN: &str = "peripheral";

pub const BATTERY_MIN_PCT: f64 = 15.0;
pub const POLLING_MAX_MS: f64 = 8.0;
pub const TEMP_MAX_C: f64 = 45.0;

pub fn thresholds() -> ThresholdSet {
    ThresholdSet::new(vec![
        GateSpec::primary("battery_ok", "battery_pct", Comparator::AtLeast, BATTERY_MIN_PCT),
        GateSpec::primary("link_ok", "polling_latency_ms", Comparator::AtMost, POLLING_MAX_MS),
        GateSpec::stability("thermal_ok", "sensor_temp_c", Comparator::Below, TEMP_MAX_C),
    ])
}

pub fn default_for_platform() -> DomainConfig {
    DomainConfig {
        name: DOMAIN.into(),
        metrics: PanelEnvelope::default_for_platform().into_metrics(),
        thresholds: thresholds(),
        labels: StatusLabels::new("online", "throttled", "degraded", "offline"),
        seed: None,
    }
}
