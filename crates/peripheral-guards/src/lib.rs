mod domain;
mod envelope;

pub use domain::{default_for_platform, thresholds, BATTERY_MIN_PCT, DOMAIN, POLLING_MAX_MS, TEMP_MAX_C};
pub use envelope::{glow, PanelEnvelope};
