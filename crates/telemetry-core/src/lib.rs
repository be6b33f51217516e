//! Synthetic metric drift, threshold classification and operation gating.

pub mod domain;
pub mod drift;
pub mod error;
pub mod gate;
pub mod snapshot;
pub mod spec;
pub mod status;
pub mod threshold;
#[cfg(test)]
mod tests;

pub use domain::{AppliedOperation, DomainConfig, DomainReading, DomainSimulator};
pub use drift::MEAN_REVERSION_RATE;
pub use error::{TelemetryError, TelemetryResult};
pub use gate::{validate_delta, OperationEvaluation, APPROVED_REASON};
pub use snapshot::{next_snapshot, now_millis, MetricSnapshot};
pub use spec::{DriftSpec, Formula, MetricKind, MetricSet};
pub use status::{StatusLabels, SystemStatus};
pub use threshold::{
    gate_map, Comparator, GateOutcome, GateRole, GateSpec, ThresholdSet,
    DEFAULT_NEAR_LIMIT_RATIO,
};
