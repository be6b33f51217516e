use crate::DomainMetrics;
use telemetry_core::{OperationEvaluation, SystemStatus};
use tracing::warn;

/// Counts the verdict and hands back whether the operation may proceed.
pub fn record_operation(
    metrics: &DomainMetrics,
    domain: &str,
    evaluation: &OperationEvaluation,
) -> bool {
    metrics.observe_operation(domain, evaluation);
    evaluation.approved
}

/// True when the projection lands in a worse status than `before`.
pub fn status_worsens(domain: &str, before: SystemStatus, evaluation: &OperationEvaluation) -> bool {
    let worse = evaluation.projected_status > before;
    if worse {
        warn!(
            domain,
            from = %before,
            to = %evaluation.projected_status,
            "operation would worsen domain status"
        );
    }
    worse
}
