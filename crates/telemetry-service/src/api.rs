use hyper::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemetry_core::{
    AppliedOperation, DomainReading, MetricSnapshot, OperationEvaluation, SystemStatus,
    TelemetryError,
};
use thiserror::Error;

/// Body of `POST /domains/{domain}/operation`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case", deny_unknown_fields)]
pub enum OperationRequest {
    Evaluate { delta: BTreeMap<String, f64> },
    Apply { delta: BTreeMap<String, f64> },
    Reset {},
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub domain: String,
    pub metrics: MetricSnapshot,
    pub status: SystemStatus,
    pub status_label: String,
    pub gates: BTreeMap<String, bool>,
}

impl From<DomainReading> for SnapshotResponse {
    fn from(reading: DomainReading) -> Self {
        Self {
            gates: reading.gate_map(),
            domain: reading.domain,
            metrics: reading.snapshot,
            status: reading.status,
            status_label: reading.label,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OperationResponse {
    pub domain: String,
    pub action: &'static str,
    pub current_state: MetricSnapshot,
    pub projected_state: MetricSnapshot,
    pub projected_status: SystemStatus,
    /// Projected status is worse than the current one.
    pub worsens_status: bool,
    pub gates: BTreeMap<String, bool>,
    pub approved: bool,
    pub reason: String,
    pub committed: bool,
}

impl OperationResponse {
    pub fn evaluated(domain: &str, evaluation: OperationEvaluation, worsens_status: bool) -> Self {
        Self::build(domain, "evaluate", evaluation, worsens_status, false)
    }

    pub fn applied(domain: &str, applied: AppliedOperation, worsens_status: bool) -> Self {
        Self::build(
            domain,
            "apply",
            applied.evaluation,
            worsens_status,
            applied.committed,
        )
    }

    fn build(
        domain: &str,
        action: &'static str,
        evaluation: OperationEvaluation,
        worsens_status: bool,
        committed: bool,
    ) -> Self {
        Self {
            domain: domain.to_string(),
            action,
            current_state: evaluation.current,
            projected_state: evaluation.projected,
            projected_status: evaluation.projected_status,
            worsens_status,
            gates: evaluation.gates,
            approved: evaluation.approved,
            reason: evaluation.reason,
            committed,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub domain: String,
    pub action: &'static str,
    pub reset: bool,
}

#[derive(Debug, Serialize)]
pub struct DomainSummary {
    pub name: String,
    pub metrics: Vec<String>,
    pub gates: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        let error = match self {
            ApiError::InvalidInput(_) => "invalid_input",
            ApiError::NotFound(_) => "not_found",
            ApiError::Internal(_) => "internal",
        };
        ErrorBody {
            error,
            message: self.to_string(),
        }
    }

    /// Describes a rejected body by position only; the payload is never echoed.
    pub fn malformed(err: &serde_json::Error) -> Self {
        use serde_json::error::Category;
        let what = match err.classify() {
            Category::Syntax => "request body is not valid JSON",
            Category::Data => "request body does not match the operation schema",
            Category::Eof => "request body ended unexpectedly",
            Category::Io => "request body could not be read",
        };
        ApiError::InvalidInput(format!(
            "{what} (line {}, column {})",
            err.line(),
            err.column()
        ))
    }
}

impl From<TelemetryError> for ApiError {
    fn from(err: TelemetryError) -> Self {
        match err {
            TelemetryError::InvalidInput(msg) => ApiError::InvalidInput(msg),
            TelemetryError::Configuration(msg) => ApiError::Internal(msg),
        }
    }
}
