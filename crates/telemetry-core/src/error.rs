use thiserror::Error;

/// Errors raised by the telemetry core.
///
/// Gate rejections are not errors; they are reported through
/// [`crate::OperationEvaluation::approved`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TelemetryError {
    /// Malformed caller input: unknown metric name, non-finite delta, bad body.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A domain definition that cannot be simulated. Detected at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type TelemetryResult<T> = Result<T, TelemetryError>;
