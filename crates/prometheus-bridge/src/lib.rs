mod guards;
mod metrics;

pub use guards::{record_operation, status_worsens};
pub use metrics::DomainMetrics;
