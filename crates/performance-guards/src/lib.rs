mod domain;
mod envelope;

pub use domain::{
    default_for_platform, thresholds, CPU_MAX, DOMAIN, FIDELITY_MIN, INFERENCE_MAX_MS,
    LATENCY_MAX_MS, MEMORY_MAX,
};
pub use envelope::{headroom, PerformanceEnvelope};
