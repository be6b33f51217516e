mod domain;
mod envelope;

pub use domain::{default_for_platform, thresholds, DOMAIN, GAMMA_MAX, LAMBDA_MIN, PHI_CRITICAL};
pub use envelope::{negentropy, ConsciousnessEnvelope};
