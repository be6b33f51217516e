//! HTTP front for the telemetry domains: snapshots, operation gating and
//! Prometheus export.

pub mod api;
pub mod app;
pub mod config;

pub use app::{handle_request, route, serve, AppState};
pub use config::ServiceConfig;
