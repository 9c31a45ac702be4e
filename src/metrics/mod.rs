//! Observability counters for the sequence service.

pub mod registry;

pub use registry::{MetricsSnapshot, ServiceMetrics};
