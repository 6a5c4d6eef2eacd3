//! Metric types

use std::sync::Arc;
use std::time::Duration;

/// One measured step outcome. Emitted exactly once per step execution;
/// ownership moves to the collector on record.
#[derive(Debug, Clone)]
pub struct Sample {
    pub scenario: Arc<str>,
    pub step: String,
    pub check: String,
    pub duration: Duration,
    pub success: bool,
}

#[derive(Debug, Clone, Default)]
pub struct StepCounts {
    pub steps_total: u64,
    pub steps_failed: u64,
    pub iterations: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PopulationCounts {
    pub live_vus: usize,
    pub peak_vus: usize,
    pub started_total: u64,
    pub start_failures: u64,
}

#[derive(Debug, Clone, Default)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_used_mb: u64,
    pub memory_total_mb: u64,
}

#[derive(Debug, Clone)]
pub struct LatencyStats {
    pub min: u64,
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
    pub mean: f64,
    pub count: u64,
}
