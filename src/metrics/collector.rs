//! Metrics collector - thread-safe sample intake with latency tracking.
//!
//! The collector is the single structure mutated by every running context.
//! Writers grab short-lived `parking_lot` write locks around counter bumps
//! and histogram records, so step executors never block on each other for
//! more than a record.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use hdrhistogram::Histogram;
use parking_lot::RwLock;
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

use super::types::{LatencyStats, PopulationCounts, Sample, StepCounts, SystemStats};

/// Per-check slice of the sample set, for scoped thresholds and diagnostics.
struct CheckStats {
    latencies: Histogram<u64>,
    total: u64,
    failed: u64,
}

impl CheckStats {
    fn new() -> Self {
        Self {
            latencies: new_histogram(),
            total: 0,
            failed: 0,
        }
    }
}

fn new_histogram() -> Histogram<u64> {
    // 3 significant digits of precision, auto-resizing
    Histogram::new(3).expect("failed to create histogram")
}

#[derive(Clone)]
pub struct MetricsCollector {
    counts: Arc<RwLock<StepCounts>>,
    latencies: Arc<RwLock<Histogram<u64>>>,
    checks: Arc<RwLock<HashMap<String, CheckStats>>>,
    population: Arc<RwLock<HashMap<String, PopulationCounts>>>,
    system: Arc<RwLock<System>>,
    system_stats: Arc<RwLock<SystemStats>>,
    start_time: Instant,
}

impl MetricsCollector {
    pub fn new() -> Self {
        let system = System::new_with_specifics(
            RefreshKind::new()
                .with_cpu(CpuRefreshKind::everything())
                .with_memory(MemoryRefreshKind::everything()),
        );

        Self {
            counts: Arc::new(RwLock::new(StepCounts::default())),
            latencies: Arc::new(RwLock::new(new_histogram())),
            checks: Arc::new(RwLock::new(HashMap::new())),
            population: Arc::new(RwLock::new(HashMap::new())),
            system: Arc::new(RwLock::new(system)),
            system_stats: Arc::new(RwLock::new(SystemStats::default())),
            start_time: Instant::now(),
        }
    }

    /// Take ownership of one sample.
    pub fn record(&self, sample: Sample) {
        let duration_ms = sample.duration.as_millis() as u64;

        {
            let mut counts = self.counts.write();
            counts.steps_total += 1;
            if !sample.success {
                counts.steps_failed += 1;
            }
        }

        {
            let mut latencies = self.latencies.write();
            let _ = latencies.record(duration_ms);
        }

        let mut checks = self.checks.write();
        let entry = checks
            .entry(sample.check)
            .or_insert_with(CheckStats::new);
        entry.total += 1;
        if !sample.success {
            entry.failed += 1;
        }
        let _ = entry.latencies.record(duration_ms);
    }

    pub fn iteration_completed(&self) {
        self.counts.write().iterations += 1;
    }

    pub fn vu_started(&self, scenario: &str) {
        let mut population = self.population.write();
        let entry = population.entry(scenario.to_string()).or_default();
        entry.live_vus += 1;
        entry.started_total += 1;
        entry.peak_vus = entry.peak_vus.max(entry.live_vus);
    }

    pub fn vu_stopped(&self, scenario: &str) {
        let mut population = self.population.write();
        let entry = population.entry(scenario.to_string()).or_default();
        entry.live_vus = entry.live_vus.saturating_sub(1);
    }

    pub fn vu_start_failed(&self, scenario: &str) {
        let mut population = self.population.write();
        population
            .entry(scenario.to_string())
            .or_default()
            .start_failures += 1;
    }

    pub fn live_vus(&self, scenario: &str) -> usize {
        self.population
            .read()
            .get(scenario)
            .map(|p| p.live_vus)
            .unwrap_or(0)
    }

    pub fn total_live_vus(&self) -> usize {
        self.population.read().values().map(|p| p.live_vus).sum()
    }

    pub fn start_failures(&self, scenario: &str) -> u64 {
        self.population
            .read()
            .get(scenario)
            .map(|p| p.start_failures)
            .unwrap_or(0)
    }

    pub fn counts(&self) -> StepCounts {
        self.counts.read().clone()
    }

    pub fn latency_stats(&self) -> LatencyStats {
        let hist = self.latencies.read();
        LatencyStats {
            min: hist.min(),
            p50: hist.value_at_quantile(0.50),
            p95: hist.value_at_quantile(0.95),
            p99: hist.value_at_quantile(0.99),
            max: hist.max(),
            mean: hist.mean(),
            count: hist.len(),
        }
    }

    /// Percentile of step duration in milliseconds, optionally scoped to one
    /// named check. Deterministic for a fixed sample set; 0 when empty.
    pub fn duration_percentile(&self, quantile: f64, scope: Option<&str>) -> f64 {
        match scope {
            None => self.latencies.read().value_at_quantile(quantile) as f64,
            Some(check) => self
                .checks
                .read()
                .get(check)
                .map(|c| c.latencies.value_at_quantile(quantile) as f64)
                .unwrap_or(0.0),
        }
    }

    /// Mean step duration in milliseconds, optionally scoped.
    pub fn duration_mean(&self, scope: Option<&str>) -> f64 {
        match scope {
            None => self.latencies.read().mean(),
            Some(check) => self
                .checks
                .read()
                .get(check)
                .map(|c| c.latencies.mean())
                .unwrap_or(0.0),
        }
    }

    /// Failed / total over the sample set, optionally scoped. 0.0 when no
    /// samples were collected.
    pub fn failure_rate(&self, scope: Option<&str>) -> f64 {
        let (failed, total) = match scope {
            None => {
                let counts = self.counts.read();
                (counts.steps_failed, counts.steps_total)
            }
            Some(check) => self
                .checks
                .read()
                .get(check)
                .map(|c| (c.failed, c.total))
                .unwrap_or((0, 0)),
        };
        if total == 0 {
            0.0
        } else {
            failed as f64 / total as f64
        }
    }

    /// Named checks that failed at least once, with failed/total counts.
    pub fn failed_checks(&self) -> Vec<(String, u64, u64)> {
        let checks = self.checks.read();
        let mut failed: Vec<_> = checks
            .iter()
            .filter(|(_, stats)| stats.failed > 0)
            .map(|(name, stats)| (name.clone(), stats.failed, stats.total))
            .collect();
        failed.sort();
        failed
    }

    /// Update system stats (CPU, memory) for the live report.
    pub fn update_system_stats(&self) {
        let mut system = self.system.write();
        system.refresh_cpu_all();
        system.refresh_memory();

        let mut stats = self.system_stats.write();
        stats.cpu_usage = system.global_cpu_usage();
        stats.memory_used_mb = system.used_memory() / 1024 / 1024;
        stats.memory_total_mb = system.total_memory() / 1024 / 1024;
    }

    pub fn system_stats(&self) -> SystemStats {
        self.system_stats.read().clone()
    }

    pub fn elapsed_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
