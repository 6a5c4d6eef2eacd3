//! Console reporter - live metrics during the run, final verdict after it

use std::io::{self, Write};

use serde_json::json;
use tokio::time::{interval, Duration};

use super::collector::MetricsCollector;
use super::thresholds::RunVerdict;

/// Start periodic metrics reporting (every N seconds)
pub async fn start_periodic_reporter(collector: MetricsCollector, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;

        // Refresh system stats before printing
        collector.update_system_stats();

        print_live_metrics(&collector);
    }
}

/// Print live metrics (clears screen and updates in place)
pub fn print_live_metrics(collector: &MetricsCollector) {
    // Clear screen and move cursor to top
    print!("\x1B[2J\x1B[1;1H");

    let counts = collector.counts();
    let latency = collector.latency_stats();
    let system = collector.system_stats();
    let elapsed = collector.elapsed_seconds();

    println!("╔════════════════════════════════════════════════════════════════╗");
    println!("║                Stampede Load Test - Live Metrics                ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    println!(
        "\n⏱  Elapsed: {:02}:{:02}:{:02}    Live VUs: {}",
        elapsed / 3600,
        (elapsed % 3600) / 60,
        elapsed % 60,
        collector.total_live_vus()
    );

    println!("\n┌─ STEPS ─────────────────────────────────────────────────────┐");
    println!(
        "│  Executed:     {:>8}    Failed:     {:>8}              │",
        counts.steps_total, counts.steps_failed
    );
    println!(
        "│  Iterations:   {:>8}                                    │",
        counts.iterations
    );
    if counts.steps_total > 0 && elapsed > 0 {
        let throughput = counts.steps_total as f64 / elapsed as f64;
        let failure_rate = counts.steps_failed as f64 / counts.steps_total as f64 * 100.0;
        println!(
            "│  Failure Rate: {:>7.2}%    Throughput: {:>7.2}/sec        │",
            failure_rate, throughput
        );
    }
    println!("└─────────────────────────────────────────────────────────────┘");

    if latency.count > 0 {
        println!("\n┌─ STEP LATENCY (ms) ─────────────────────────────────────────┐");
        println!(
            "│  Min: {:>6}  P50: {:>6}  P95: {:>6}  P99: {:>6}  Max: {:>6}│",
            latency.min, latency.p50, latency.p95, latency.p99, latency.max
        );
        println!(
            "│  Mean: {:>8.2} ms    Count: {:>10}                    │",
            latency.mean, latency.count
        );
        println!("└─────────────────────────────────────────────────────────────┘");
    }

    println!("\n┌─ SYSTEM ────────────────────────────────────────────────────┐");
    println!(
        "│  CPU Usage:    {:>6.1}%    Memory: {:>6} / {:>6} MB       │",
        system.cpu_usage, system.memory_used_mb, system.memory_total_mb
    );
    println!("└─────────────────────────────────────────────────────────────┘");

    println!("\n  [Press Ctrl+C to stop test]");

    let _ = io::stdout().flush();
}

/// Print the final report: totals, latency, failed checks, and the verdict
/// with one line per threshold (observed value vs bound).
pub fn print_final_report(collector: &MetricsCollector, verdict: &RunVerdict) {
    let counts = collector.counts();
    let latency = collector.latency_stats();
    let elapsed = collector.elapsed_seconds();

    println!("\n╔════════════════════════════════════════════════════════════════╗");
    println!("║                       FINAL TEST REPORT                         ║");
    println!("╚════════════════════════════════════════════════════════════════╝");

    println!("\n📊 STEPS");
    println!("   Total Executed:       {:>10}", counts.steps_total);
    println!("   Total Failed:         {:>10}", counts.steps_failed);
    println!("   Iterations:           {:>10}", counts.iterations);

    if elapsed > 0 {
        let throughput = counts.steps_total as f64 / elapsed as f64;
        println!("   Throughput:           {:>10.2} steps/sec", throughput);
    }
    if counts.steps_total > 0 {
        let failure_rate =
            counts.steps_failed as f64 / counts.steps_total as f64 * 100.0;
        println!("   Failure Rate:         {:>10.2}%", failure_rate);
    }

    if latency.count > 0 {
        println!("\n📈 STEP LATENCY");
        println!("   Min:                  {:>10} ms", latency.min);
        println!("   P50 (Median):         {:>10} ms", latency.p50);
        println!("   P95:                  {:>10} ms", latency.p95);
        println!("   P99:                  {:>10} ms", latency.p99);
        println!("   Max:                  {:>10} ms", latency.max);
        println!("   Mean:                 {:>10.2} ms", latency.mean);
    }

    let failed_checks = collector.failed_checks();
    if !failed_checks.is_empty() {
        println!("\n❌ FAILED CHECKS");
        for (name, failed, total) in &failed_checks {
            println!("   {name}: {failed}/{total} failed");
        }
    }

    println!("\n🎯 THRESHOLDS");
    for report in &verdict.reports {
        let mark = if report.passed { "✓" } else { "✗" };
        println!("   {mark} {report}");
    }
    if verdict.reports.is_empty() {
        println!("   (none declared)");
    }

    println!("\n⏱  Test Duration: {elapsed} seconds");
    println!(
        "   Verdict: {}",
        if verdict.passed { "PASS" } else { "FAIL" }
    );
    println!("════════════════════════════════════════════════════════════════\n");
}

/// Machine-readable summary of the run.
pub fn json_summary(collector: &MetricsCollector, verdict: &RunVerdict) -> serde_json::Value {
    let counts = collector.counts();
    let latency = collector.latency_stats();

    json!({
        "duration_seconds": collector.elapsed_seconds(),
        "steps": {
            "total": counts.steps_total,
            "failed": counts.steps_failed,
            "iterations": counts.iterations,
            "failure_rate": collector.failure_rate(None),
        },
        "latency_ms": {
            "min": latency.min,
            "p50": latency.p50,
            "p95": latency.p95,
            "p99": latency.p99,
            "max": latency.max,
            "mean": latency.mean,
            "count": latency.count,
        },
        "failed_checks": collector
            .failed_checks()
            .into_iter()
            .map(|(name, failed, total)| json!({
                "check": name,
                "failed": failed,
                "total": total,
            }))
            .collect::<Vec<_>>(),
        "thresholds": verdict
            .reports
            .iter()
            .map(|report| json!({
                "name": report.name,
                "observed": report.observed,
                "bound": report.bound,
                "passed": report.passed,
            }))
            .collect::<Vec<_>>(),
        "passed": verdict.passed,
    })
}
