//! Scenario scheduler.
//!
//! Owns the full set of scenario definitions and drives each one through its
//! window on a shared wall-clock timeline: wait for the start offset, run the
//! scenario's concurrency controller for the active duration, stop. Scenarios
//! are independent tasks; overlapping windows genuinely run concurrently
//! against the same target. A controller's lifecycle calls happen inside one
//! task in a fixed start-then-stop order, so no scenario can be stopped
//! before it started.

use std::sync::Arc;
use std::time::Duration;

use crate::controller::{ConcurrencyController, Profile};
use crate::flow::SharedFlow;
use crate::metrics::collector::MetricsCollector;
use crate::transport::HttpTransport;

/// Runtime form of one scenario definition.
pub struct ScenarioSpec {
    pub name: Arc<str>,
    pub flow: SharedFlow,
    pub profile: Profile,
    /// Delay from run start to the scenario window opening.
    pub start_offset: Duration,
    /// Length of the active window.
    pub duration: Duration,
    /// Pause between flow iterations inside one context.
    pub idle: Duration,
}

/// Run-wide knobs shared by every scenario.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub max_vus: usize,
    pub abort_on_check_failure: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_vus: 10_000,
            abort_on_check_failure: false,
        }
    }
}

pub struct ScenarioScheduler {
    scenarios: Vec<Arc<ScenarioSpec>>,
    transport: Arc<dyn HttpTransport>,
    collector: MetricsCollector,
    options: RunOptions,
}

impl ScenarioScheduler {
    pub fn new(
        scenarios: Vec<Arc<ScenarioSpec>>,
        transport: Arc<dyn HttpTransport>,
        collector: MetricsCollector,
        options: RunOptions,
    ) -> Self {
        Self {
            scenarios,
            transport,
            collector,
            options,
        }
    }

    /// Drive every scenario through its window and wait for all of them,
    /// including contexts still draining their final flow.
    pub async fn run(self) {
        let mut handles = Vec::with_capacity(self.scenarios.len());

        for spec in self.scenarios {
            let transport = self.transport.clone();
            let collector = self.collector.clone();
            let options = self.options.clone();

            handles.push(tokio::spawn(async move {
                if !spec.start_offset.is_zero() {
                    tracing::debug!(
                        scenario = %spec.name,
                        offset = ?spec.start_offset,
                        "waiting for start offset"
                    );
                    tokio::time::sleep(spec.start_offset).await;
                }

                let controller = ConcurrencyController::new(
                    spec,
                    transport,
                    collector,
                    options.max_vus,
                    options.abort_on_check_failure,
                );
                controller.run().await;
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("scenario task panicked: {e}");
            }
        }
    }
}
