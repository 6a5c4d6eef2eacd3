//! Concurrency controller.
//!
//! Owns the live population of virtual user contexts for one scenario and
//! walks it through the scenario's concurrency profile: a flat count for the
//! whole window, or a staged ramp whose population changes take effect at
//! stage boundaries only (stepped semantics, no interpolation inside a
//! stage). Ramp-down stops the most-recently-started contexts first, which
//! bounds the lifetime variance of long-lived contexts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::flow::{FlowRunner, SharedFlow};
use crate::metrics::collector::MetricsCollector;
use crate::scheduler::ScenarioSpec;
use crate::step::StepExecutor;
use crate::transport::HttpTransport;
use crate::vuser::{VirtualUser, VuIdentity};

/// Concurrency profile: how many contexts are alive over the scenario window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Profile {
    /// N contexts for the whole active duration.
    Flat { count: usize },
    /// Stepped population targets; stage durations sum to the scenario
    /// duration (validated at config load).
    Ramp { stages: Vec<Stage> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub duration: Duration,
    pub target: usize,
}

struct VuHandle {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Drives one scenario's population.
pub struct ConcurrencyController {
    spec: Arc<ScenarioSpec>,
    transport: Arc<dyn HttpTransport>,
    collector: MetricsCollector,
    /// Hard cap on simultaneously live contexts across the run. Exceeding it
    /// is a context-start failure: recorded, tolerated, never fatal.
    max_vus: usize,
    abort_on_check_failure: bool,
    next_index: usize,
    live: Vec<VuHandle>,
    draining: Vec<JoinHandle<()>>,
}

impl ConcurrencyController {
    pub fn new(
        spec: Arc<ScenarioSpec>,
        transport: Arc<dyn HttpTransport>,
        collector: MetricsCollector,
        max_vus: usize,
        abort_on_check_failure: bool,
    ) -> Self {
        Self {
            spec,
            transport,
            collector,
            max_vus,
            abort_on_check_failure,
            next_index: 0,
            live: Vec::new(),
            draining: Vec::new(),
        }
    }

    /// Run the scenario window to completion: start contexts per the profile,
    /// adjust at stage boundaries, stop everything at the end and wait for
    /// in-flight flows to drain.
    pub async fn run(mut self) {
        let profile = self.spec.profile.clone();
        match profile {
            Profile::Flat { count } => {
                tracing::info!(
                    scenario = %self.spec.name,
                    count,
                    duration = ?self.spec.duration,
                    "starting flat scenario"
                );
                self.grow_to(count);
                tokio::time::sleep(self.spec.duration).await;
            }
            Profile::Ramp { stages } => {
                tracing::info!(
                    scenario = %self.spec.name,
                    stages = stages.len(),
                    "starting ramp scenario"
                );
                for (index, stage) in stages.iter().enumerate() {
                    tracing::debug!(
                        scenario = %self.spec.name,
                        stage = index,
                        target = stage.target,
                        duration = ?stage.duration,
                        "entering stage"
                    );
                    self.adjust_to(stage.target);
                    tokio::time::sleep(stage.duration).await;
                }
            }
        }

        self.stop_all().await;
        tracing::info!(scenario = %self.spec.name, "scenario complete");
    }

    fn adjust_to(&mut self, target: usize) {
        let current = self.live.len();
        if target > current {
            self.grow_to(target);
        } else if target < current {
            self.shrink_to(target);
        }
    }

    fn grow_to(&mut self, target: usize) {
        let needed = target.saturating_sub(self.live.len());
        for _ in 0..needed {
            match self.spawn_vu() {
                Ok(handle) => self.live.push(handle),
                Err(()) => {
                    // One attempt per slot, no retry. The deficit is
                    // tolerated; the scenario keeps running with the
                    // contexts that did start.
                    self.collector.vu_start_failed(&self.spec.name);
                    self.next_index += 1;
                }
            }
        }
    }

    /// Signal stop to the most-recently-started contexts first. The stopped
    /// contexts finish their current flow, so they drain asynchronously.
    fn shrink_to(&mut self, target: usize) {
        while self.live.len() > target {
            if let Some(vu) = self.live.pop() {
                vu.stop.store(true, Ordering::Relaxed);
                self.draining.push(vu.handle);
            }
        }
    }

    fn spawn_vu(&mut self) -> Result<VuHandle, ()> {
        if self.live.len() >= self.max_vus {
            tracing::warn!(
                scenario = %self.spec.name,
                max_vus = self.max_vus,
                "context start failed: population cap reached"
            );
            return Err(());
        }

        let identity = VuIdentity {
            scenario: self.spec.name.clone(),
            index: self.next_index,
        };
        self.next_index += 1;

        let stop = Arc::new(AtomicBool::new(false));
        let executor = StepExecutor::new(
            self.spec.name.clone(),
            self.transport.clone(),
            self.collector.clone(),
        );
        let vu = VirtualUser::new(
            identity,
            self.spec.flow.clone(),
            FlowRunner::new(executor, self.abort_on_check_failure),
            self.collector.clone(),
            self.spec.idle,
            stop.clone(),
        );

        let handle = tokio::spawn(vu.run());
        Ok(VuHandle { stop, handle })
    }

    async fn stop_all(&mut self) {
        for vu in &self.live {
            vu.stop.store(true, Ordering::Relaxed);
        }

        for vu in self.live.drain(..) {
            if let Err(e) = vu.handle.await {
                tracing::error!(scenario = %self.spec.name, "context task panicked: {e}");
            }
        }
        for handle in self.draining.drain(..) {
            if let Err(e) = handle.await {
                tracing::error!(scenario = %self.spec.name, "context task panicked: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::flow::Flow;
    use crate::step::{StepDef, Verification};
    use crate::transport::{Method, RequestSpec, ResponseInfo};
    use async_trait::async_trait;

    struct OkTransport;

    #[async_trait]
    impl HttpTransport for OkTransport {
        async fn execute(&self, _request: &RequestSpec) -> Result<ResponseInfo, TransportError> {
            Ok(ResponseInfo::new(200))
        }
    }

    fn ping_flow() -> SharedFlow {
        Arc::new(Flow::new(
            "ping",
            vec![StepDef::new(
                "ping",
                |_state| RequestSpec::new(Method::Get, "/ping"),
                Verification::status_is("ping 200", 200),
            )],
        ))
    }

    fn spec(name: &str, profile: Profile, duration: Duration) -> Arc<ScenarioSpec> {
        Arc::new(ScenarioSpec {
            name: Arc::from(name),
            flow: ping_flow(),
            profile,
            start_offset: Duration::ZERO,
            duration,
            idle: Duration::from_millis(10),
        })
    }

    fn controller(
        spec: Arc<ScenarioSpec>,
        collector: &MetricsCollector,
        max_vus: usize,
    ) -> ConcurrencyController {
        ConcurrencyController::new(
            spec,
            Arc::new(OkTransport),
            collector.clone(),
            max_vus,
            false,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_flat_population_holds_for_the_window() {
        let collector = MetricsCollector::new();
        let spec = spec(
            "flat",
            Profile::Flat { count: 10 },
            Duration::from_secs(10),
        );

        let handle = tokio::spawn(controller(spec, &collector, 10_000).run());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(collector.live_vus("flat"), 10);

        handle.await.unwrap();
        assert_eq!(collector.live_vus("flat"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_population_steps_at_stage_boundaries() {
        let collector = MetricsCollector::new();
        let stages = vec![
            Stage {
                duration: Duration::from_secs(4),
                target: 2,
            },
            Stage {
                duration: Duration::from_secs(4),
                target: 6,
            },
            Stage {
                duration: Duration::from_secs(4),
                target: 1,
            },
        ];
        let spec = spec("ramp", Profile::Ramp { stages }, Duration::from_secs(12));

        let handle = tokio::spawn(controller(spec, &collector, 10_000).run());

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(collector.live_vus("ramp"), 2);

        tokio::time::sleep(Duration::from_secs(4)).await; // t = 6s, stage 2
        assert_eq!(collector.live_vus("ramp"), 6);

        tokio::time::sleep(Duration::from_secs(4)).await; // t = 10s, stage 3
        assert_eq!(collector.live_vus("ramp"), 1);

        handle.await.unwrap();
        assert_eq!(collector.live_vus("ramp"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ramp_matching_original_profile_reaches_and_releases_peak() {
        // Stepped rendition of [(1m,0),(4m,100),(4m,100),(1m,0)]
        let collector = MetricsCollector::new();
        let stages = vec![
            Stage {
                duration: Duration::from_secs(60),
                target: 0,
            },
            Stage {
                duration: Duration::from_secs(240),
                target: 100,
            },
            Stage {
                duration: Duration::from_secs(240),
                target: 100,
            },
            Stage {
                duration: Duration::from_secs(60),
                target: 0,
            },
        ];
        let spec = spec("full", Profile::Ramp { stages }, Duration::from_secs(600));

        let handle = tokio::spawn(controller(spec, &collector, 10_000).run());

        tokio::time::sleep(Duration::from_secs(30)).await; // inside stage 1
        assert_eq!(collector.live_vus("full"), 0);

        tokio::time::sleep(Duration::from_secs(271)).await; // t = 301s, past 5m
        assert_eq!(collector.live_vus("full"), 100);

        tokio::time::sleep(Duration::from_secs(241)).await; // t = 542s, inside final stage
        assert_eq!(collector.live_vus("full"), 0);

        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failures_are_tolerated() {
        let collector = MetricsCollector::new();
        let spec = spec(
            "capped",
            Profile::Flat { count: 5 },
            Duration::from_secs(2),
        );

        let handle = tokio::spawn(controller(spec, &collector, 3).run());

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(collector.live_vus("capped"), 3);
        assert_eq!(collector.start_failures("capped"), 2);

        // The scenario still completes despite the deficit
        handle.await.unwrap();
        assert_eq!(collector.live_vus("capped"), 0);
    }
}
