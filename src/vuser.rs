//! Virtual user contexts.
//!
//! One virtual user is one tokio task looping Starting → Running → Stopping →
//! Stopped: run the flow with fresh state, idle, check the stop flag, repeat.
//! The stop flag is cooperative and only consulted between iterations, so an
//! in-flight flow always runs to completion; a flow started near the end of a
//! scenario window may finish after the window closes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::flow::{FlowRunner, FlowState, SharedFlow};
use crate::metrics::collector::MetricsCollector;

/// Identity of one virtual user: scenario name plus sequential index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VuIdentity {
    pub scenario: Arc<str>,
    pub index: usize,
}

impl VuIdentity {
    pub fn new(scenario: impl Into<Arc<str>>, index: usize) -> Self {
        Self {
            scenario: scenario.into(),
            index,
        }
    }
}

impl fmt::Display for VuIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.scenario, self.index)
    }
}

/// Lifecycle of a virtual user context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VuState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

/// One simulated independent client.
pub struct VirtualUser {
    identity: VuIdentity,
    flow: SharedFlow,
    runner: FlowRunner,
    collector: MetricsCollector,
    idle: Duration,
    stop: Arc<AtomicBool>,
}

impl VirtualUser {
    pub fn new(
        identity: VuIdentity,
        flow: SharedFlow,
        runner: FlowRunner,
        collector: MetricsCollector,
        idle: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            identity,
            flow,
            runner,
            collector,
            idle,
            stop,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }

    /// Drive the context until the stop flag is set. Consumes the context;
    /// nothing survives past Stopped.
    pub async fn run(self) {
        tracing::trace!(vu = %self.identity, state = ?VuState::Starting, "context starting");

        self.collector.vu_started(&self.identity.scenario);
        tracing::trace!(vu = %self.identity, state = ?VuState::Running, "context running");

        let mut iteration = 0u64;
        loop {
            if self.stop_requested() {
                break;
            }

            let mut flow_state = FlowState::new(self.identity.clone(), iteration);
            let outcome = self.runner.run(&self.flow, &mut flow_state).await;
            self.collector.iteration_completed();

            if outcome.steps_failed > 0 {
                tracing::trace!(
                    vu = %self.identity,
                    iteration,
                    failed = outcome.steps_failed,
                    "iteration had failed steps"
                );
            }
            iteration += 1;

            // Check again before the idle sleep so a stop that arrived while
            // the flow was in flight takes effect promptly.
            if self.stop_requested() {
                break;
            }
            tokio::time::sleep(self.idle).await;
        }

        tracing::trace!(
            vu = %self.identity,
            state = ?VuState::Stopping,
            iterations = iteration,
            "context stopping"
        );

        self.collector.vu_stopped(&self.identity.scenario);
        tracing::trace!(vu = %self.identity, state = ?VuState::Stopped, "context stopped");
    }
}
