//! Flows and flow state.
//!
//! A flow is an ordered list of step definitions describing one business use
//! case. Flow state lives for exactly one flow invocation inside one virtual
//! user: steps write created identifiers into it and later steps read them
//! back. State is never shared between contexts and never survives an
//! iteration.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use crate::step::{StepDef, StepExecutor};
use crate::vuser::VuIdentity;

/// Ordered sequence of step definitions. No branching, no looping: the flow
/// always terminates after its last step.
pub struct Flow {
    name: String,
    steps: Vec<StepDef>,
}

impl Flow {
    pub fn new(name: impl Into<String>, steps: Vec<StepDef>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StepDef] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Mutable state accumulated over one flow invocation.
///
/// Also carries the executing context's identity, the iteration number and a
/// per-context call sequence. Unique payload suffixes are derived from those
/// three, so no cross-context coordination is needed for uniqueness.
pub struct FlowState {
    values: HashMap<String, Value>,
    identity: VuIdentity,
    iteration: u64,
    seq: u64,
}

impl FlowState {
    pub fn new(identity: VuIdentity, iteration: u64) -> Self {
        Self {
            values: HashMap::new(),
            identity,
            iteration,
            seq: 0,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Stored identifier rendered for a URL path segment.
    ///
    /// If an earlier step failed to produce the identifier the request is
    /// still issued with a sentinel segment, so the downstream failure shows
    /// up in the samples instead of being silently skipped.
    pub fn path_id(&self, key: &str) -> String {
        match self.values.get(key) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            Some(other) => other.to_string(),
            None => "missing".to_string(),
        }
    }

    pub fn identity(&self) -> &VuIdentity {
        &self.identity
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// Next unique suffix for payload fields: `{scenario}-{vu}-{iter}-{seq}`.
    pub fn unique_suffix(&mut self) -> String {
        self.seq += 1;
        format!(
            "{}-{}-{}-{}",
            self.identity.scenario, self.identity.index, self.iteration, self.seq
        )
    }
}

/// Outcome of one flow invocation, for logging and idle decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowOutcome {
    pub steps_run: usize,
    pub steps_failed: usize,
}

/// Runs a flow's steps strictly in declared order within one context.
///
/// By default a failed check does not abort the flow: the remaining steps
/// still run, maximizing the signal collected per iteration. The
/// `abort_on_check_failure` flag flips that policy for runs that prefer
/// short-circuiting.
#[derive(Clone)]
pub struct FlowRunner {
    executor: StepExecutor,
    abort_on_check_failure: bool,
}

impl FlowRunner {
    pub fn new(executor: StepExecutor, abort_on_check_failure: bool) -> Self {
        Self {
            executor,
            abort_on_check_failure,
        }
    }

    pub async fn run(&self, flow: &Flow, state: &mut FlowState) -> FlowOutcome {
        let mut steps_run = 0;
        let mut steps_failed = 0;

        for step in flow.steps() {
            let ok = self.executor.execute(step, state).await;
            steps_run += 1;
            if !ok {
                steps_failed += 1;
                if self.abort_on_check_failure {
                    tracing::debug!(
                        flow = flow.name(),
                        step = step.name(),
                        "check failed, aborting flow"
                    );
                    break;
                }
            }
        }

        FlowOutcome {
            steps_run,
            steps_failed,
        }
    }
}

/// Flows are shared read-only between all contexts of a scenario.
pub type SharedFlow = Arc<Flow>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::metrics::collector::MetricsCollector;
    use crate::step::Verification;
    use crate::transport::{HttpTransport, Method, RequestSpec, ResponseInfo};
    use async_trait::async_trait;
    use serde_json::json;

    fn identity() -> VuIdentity {
        VuIdentity::new("test_scenario", 3)
    }

    /// Responds 500 to any path containing "fail", 200 otherwise.
    struct PathTransport;

    #[async_trait]
    impl HttpTransport for PathTransport {
        async fn execute(&self, request: &RequestSpec) -> Result<ResponseInfo, TransportError> {
            if request.path.contains("fail") {
                Ok(ResponseInfo::new(500))
            } else {
                Ok(ResponseInfo::new(200).with_body(json!({ "id": 1 })))
            }
        }
    }

    fn step(name: &'static str, path: &'static str) -> StepDef {
        StepDef::new(
            name,
            move |_state| RequestSpec::new(Method::Get, path),
            Verification::status_is(format!("{name} 200"), 200),
        )
    }

    fn three_step_flow() -> Flow {
        Flow::new(
            "mixed",
            vec![
                step("first", "/ok"),
                step("second", "/fail"),
                step("third", "/ok"),
            ],
        )
    }

    fn runner(collector: &MetricsCollector, abort: bool) -> FlowRunner {
        let executor = StepExecutor::new(
            Arc::from("test_scenario"),
            Arc::new(PathTransport),
            collector.clone(),
        );
        FlowRunner::new(executor, abort)
    }

    #[tokio::test]
    async fn test_failed_check_does_not_short_circuit() {
        let collector = MetricsCollector::new();
        let mut state = FlowState::new(identity(), 0);

        let outcome = runner(&collector, false)
            .run(&three_step_flow(), &mut state)
            .await;

        // Step two failed, step three still ran: one sample per step
        assert_eq!(outcome.steps_run, 3);
        assert_eq!(outcome.steps_failed, 1);
        let counts = collector.counts();
        assert_eq!(counts.steps_total, 3);
        assert_eq!(counts.steps_failed, 1);
    }

    #[tokio::test]
    async fn test_abort_on_check_failure_stops_the_flow() {
        let collector = MetricsCollector::new();
        let mut state = FlowState::new(identity(), 0);

        let outcome = runner(&collector, true)
            .run(&three_step_flow(), &mut state)
            .await;

        assert_eq!(outcome.steps_run, 2);
        assert_eq!(outcome.steps_failed, 1);
        assert_eq!(collector.counts().steps_total, 2);
    }

    #[tokio::test]
    async fn test_steps_run_in_declared_order_and_share_state() {
        let collector = MetricsCollector::new();
        let mut state = FlowState::new(identity(), 0);

        let flow = Flow::new(
            "chained",
            vec![
                StepDef::new(
                    "create",
                    |_state| RequestSpec::new(Method::Post, "/things"),
                    Verification::status_is("create 200", 200),
                )
                .with_extract(|response, state| {
                    if let Some(id) = response.field("id") {
                        state.set("thing_id", id.clone());
                    }
                }),
                StepDef::new(
                    "read_back",
                    |state| {
                        // The id written by the previous step must be visible
                        assert_eq!(state.path_id("thing_id"), "1");
                        RequestSpec::new(Method::Get, "/things/1")
                    },
                    Verification::status_is("read 200", 200),
                ),
            ],
        );

        let outcome = runner(&collector, false).run(&flow, &mut state).await;
        assert_eq!(outcome.steps_failed, 0);
    }

    #[test]
    fn test_state_set_and_get() {
        let mut state = FlowState::new(identity(), 0);

        state.set("user_id", json!(17));
        assert_eq!(state.get("user_id"), Some(&json!(17)));
        assert_eq!(state.path_id("user_id"), "17");
    }

    #[test]
    fn test_missing_id_renders_sentinel() {
        let state = FlowState::new(identity(), 0);

        assert_eq!(state.path_id("user_id"), "missing");
    }

    #[test]
    fn test_unique_suffix_advances_per_call() {
        let mut state = FlowState::new(identity(), 7);

        assert_eq!(state.unique_suffix(), "test_scenario-3-7-1");
        assert_eq!(state.unique_suffix(), "test_scenario-3-7-2");
    }

    #[test]
    fn test_fresh_states_do_not_share_values() {
        let mut first = FlowState::new(identity(), 0);
        first.set("user_id", json!(1));

        let second = FlowState::new(identity(), 1);
        assert_eq!(second.get("user_id"), None);
        assert_eq!(second.iteration(), 1);
    }
}
