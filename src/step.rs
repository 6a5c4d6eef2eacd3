//! Step definitions and the step executor.
//!
//! A step is one HTTP call plus a named verification over the response. The
//! executor performs the call exactly once, measures the elapsed wall-clock
//! time and emits exactly one sample. Transport errors become failed samples;
//! they never propagate to the flow runner. Retry policy, if a flow wants
//! one, is expressed as additional steps, never here.

use std::sync::Arc;
use std::time::Instant;

use crate::flow::FlowState;
use crate::metrics::collector::MetricsCollector;
use crate::metrics::types::Sample;
use crate::transport::{HttpTransport, RequestSpec, ResponseInfo};

type BuildFn = Arc<dyn Fn(&mut FlowState) -> RequestSpec + Send + Sync>;
type CheckFn = Arc<dyn Fn(&ResponseInfo) -> bool + Send + Sync>;
type ExtractFn = Arc<dyn Fn(&ResponseInfo, &mut FlowState) + Send + Sync>;

/// A named check: a pure predicate over the response plus a diagnostic label,
/// so reports can say which check failed rather than pointing at an anonymous
/// closure.
#[derive(Clone)]
pub struct Verification {
    name: String,
    check: CheckFn,
}

impl Verification {
    pub fn new(
        name: impl Into<String>,
        check: impl Fn(&ResponseInfo) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// Passes when the status is exactly `code`.
    pub fn status_is(name: impl Into<String>, code: u16) -> Self {
        Self::new(name, move |response| response.status == code)
    }

    /// Passes when the status is any of `codes`.
    pub fn status_in(name: impl Into<String>, codes: &'static [u16]) -> Self {
        Self::new(name, move |response| codes.contains(&response.status))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, response: &ResponseInfo) -> bool {
        (self.check)(response)
    }
}

/// One step of a flow: a request builder over the accumulated flow state, a
/// named verification, and an optional extractor that stores response data
/// back into the state for later steps.
#[derive(Clone)]
pub struct StepDef {
    name: String,
    build: BuildFn,
    verify: Verification,
    extract: Option<ExtractFn>,
}

impl StepDef {
    pub fn new(
        name: impl Into<String>,
        build: impl Fn(&mut FlowState) -> RequestSpec + Send + Sync + 'static,
        verify: Verification,
    ) -> Self {
        Self {
            name: name.into(),
            build: Arc::new(build),
            verify,
            extract: None,
        }
    }

    pub fn with_extract(
        mut self,
        extract: impl Fn(&ResponseInfo, &mut FlowState) + Send + Sync + 'static,
    ) -> Self {
        self.extract = Some(Arc::new(extract));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check_name(&self) -> &str {
        self.verify.name()
    }
}

/// Executes single steps and feeds samples to the collector.
#[derive(Clone)]
pub struct StepExecutor {
    scenario: Arc<str>,
    transport: Arc<dyn HttpTransport>,
    collector: MetricsCollector,
}

impl StepExecutor {
    pub fn new(
        scenario: Arc<str>,
        transport: Arc<dyn HttpTransport>,
        collector: MetricsCollector,
    ) -> Self {
        Self {
            scenario,
            transport,
            collector,
        }
    }

    /// Run one step: build the request, perform the call once, verify, emit
    /// one sample. Returns whether the step succeeded.
    pub async fn execute(&self, step: &StepDef, state: &mut FlowState) -> bool {
        let request = (step.build)(state);

        let start = Instant::now();
        let result = self.transport.execute(&request).await;
        let duration = start.elapsed();

        let success = match &result {
            Ok(response) => {
                // Extraction runs whenever a response exists, even if the
                // check fails: later steps still want the identifier so their
                // own failures stay observable.
                if let Some(extract) = &step.extract {
                    extract(response, state);
                }

                let ok = step.verify.check(response);
                if !ok {
                    tracing::debug!(
                        scenario = %self.scenario,
                        step = step.name(),
                        check = step.check_name(),
                        status = response.status,
                        "check failed"
                    );
                }
                ok
            }
            Err(error) => {
                tracing::debug!(
                    scenario = %self.scenario,
                    step = step.name(),
                    %error,
                    "transport error"
                );
                false
            }
        };

        self.collector.record(Sample {
            scenario: self.scenario.clone(),
            step: step.name.clone(),
            check: step.verify.name().to_string(),
            duration,
            success,
        });

        success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::vuser::VuIdentity;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct ScriptedTransport {
        responses: Vec<Result<ResponseInfo, TransportError>>,
        cursor: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<ResponseInfo, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses,
                cursor: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn execute(&self, _request: &RequestSpec) -> Result<ResponseInfo, TransportError> {
            let index = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.responses[index % self.responses.len()].clone()
        }
    }

    fn executor(
        transport: Arc<dyn HttpTransport>,
        collector: &MetricsCollector,
    ) -> StepExecutor {
        StepExecutor::new(Arc::from("test"), transport, collector.clone())
    }

    fn get_step() -> StepDef {
        StepDef::new(
            "fetch",
            |_state| RequestSpec::new(crate::transport::Method::Get, "/thing"),
            Verification::status_is("fetch 200", 200),
        )
    }

    #[tokio::test]
    async fn test_success_emits_one_passing_sample() {
        let transport = ScriptedTransport::new(vec![Ok(ResponseInfo::new(200))]);
        let collector = MetricsCollector::new();
        let executor = executor(transport, &collector);
        let mut state = FlowState::new(VuIdentity::new("test", 0), 0);

        let ok = executor.execute(&get_step(), &mut state).await;

        assert!(ok);
        let counts = collector.counts();
        assert_eq!(counts.steps_total, 1);
        assert_eq!(counts.steps_failed, 0);
    }

    #[tokio::test]
    async fn test_transport_error_is_a_failed_sample_not_an_error() {
        let transport = ScriptedTransport::new(vec![Err(TransportError::Timeout(
            Duration::from_secs(5),
        ))]);
        let collector = MetricsCollector::new();
        let executor = executor(transport, &collector);
        let mut state = FlowState::new(VuIdentity::new("test", 0), 0);

        let ok = executor.execute(&get_step(), &mut state).await;

        assert!(!ok);
        let counts = collector.counts();
        assert_eq!(counts.steps_total, 1);
        assert_eq!(counts.steps_failed, 1);
    }

    #[tokio::test]
    async fn test_extract_runs_even_when_check_fails() {
        let transport = ScriptedTransport::new(vec![Ok(
            ResponseInfo::new(500).with_body(json!({ "id": 9 }))
        )]);
        let collector = MetricsCollector::new();
        let executor = executor(transport, &collector);

        let step = StepDef::new(
            "create",
            |_state| RequestSpec::new(crate::transport::Method::Post, "/thing"),
            Verification::status_in("create 2xx", &[200, 201]),
        )
        .with_extract(|response, state| {
            if let Some(id) = response.field("id") {
                state.set("thing_id", id.clone());
            }
        });

        let mut state = FlowState::new(VuIdentity::new("test", 0), 0);
        let ok = executor.execute(&step, &mut state).await;

        assert!(!ok);
        assert_eq!(state.path_id("thing_id"), "9");
    }
}
