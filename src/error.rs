//! Error types for the load orchestrator.
//!
//! Configuration problems are the only fatal errors: they are surfaced before
//! any scenario starts and abort the run. Everything that happens while load
//! is flowing (transport failures, failed checks, start deficits) is recorded
//! as data, never raised.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors found while loading or validating the run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("scenario '{0}' is declared more than once")]
    DuplicateScenario(String),

    #[error("scenario '{scenario}' references unknown flow '{flow}'")]
    UnknownFlow { scenario: String, flow: String },

    #[error("scenario '{scenario}' has a flat profile with count 0")]
    ZeroCount { scenario: String },

    #[error("scenario '{scenario}' has a flat profile but no duration")]
    MissingDuration { scenario: String },

    #[error("scenario '{scenario}' has a ramp profile with no stages")]
    EmptyStages { scenario: String },

    #[error(
        "scenario '{scenario}': ramp stage durations sum to {stage_total:?} \
         but the scenario duration is {duration:?}"
    )]
    StageDurationMismatch {
        scenario: String,
        stage_total: Duration,
        duration: Duration,
    },

    #[error("invalid threshold '{key}': {source}")]
    Threshold {
        key: String,
        #[source]
        source: ThresholdParseError,
    },
}

/// Errors produced while parsing a threshold expression such as `p(95)<500`.
#[derive(Debug, Error)]
pub enum ThresholdParseError {
    #[error("unknown metric '{0}', expected 'step_duration' or 'step_failed'")]
    UnknownMetric(String),

    #[error("unterminated check scope in '{0}'")]
    UnterminatedScope(String),

    #[error("expression '{0}' has no comparison operator")]
    MissingOperator(String),

    #[error("unknown statistic '{0}'")]
    UnknownStat(String),

    #[error("percentile {0} is outside (0, 100)")]
    PercentileOutOfRange(f64),

    #[error("invalid bound '{0}'")]
    InvalidBound(String),

    #[error("statistic '{stat}' cannot be applied to metric '{metric}'")]
    StatMetricMismatch { stat: String, metric: String },
}

/// Errors from the HTTP transport. Step execution converts every variant
/// into a failed sample; nothing here propagates past the step executor.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid request url '{0}'")]
    InvalidUrl(String),
}
