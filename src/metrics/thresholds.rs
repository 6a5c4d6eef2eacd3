//! Threshold parsing and evaluation.
//!
//! Thresholds are declared in the config as a map from a metric key to a list
//! of expressions:
//!
//! ```json
//! {
//!   "step_duration": ["p(95)<500", "avg<200"],
//!   "step_failed": ["rate<0.01"],
//!   "step_duration{createUser 2xx}": ["p(99)<800"]
//! }
//! ```
//!
//! `step_duration` selects latency statistics (`p(N)`, `avg`), `step_failed`
//! the failure rate (`rate`). A `{check name}` suffix scopes the metric to
//! one named check. Evaluation happens once, read-only, over the full sample
//! set; a violated threshold is the expected run-failure mechanism, not an
//! error.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::ThresholdParseError;
use crate::metrics::collector::MetricsCollector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Metric {
    StepDuration,
    StepFailed,
}

impl Metric {
    fn as_str(&self) -> &'static str {
        match self {
            Metric::StepDuration => "step_duration",
            Metric::StepFailed => "step_failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Stat {
    Percentile(f64),
    Mean,
    FailureRate,
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Percentile(p) => write!(f, "p({p})"),
            Stat::Mean => write!(f, "avg"),
            Stat::FailureRate => write!(f, "rate"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Lt,
    Le,
    Gt,
    Ge,
}

impl Op {
    fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Op::Lt => observed < bound,
            Op::Le => observed <= bound,
            Op::Gt => observed > bound,
            Op::Ge => observed >= bound,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
        }
    }
}

/// One declared pass/fail bound on an aggregate statistic.
#[derive(Debug, Clone)]
pub struct Threshold {
    pub metric: Metric,
    pub scope: Option<String>,
    pub stat: Stat,
    pub op: Op,
    pub bound: f64,
}

impl Threshold {
    /// Parse one metric key (`step_duration` or `step_duration{check}`) and
    /// expression (`p(95)<500`).
    pub fn parse(key: &str, expr: &str) -> Result<Self, ThresholdParseError> {
        let (metric, scope) = parse_key(key)?;
        let (stat, op, bound) = parse_expr(expr)?;

        let valid = matches!(
            (metric, stat),
            (Metric::StepDuration, Stat::Percentile(_))
                | (Metric::StepDuration, Stat::Mean)
                | (Metric::StepFailed, Stat::FailureRate)
        );
        if !valid {
            return Err(ThresholdParseError::StatMetricMismatch {
                stat: stat.to_string(),
                metric: metric.as_str().to_string(),
            });
        }

        Ok(Self {
            metric,
            scope,
            stat,
            op,
            bound,
        })
    }

    /// Observed value of this threshold's statistic over the collected
    /// samples.
    pub fn observe(&self, collector: &MetricsCollector) -> f64 {
        let scope = self.scope.as_deref();
        match self.stat {
            Stat::Percentile(p) => collector.duration_percentile(p / 100.0, scope),
            Stat::Mean => collector.duration_mean(scope),
            Stat::FailureRate => collector.failure_rate(scope),
        }
    }

    pub fn name(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{}{{{}}}: {}{}{}", self.metric.as_str(), scope, self.stat, self.op.as_str(), self.bound),
            None => format!("{}: {}{}{}", self.metric.as_str(), self.stat, self.op.as_str(), self.bound),
        }
    }
}

fn parse_key(key: &str) -> Result<(Metric, Option<String>), ThresholdParseError> {
    let (name, scope) = match key.find('{') {
        Some(open) => {
            let rest = &key[open + 1..];
            let close = rest
                .find('}')
                .ok_or_else(|| ThresholdParseError::UnterminatedScope(key.to_string()))?;
            (&key[..open], Some(rest[..close].to_string()))
        }
        None => (key, None),
    };

    let metric = match name {
        "step_duration" => Metric::StepDuration,
        "step_failed" => Metric::StepFailed,
        other => return Err(ThresholdParseError::UnknownMetric(other.to_string())),
    };

    Ok((metric, scope))
}

fn parse_expr(expr: &str) -> Result<(Stat, Op, f64), ThresholdParseError> {
    let expr = expr.trim();
    let op_at = expr
        .find(['<', '>'])
        .ok_or_else(|| ThresholdParseError::MissingOperator(expr.to_string()))?;

    let stat_text = expr[..op_at].trim();
    let rest = &expr[op_at..];
    let (op, bound_text) = if let Some(b) = rest.strip_prefix("<=") {
        (Op::Le, b)
    } else if let Some(b) = rest.strip_prefix(">=") {
        (Op::Ge, b)
    } else if let Some(b) = rest.strip_prefix('<') {
        (Op::Lt, b)
    } else {
        (Op::Gt, &rest[1..])
    };

    let stat = if let Some(inner) = stat_text
        .strip_prefix("p(")
        .and_then(|s| s.strip_suffix(')'))
    {
        let percentile: f64 = inner
            .trim()
            .parse()
            .map_err(|_| ThresholdParseError::UnknownStat(stat_text.to_string()))?;
        if !(0.0..=100.0).contains(&percentile) || percentile == 0.0 {
            return Err(ThresholdParseError::PercentileOutOfRange(percentile));
        }
        Stat::Percentile(percentile)
    } else {
        match stat_text {
            "avg" => Stat::Mean,
            "rate" => Stat::FailureRate,
            other => return Err(ThresholdParseError::UnknownStat(other.to_string())),
        }
    };

    let bound: f64 = bound_text
        .trim()
        .parse()
        .map_err(|_| ThresholdParseError::InvalidBound(bound_text.trim().to_string()))?;

    Ok((stat, op, bound))
}

/// Parse the full threshold map from the config.
pub fn parse_all(
    declared: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<Threshold>, (String, ThresholdParseError)> {
    let mut thresholds = Vec::new();
    for (key, exprs) in declared {
        for expr in exprs {
            let threshold = Threshold::parse(key, expr)
                .map_err(|e| (format!("{key}: {expr}"), e))?;
            thresholds.push(threshold);
        }
    }
    Ok(thresholds)
}

/// One evaluated threshold: name, observed value, bound, result.
#[derive(Debug, Clone)]
pub struct ThresholdReport {
    pub name: String,
    pub observed: f64,
    pub op: Op,
    pub bound: f64,
    pub passed: bool,
}

impl fmt::Display for ThresholdReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} observed={:.2} bound={}{}",
            self.name,
            self.observed,
            self.op.as_str(),
            self.bound
        )
    }
}

/// Final run verdict: pass iff every threshold comparison holds.
#[derive(Debug, Clone)]
pub struct RunVerdict {
    pub reports: Vec<ThresholdReport>,
    pub passed: bool,
}

/// Evaluate every threshold once against the full sample set.
pub fn evaluate(thresholds: &[Threshold], collector: &MetricsCollector) -> RunVerdict {
    let reports: Vec<ThresholdReport> = thresholds
        .iter()
        .map(|threshold| {
            let observed = threshold.observe(collector);
            ThresholdReport {
                name: threshold.name(),
                observed,
                op: threshold.op,
                bound: threshold.bound,
                passed: threshold.op.holds(observed, threshold.bound),
            }
        })
        .collect();

    let passed = reports.iter().all(|report| report.passed);
    RunVerdict { reports, passed }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::types::Sample;
    use std::sync::Arc;
    use std::time::Duration;

    fn sample(check: &str, millis: u64, success: bool) -> Sample {
        Sample {
            scenario: Arc::from("test"),
            step: "step".to_string(),
            check: check.to_string(),
            duration: Duration::from_millis(millis),
            success,
        }
    }

    #[test]
    fn test_parse_percentile_threshold() {
        let threshold = Threshold::parse("step_duration", "p(95)<500").unwrap();

        assert_eq!(threshold.metric, Metric::StepDuration);
        assert_eq!(threshold.stat, Stat::Percentile(95.0));
        assert_eq!(threshold.op, Op::Lt);
        assert_eq!(threshold.bound, 500.0);
        assert_eq!(threshold.scope, None);
    }

    #[test]
    fn test_parse_mean_and_rate() {
        let mean = Threshold::parse("step_duration", "avg<200").unwrap();
        assert_eq!(mean.stat, Stat::Mean);

        let rate = Threshold::parse("step_failed", "rate<0.01").unwrap();
        assert_eq!(rate.stat, Stat::FailureRate);
        assert_eq!(rate.bound, 0.01);
    }

    #[test]
    fn test_parse_scoped_key() {
        let threshold =
            Threshold::parse("step_duration{createUser 2xx}", "p(99)<=800").unwrap();

        assert_eq!(threshold.scope.as_deref(), Some("createUser 2xx"));
        assert_eq!(threshold.op, Op::Le);
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(Threshold::parse("http_req_duration", "p(95)<500").is_err());
        assert!(Threshold::parse("step_duration", "p(95)500").is_err());
        assert!(Threshold::parse("step_duration", "median<10").is_err());
        assert!(Threshold::parse("step_duration", "p(0)<10").is_err());
        assert!(Threshold::parse("step_duration{open", "p(95)<10").is_err());
        // rate only applies to step_failed and vice versa
        assert!(Threshold::parse("step_duration", "rate<0.1").is_err());
        assert!(Threshold::parse("step_failed", "avg<10").is_err());
    }

    #[test]
    fn test_evaluation_reports_observed_and_bound() {
        let collector = MetricsCollector::new();
        for _ in 0..9 {
            collector.record(sample("a 2xx", 10, true));
        }
        collector.record(sample("a 2xx", 10, false));

        let thresholds = vec![
            Threshold::parse("step_failed", "rate<0.01").unwrap(),
            Threshold::parse("step_duration", "avg<200").unwrap(),
        ];

        let verdict = evaluate(&thresholds, &collector);

        assert!(!verdict.passed);
        assert!(!verdict.reports[0].passed);
        assert_eq!(verdict.reports[0].observed, 0.1);
        assert_eq!(verdict.reports[0].bound, 0.01);
        assert!(verdict.reports[1].passed);
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let collector = MetricsCollector::new();
        for millis in [12, 34, 56, 78, 90] {
            collector.record(sample("a 2xx", millis, true));
        }

        let thresholds = vec![Threshold::parse("step_duration", "p(95)<100").unwrap()];

        let first = evaluate(&thresholds, &collector);
        let second = evaluate(&thresholds, &collector);

        assert_eq!(first.passed, second.passed);
        assert_eq!(first.reports[0].observed, second.reports[0].observed);
    }

    #[test]
    fn test_parse_all_collects_every_expression() {
        let mut declared = BTreeMap::new();
        declared.insert(
            "step_duration".to_string(),
            vec!["p(95)<500".to_string(), "avg<200".to_string()],
        );
        declared.insert("step_failed".to_string(), vec!["rate<0.01".to_string()]);

        let thresholds = parse_all(&declared).unwrap();
        assert_eq!(thresholds.len(), 3);
    }
}
