//! Run configuration.
//!
//! Loaded from a JSON file before anything starts; every problem found here
//! is fatal and surfaces before the first scenario begins. Durations accept
//! humantime strings ("2m", "30s", "500ms").

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::controller::{Profile, Stage};
use crate::error::ConfigError;
use crate::flows;
use crate::metrics::thresholds::{self, Threshold};
use crate::scheduler::{RunOptions, ScenarioSpec};

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_idle() -> Duration {
    Duration::from_secs(1)
}

fn default_max_vus() -> usize {
    10_000
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    pub base_url: String,

    /// Headers sent with every request.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Pause between flow iterations inside one context.
    #[serde(default = "default_idle", with = "humantime_serde")]
    pub idle: Duration,

    /// Abort a flow on the first failed check instead of continuing.
    #[serde(default)]
    pub abort_on_check_failure: bool,

    /// Cap on simultaneously live contexts per scenario.
    #[serde(default = "default_max_vus")]
    pub max_vus: usize,

    pub scenarios: Vec<ScenarioConfig>,

    /// Metric key -> threshold expressions, e.g.
    /// `"step_duration": ["p(95)<500", "avg<200"]`.
    #[serde(default)]
    pub thresholds: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioConfig {
    pub name: String,

    /// Built-in flow name, see [`crate::flows::names`].
    pub flow: String,

    #[serde(default, with = "humantime_serde")]
    pub start_offset: Duration,

    /// Active window length. Required for flat profiles; for ramp profiles
    /// it defaults to the sum of the stage durations and, when given, must
    /// match that sum.
    #[serde(default, with = "humantime_serde")]
    pub duration: Option<Duration>,

    pub profile: ProfileConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProfileConfig {
    Flat { count: usize },
    Ramp { stages: Vec<StageConfig> },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageConfig {
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub target: usize,
}

/// Everything the scheduler needs, resolved and validated.
pub struct RunPlan {
    pub scenarios: Vec<Arc<ScenarioSpec>>,
    pub thresholds: Vec<Threshold>,
    pub options: RunOptions,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Resolve flows, check invariants and parse thresholds.
    pub fn build_plan(&self) -> Result<RunPlan, ConfigError> {
        let mut names = HashSet::new();
        let mut scenarios = Vec::with_capacity(self.scenarios.len());

        for scenario in &self.scenarios {
            if !names.insert(scenario.name.clone()) {
                return Err(ConfigError::DuplicateScenario(scenario.name.clone()));
            }

            let flow = flows::builtin(&scenario.flow).ok_or_else(|| ConfigError::UnknownFlow {
                scenario: scenario.name.clone(),
                flow: scenario.flow.clone(),
            })?;

            let (profile, duration) = match &scenario.profile {
                ProfileConfig::Flat { count } => {
                    if *count == 0 {
                        return Err(ConfigError::ZeroCount {
                            scenario: scenario.name.clone(),
                        });
                    }
                    let duration =
                        scenario
                            .duration
                            .ok_or_else(|| ConfigError::MissingDuration {
                                scenario: scenario.name.clone(),
                            })?;
                    (Profile::Flat { count: *count }, duration)
                }
                ProfileConfig::Ramp { stages } => {
                    if stages.is_empty() {
                        return Err(ConfigError::EmptyStages {
                            scenario: scenario.name.clone(),
                        });
                    }
                    let stage_total: Duration = stages.iter().map(|s| s.duration).sum();
                    if let Some(declared) = scenario.duration {
                        if declared != stage_total {
                            return Err(ConfigError::StageDurationMismatch {
                                scenario: scenario.name.clone(),
                                stage_total,
                                duration: declared,
                            });
                        }
                    }
                    let stages = stages
                        .iter()
                        .map(|s| Stage {
                            duration: s.duration,
                            target: s.target,
                        })
                        .collect();
                    (Profile::Ramp { stages }, stage_total)
                }
            };

            scenarios.push(Arc::new(ScenarioSpec {
                name: Arc::from(scenario.name.as_str()),
                flow: Arc::new(flow),
                profile,
                start_offset: scenario.start_offset,
                duration,
                idle: self.idle,
            }));
        }

        let thresholds = thresholds::parse_all(&self.thresholds)
            .map_err(|(key, source)| ConfigError::Threshold { key, source })?;

        Ok(RunPlan {
            scenarios,
            thresholds,
            options: RunOptions {
                max_vus: self.max_vus,
                abort_on_check_failure: self.abort_on_check_failure,
            },
        })
    }
}
