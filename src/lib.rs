//! Stampede: a scenario-based load-generation orchestrator for HTTP services.
//!
//! A run is a set of named scenarios, each a time-bounded workload phase with
//! its own concurrency profile (flat or stepped ramp). Every scenario drives
//! a population of virtual user contexts, each looping one business flow: an
//! ordered sequence of request/verify steps threading created identifiers
//! from step to step. All step outcomes feed one collector, which is judged
//! against declared thresholds at the end of the run.

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod flow;
pub mod flows;
pub mod metrics;
pub mod scheduler;
pub mod step;
pub mod transport;
pub mod vuser;
