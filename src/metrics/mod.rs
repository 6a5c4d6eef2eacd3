// Metrics module
// Sample intake, aggregation, threshold evaluation and reporting

pub mod collector;
pub mod reporter;
pub mod thresholds;
pub mod types;
