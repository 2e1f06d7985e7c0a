/// Monitoring engine module - periodically probes every stored check
///
/// This module is responsible for:
/// - Probing HTTP/HTTPS targets with a per-check deadline
/// - Deciding UP/DOWN and detecting state changes
/// - Running ticks with bounded concurrency
/// - Alerting owners when a check flips
pub mod checker;
pub mod engine;
pub mod evaluator;
pub mod executor;
pub mod scheduler;
pub mod types;

pub use checker::{HttpChecker, Prober};
pub use engine::{CheckEngine, TickReport};
pub use executor::MonitoringExecutor;
pub use scheduler::{MonitoringScheduler, TickTrigger};
pub use types::{CheckState, FailureReason, ProbeOutcome, ProbeReport, Transition};
