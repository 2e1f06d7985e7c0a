use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::timeout;

use super::checker::Prober;
use super::types::{FailureReason, ProbeOutcome, ProbeReport};
use crate::models::Check;

/// Monitoring executor - runs one probe per call under a hard deadline
///
/// The deadline is the check's own `timeout_seconds`. A probe that has not
/// finished by then is dropped (which cancels its in-flight I/O) and reported
/// as a timeout, whatever the prober itself would have done.
pub struct MonitoringExecutor {
    prober: Arc<dyn Prober>,
}

impl MonitoringExecutor {
    pub fn new(prober: Arc<dyn Prober>) -> Self {
        Self { prober }
    }

    /// Execute a probe for a check
    pub async fn execute_check(&self, check: &Check) -> ProbeReport {
        let deadline = Duration::from_secs(u64::from(check.timeout_seconds));
        let start = Instant::now();

        let outcome = match timeout(deadline, self.prober.probe(check)).await {
            Ok(outcome) => outcome,
            Err(_) => ProbeOutcome::failure(FailureReason::Timeout),
        };

        ProbeReport {
            check_id: check.id.clone(),
            outcome,
            latency_ms: start.elapsed().as_millis() as u64,
            checked_at: chrono::Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, Protocol};

    struct FixedProber(ProbeOutcome);

    #[async_trait::async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _check: &Check) -> ProbeOutcome {
            self.0
        }
    }

    struct HangingProber;

    #[async_trait::async_trait]
    impl Prober for HangingProber {
        async fn probe(&self, _check: &Check) -> ProbeOutcome {
            std::future::pending().await
        }
    }

    fn check(timeout_seconds: u8) -> Check {
        Check::new("5551234567", Protocol::Http, "example.com", HttpMethod::Get, vec![200], timeout_seconds)
            .unwrap()
    }

    #[tokio::test]
    async fn test_passes_outcome_through() {
        let executor = MonitoringExecutor::new(Arc::new(FixedProber(ProbeOutcome::success(204))));
        let check = check(2);

        let report = executor.execute_check(&check).await;
        assert_eq!(report.check_id, check.id);
        assert_eq!(report.outcome, ProbeOutcome::success(204));
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_probe_is_cut_at_timeout() {
        let executor = MonitoringExecutor::new(Arc::new(HangingProber));
        let started = tokio::time::Instant::now();

        let report = executor.execute_check(&check(3)).await;

        assert_eq!(report.outcome, ProbeOutcome::failure(FailureReason::Timeout));
        let waited = started.elapsed();
        assert!(waited >= Duration::from_secs(3) && waited < Duration::from_secs(4));
    }
}
