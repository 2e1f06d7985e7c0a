use chrono::{DateTime, TimeDelta, Utc};
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use super::evaluator::evaluate;
use super::executor::MonitoringExecutor;
use super::types::{CheckState, ProbeOutcome, Transition};
use crate::alerts::{AlertDispatcher, DispatchError, alert_message};
use crate::database::{Namespace, RecordStore, StoreError};
use crate::models::{Check, User};
use crate::validation::{ValidationError, validate_check};

/// Longest an alert delivery may hold a check's claim
pub const DEFAULT_ALERT_TIMEOUT: Duration = Duration::from_secs(10);

/// Why a single check was skipped for this tick
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What happened to one check during a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckDisposition {
    /// Listed, but deleted before its result could be saved
    Vanished,
    Evaluated { outcome: ProbeOutcome, transition: Transition, alert: AlertDelivery },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDelivery {
    NotNeeded,
    Sent,
    Failed,
}

/// Counters for one completed tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Ids returned by the store listing
    pub listed: usize,
    /// Still being processed by an earlier tick, left alone
    pub busy: usize,
    pub vanished: usize,
    pub invalid: usize,
    pub store_errors: usize,
    pub probed: usize,
    pub up: usize,
    pub down: usize,
    pub first_checks: usize,
    pub transitions: usize,
    pub alerts_sent: usize,
    pub alerts_failed: usize,
    /// Per-check tasks that panicked
    pub crashed: usize,
}

impl TickReport {
    fn record(&mut self, result: &Result<CheckDisposition, CheckError>) {
        match result {
            Ok(CheckDisposition::Vanished) => self.vanished += 1,
            Ok(CheckDisposition::Evaluated { transition, alert, .. }) => {
                self.probed += 1;
                match transition.next_state() {
                    CheckState::Up => self.up += 1,
                    CheckState::Down => self.down += 1,
                }
                match transition {
                    Transition::FirstCheck(_) => self.first_checks += 1,
                    Transition::Changed { .. } => self.transitions += 1,
                    Transition::Steady(_) => {}
                }
                match alert {
                    AlertDelivery::Sent => self.alerts_sent += 1,
                    AlertDelivery::Failed => self.alerts_failed += 1,
                    AlertDelivery::NotNeeded => {}
                }
            }
            Err(CheckError::Validation(_)) => self.invalid += 1,
            Err(CheckError::Store(_)) => self.store_errors += 1,
        }
    }
}

/// Ids of checks currently being processed
///
/// A claim is the per-check mutual-exclusion token: while one is held no other
/// tick probes or writes the same check.
#[derive(Debug, Default, Clone)]
struct InFlight {
    ids: Arc<Mutex<HashSet<String>>>,
}

struct Claim {
    id: String,
    ids: Arc<Mutex<HashSet<String>>>,
}

impl InFlight {
    fn try_claim(&self, id: &str) -> Option<Claim> {
        let mut ids = self.ids.lock().unwrap_or_else(PoisonError::into_inner);
        ids.insert(id.to_string())
            .then(|| Claim { id: id.to_string(), ids: Arc::clone(&self.ids) })
    }

    fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl Drop for Claim {
    fn drop(&mut self) {
        self.ids.lock().unwrap_or_else(PoisonError::into_inner).remove(&self.id);
    }
}

/// Runs ticks: list, read, validate, probe, evaluate, persist, alert
pub struct CheckEngine {
    store: Arc<dyn RecordStore>,
    executor: Arc<MonitoringExecutor>,
    dispatcher: Arc<dyn AlertDispatcher>,
    probe_permits: Arc<Semaphore>,
    in_flight: InFlight,
    alert_timeout: Duration,
}

impl CheckEngine {
    pub fn new(
        store: Arc<dyn RecordStore>,
        executor: Arc<MonitoringExecutor>,
        dispatcher: Arc<dyn AlertDispatcher>,
        max_concurrent_probes: usize,
    ) -> Self {
        Self {
            store,
            executor,
            dispatcher,
            probe_permits: Arc::new(Semaphore::new(max_concurrent_probes.max(1))),
            in_flight: InFlight::default(),
            alert_timeout: DEFAULT_ALERT_TIMEOUT,
        }
    }

    /// Override how long one alert delivery may take
    pub fn with_alert_timeout(mut self, alert_timeout: Duration) -> Self {
        self.alert_timeout = alert_timeout;
        self
    }

    /// Number of checks still being processed, across all running ticks
    pub fn checks_in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Run one full tick and wait for every check it dispatched
    ///
    /// Never fails: an unreachable store turns the tick into a logged no-op
    /// and per-check problems only show up in the report.
    pub async fn run_tick(self: &Arc<Self>) -> TickReport {
        let mut report = TickReport::default();

        let ids = match self.store.list(Namespace::Checks).await {
            Ok(ids) => ids,
            Err(e) => {
                warn!("Could not list checks, skipping tick: {}", e);
                report.store_errors += 1;
                return report;
            }
        };
        report.listed = ids.len();
        debug!(checks = ids.len(), "Tick started");

        let mut tasks = JoinSet::new();
        for id in ids {
            let Some(claim) = self.in_flight.try_claim(&id) else {
                debug!(check_id = %id, "Check still in flight from an earlier tick");
                report.busy += 1;
                continue;
            };

            let engine = Arc::clone(self);
            tasks.spawn(async move {
                let _claim = claim;
                let result = engine.process_check(&id).await;
                (id, result)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, result)) => {
                    log_failure(&id, &result);
                    report.record(&result);
                }
                Err(e) => {
                    error!("Check task crashed: {}", e);
                    report.crashed += 1;
                }
            }
        }

        info!(
            listed = report.listed,
            probed = report.probed,
            up = report.up,
            down = report.down,
            transitions = report.transitions,
            alerts_sent = report.alerts_sent,
            alerts_failed = report.alerts_failed,
            invalid = report.invalid,
            store_errors = report.store_errors,
            busy = report.busy,
            "Tick completed"
        );

        report
    }

    /// Process one check; the caller holds its claim
    async fn process_check(&self, id: &str) -> Result<CheckDisposition, CheckError> {
        let record = match self.store.read(Namespace::Checks, id).await {
            Ok(record) => record,
            Err(e) if e.is_not_found() => {
                info!(check_id = %id, "Check was deleted before it could be read");
                return Ok(CheckDisposition::Vanished);
            }
            Err(e) => return Err(e.into()),
        };

        let check = validate_check(&record)?;
        if check.id != id {
            return Err(ValidationError { fields: vec!["id"] }.into());
        }

        let probe = {
            // The semaphore is never closed, so a failed acquire cannot happen.
            let _permit = self.probe_permits.acquire().await.ok();
            self.executor.execute_check(&check).await
        };

        let next = evaluate(&probe.outcome, &check.acceptable_codes);
        let transition = Transition::between(check.previous_state(), next);
        let checked_at = monotonic_after(check.last_checked_at, probe.checked_at);

        // Re-read so edits made while the probe ran are not overwritten.
        let current = match self.store.read(Namespace::Checks, id).await {
            Ok(current) => current,
            Err(e) if e.is_not_found() => {
                info!(check_id = %id, "Check was deleted while it was being probed");
                return Ok(CheckDisposition::Vanished);
            }
            Err(e) => return Err(e.into()),
        };
        self.store
            .update(Namespace::Checks, id, &with_probe_result(current, next, checked_at))
            .await?;

        debug!(
            check_id = %id,
            outcome = %probe.outcome,
            latency_ms = probe.latency_ms,
            state = %next,
            "Check evaluated"
        );

        let alert = if transition.requires_alert() {
            info!(check_id = %id, state = %next, target = %check.target_url(), "Check changed state");
            self.dispatch_alert(&check, next).await
        } else {
            if let Transition::FirstCheck(state) = transition {
                debug!(check_id = %id, %state, "First evaluation recorded as baseline");
            }
            AlertDelivery::NotNeeded
        };

        Ok(CheckDisposition::Evaluated { outcome: probe.outcome, transition, alert })
    }

    /// Send the alert; the state change is already committed either way
    async fn dispatch_alert(&self, check: &Check, state: CheckState) -> AlertDelivery {
        let contact = self.resolve_contact(check).await;
        let message = alert_message(check, state);

        let sent = timeout(self.alert_timeout, self.dispatcher.send(&contact, &message))
            .await
            .unwrap_or(Err(DispatchError::Timeout(self.alert_timeout)));

        match sent {
            Ok(()) => AlertDelivery::Sent,
            Err(e) => {
                warn!(check_id = %check.id, "Alert delivery failed: {}", e);
                AlertDelivery::Failed
            }
        }
    }

    /// Owner contact from the user record, falling back to the check's phone
    async fn resolve_contact(&self, check: &Check) -> String {
        let user = match self.store.read(Namespace::Users, &check.owner_phone).await {
            Ok(record) => User::from_record(record).map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };

        match user {
            Ok(user) if !user.contact().is_empty() => user.contact().to_string(),
            Ok(_) => check.owner_phone.clone(),
            Err(e) => {
                warn!(check_id = %check.id, "Could not load owner record, alerting check phone: {}", e);
                check.owner_phone.clone()
            }
        }
    }
}

/// Keep `lastChecked` strictly increasing for a check even if the wall clock
/// steps backwards.
fn monotonic_after(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(previous) if now <= previous => previous + TimeDelta::milliseconds(1),
        _ => now,
    }
}

/// Set the engine-owned fields on a freshly read record
fn with_probe_result(mut record: Value, state: CheckState, checked_at: DateTime<Utc>) -> Value {
    if let Some(fields) = record.as_object_mut() {
        fields.insert("state".to_string(), json!(state.as_str()));
        fields.insert("lastChecked".to_string(), json!(checked_at.timestamp_millis()));
    }
    record
}

fn log_failure(id: &str, result: &Result<CheckDisposition, CheckError>) {
    match result {
        Err(CheckError::Validation(e)) => warn!(check_id = %id, "Skipping check: {}", e),
        Err(CheckError::Store(e)) => warn!(check_id = %id, "Skipping check this tick: {}", e),
        Ok(_) => {}
    }
}
