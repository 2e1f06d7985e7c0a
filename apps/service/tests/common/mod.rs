#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Semaphore;

use uppe_checks::alerts::{AlertDispatcher, DispatchError};
use uppe_checks::database::{MemoryStore, Namespace, RecordStore, StoreError};
use uppe_checks::models::{Check, HttpMethod, Protocol};
use uppe_checks::monitoring::{CheckEngine, CheckState, MonitoringExecutor, ProbeOutcome, Prober};

pub const OWNER_PHONE: &str = "5551234567";

/// Always answers with the same outcome
pub struct FixedProber(pub ProbeOutcome);

#[async_trait]
impl Prober for FixedProber {
    async fn probe(&self, _check: &Check) -> ProbeOutcome {
        self.0
    }
}

/// Never answers
pub struct HangingProber;

#[async_trait]
impl Prober for HangingProber {
    async fn probe(&self, _check: &Check) -> ProbeOutcome {
        std::future::pending().await
    }
}

/// Holds every probe until a permit is added to `gate`
pub struct GatedProber {
    pub gate: Arc<Semaphore>,
    /// Probes that reached the gate
    pub waiting: AtomicUsize,
}

impl GatedProber {
    pub fn new(gate: Arc<Semaphore>) -> Self {
        Self { gate, waiting: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl Prober for GatedProber {
    async fn probe(&self, _check: &Check) -> ProbeOutcome {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
        ProbeOutcome::success(200)
    }
}

/// Tracks the highest number of probes running at the same time
#[derive(Default)]
pub struct CountingProber {
    running: AtomicUsize,
    pub max_running: AtomicUsize,
    pub total: AtomicUsize,
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(&self, _check: &Check) -> ProbeOutcome {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_running.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        self.total.fetch_add(1, Ordering::SeqCst);
        ProbeOutcome::success(200)
    }
}

/// Remembers every alert; optionally fails all of them
#[derive(Default)]
pub struct RecordingDispatcher {
    pub sent: Mutex<Vec<(String, String)>>,
    pub fail: AtomicBool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self { fail: AtomicBool::new(true), ..Self::default() }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn send(&self, contact: &str, message: &str) -> Result<(), DispatchError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DispatchError::Rejected { status: 503, body: "unavailable".to_string() });
        }
        self.sent.lock().unwrap().push((contact.to_string(), message.to_string()));
        Ok(())
    }
}

/// Accepts alerts and never answers
pub struct HangingDispatcher;

#[async_trait]
impl AlertDispatcher for HangingDispatcher {
    async fn send(&self, _contact: &str, _message: &str) -> Result<(), DispatchError> {
        std::future::pending().await
    }
}

/// Memory store with injectable faults
#[derive(Default)]
pub struct FaultyStore {
    pub inner: MemoryStore,
    /// Extra id reported by `list` that has no record behind it
    pub phantom: Option<String>,
    pub fail_list: bool,
    pub fail_updates: bool,
}

#[async_trait]
impl RecordStore for FaultyStore {
    async fn create(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        self.inner.create(namespace, key, record).await
    }

    async fn read(&self, namespace: Namespace, key: &str) -> Result<Value, StoreError> {
        self.inner.read(namespace, key).await
    }

    async fn update(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        if self.fail_updates {
            return Err(StoreError::Connection("disk full".to_string()));
        }
        self.inner.update(namespace, key, record).await
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        self.inner.delete(namespace, key).await
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        if self.fail_list {
            return Err(StoreError::Connection("store offline".to_string()));
        }
        let mut keys = self.inner.list(namespace).await?;
        if let Some(phantom) = &self.phantom {
            keys.push(phantom.clone());
        }
        Ok(keys)
    }
}

pub fn check(url: &str, codes: Vec<u16>, timeout_seconds: u8) -> Check {
    Check::new(OWNER_PHONE, Protocol::Https, url, HttpMethod::Get, codes, timeout_seconds).unwrap()
}

/// A check that was last probed at `at` and found in `state`
pub fn probed_check(url: &str, state: CheckState, at: DateTime<Utc>) -> Check {
    let mut check = check(url, vec![200], 2);
    check.state = state;
    check.last_checked_at = Some(at);
    check
}

pub async fn insert(store: &dyn RecordStore, check: &Check) {
    store.create(Namespace::Checks, &check.id, &check.to_record()).await.unwrap();
}

pub fn engine(
    store: Arc<dyn RecordStore>,
    prober: Arc<dyn Prober>,
    dispatcher: Arc<dyn AlertDispatcher>,
    max_concurrent_probes: usize,
) -> Arc<CheckEngine> {
    let executor = Arc::new(MonitoringExecutor::new(prober));
    Arc::new(CheckEngine::new(store, executor, dispatcher, max_concurrent_probes))
}
