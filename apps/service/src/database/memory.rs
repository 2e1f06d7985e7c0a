use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{Namespace, RecordStore, StoreError};

/// In-process record store
///
/// Same contract as the durable store; contents are lost when the process
/// exits. Each operation runs under one lock acquisition, which makes it
/// atomic per key.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<(Namespace, String), Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records across all namespaces
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        let slot = (namespace, key.to_string());
        if records.contains_key(&slot) {
            return Err(StoreError::already_exists(namespace, key));
        }
        records.insert(slot, record.clone());
        Ok(())
    }

    async fn read(&self, namespace: Namespace, key: &str) -> Result<Value, StoreError> {
        self.records
            .read()
            .await
            .get(&(namespace, key.to_string()))
            .cloned()
            .ok_or_else(|| StoreError::not_found(namespace, key))
    }

    async fn update(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError> {
        let mut records = self.records.write().await;
        match records.get_mut(&(namespace, key.to_string())) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(namespace, key)),
        }
    }

    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .remove(&(namespace, key.to_string()))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(namespace, key))
    }

    async fn list(&self, namespace: Namespace) -> Result<Vec<String>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .keys()
            .filter(|(ns, _)| *ns == namespace)
            .map(|(_, key)| key.clone())
            .collect())
    }
}
