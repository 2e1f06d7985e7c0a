/// Record store layer
///
/// The engine and the CRUD layer share one durable keyed store of JSON
/// records. Every operation on a given `(namespace, key)` is atomic with
/// respect to other operations on the same key; operations on different keys
/// are independent.
pub mod memory;
pub mod migrations;
pub mod repository;

pub use memory::MemoryStore;
pub use repository::LibsqlStore;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> anyhow::Result<()> {
    migrations::run_migrations(conn).await
}

/// Record namespaces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    Checks,
    Users,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::Checks => "checks",
            Namespace::Users => "users",
        }
    }
}

impl std::fmt::Display for Namespace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Record {namespace}/{key} not found")]
    NotFound { namespace: Namespace, key: String },

    #[error("Record {namespace}/{key} already exists")]
    AlreadyExists { namespace: Namespace, key: String },

    #[error("Record store query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("Record store connection unavailable: {0}")]
    Connection(String),

    #[error("Stored record is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub fn not_found(namespace: Namespace, key: &str) -> Self {
        StoreError::NotFound { namespace, key: key.to_string() }
    }

    pub fn already_exists(namespace: Namespace, key: &str) -> Self {
        StoreError::AlreadyExists { namespace, key: key.to_string() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Durable keyed storage of JSON records
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store a new record; fails with `AlreadyExists` if the key is taken
    async fn create(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError>;

    /// Read a record; fails with `NotFound` if the key is absent
    async fn read(&self, namespace: Namespace, key: &str) -> Result<Value, StoreError>;

    /// Replace an existing record; fails with `NotFound` if the key is absent
    async fn update(&self, namespace: Namespace, key: &str, record: &Value) -> Result<(), StoreError>;

    /// Remove a record; fails with `NotFound` if the key is absent
    async fn delete(&self, namespace: Namespace, key: &str) -> Result<(), StoreError>;

    /// Keys currently present in a namespace, sorted
    ///
    /// The listing is a snapshot; keys may appear or vanish before they are
    /// read.
    async fn list(&self, namespace: Namespace) -> Result<Vec<String>, StoreError>;
}
