use serde::{Deserialize, Serialize};
use serde_json::Value;

/// User record as written by the CRUD layer
///
/// The engine only reads it to find where alerts for a check go. The password
/// hash and terms flag in the stored document are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub phone: String,
    #[serde(default)]
    pub checks: Vec<String>,
}

impl User {
    pub fn from_record(record: Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(record)
    }

    /// Phone number alerts are delivered to
    pub fn contact(&self) -> &str {
        self.phone.trim()
    }
}
