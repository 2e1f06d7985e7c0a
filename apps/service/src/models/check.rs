use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::monitoring::types::CheckState;
use crate::validation::{ValidationError, validate_check};

/// Length of every check id
pub const CHECK_ID_LEN: usize = 20;

/// Length of an owner phone number
pub const PHONE_LEN: usize = 10;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Generate a fresh random check id
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..CHECK_ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        match raw {
            "http" => Some(Protocol::Http),
            "https" => Some(Protocol::Https),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpMethod {
    Post,
    Get,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Post => "post",
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Delete => "delete",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        match raw {
            "post" => Some(HttpMethod::Post),
            "get" => Some(HttpMethod::Get),
            "put" => Some(HttpMethod::Put),
            "delete" => Some(HttpMethod::Delete),
            _ => None,
        }
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A validated check record
///
/// Only [`validate_check`] produces one from stored data, so every `Check` in
/// the engine satisfies the record rules (id and phone lengths, known enum
/// values, status codes in range, timeout within 1..=5 seconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Check {
    pub id: String,
    pub owner_phone: String,
    pub protocol: Protocol,
    /// Host and path without the scheme
    pub url: String,
    pub method: HttpMethod,
    pub acceptable_codes: Vec<u16>,
    pub timeout_seconds: u8,
    pub state: CheckState,
    pub last_checked_at: Option<DateTime<Utc>>,
}

impl Check {
    /// Build a never-probed check with a fresh id
    pub fn new(
        owner_phone: impl Into<String>,
        protocol: Protocol,
        url: impl Into<String>,
        method: HttpMethod,
        acceptable_codes: Vec<u16>,
        timeout_seconds: u8,
    ) -> Result<Self, ValidationError> {
        let draft = Self {
            id: generate_id(),
            owner_phone: owner_phone.into(),
            protocol,
            url: url.into(),
            method,
            acceptable_codes,
            timeout_seconds,
            state: CheckState::Down,
            last_checked_at: None,
        };

        validate_check(&draft.to_record())
    }

    /// Full URL the probe is sent to
    pub fn target_url(&self) -> String {
        format!("{}://{}", self.protocol.as_str(), self.url)
    }

    /// State recorded by the last probe, if there ever was one
    pub fn previous_state(&self) -> Option<CheckState> {
        self.last_checked_at.map(|_| self.state)
    }

    /// Short human label, e.g. `GET https://example.com/health`
    pub fn describe(&self) -> String {
        format!("{} {}", self.method.as_str().to_uppercase(), self.target_url())
    }

    /// Stored JSON shape of this check
    pub fn to_record(&self) -> Value {
        let mut record = json!({
            "id": self.id,
            "userPhone": self.owner_phone,
            "protocol": self.protocol.as_str(),
            "url": self.url,
            "method": self.method.as_str(),
            "successCodes": self.acceptable_codes,
            "timeoutSeconds": self.timeout_seconds,
            "state": self.state.as_str(),
        });

        if let (Some(at), Some(fields)) = (self.last_checked_at, record.as_object_mut()) {
            fields.insert("lastChecked".to_string(), json!(at.timestamp_millis()));
        }

        record
    }
}
