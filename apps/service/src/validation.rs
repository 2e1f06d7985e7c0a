//! Validation of stored check records.
//!
//! Records come back from the store as untyped JSON written by the CRUD layer.
//! [`validate_check`] is the single gate between that data and a typed
//! [`Check`]: it either returns a fully populated check or the list of fields
//! that failed.

use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

use crate::models::check::{CHECK_ID_LEN, PHONE_LEN};
use crate::models::{Check, HttpMethod, Protocol};
use crate::monitoring::types::CheckState;

pub const MIN_TIMEOUT_SECONDS: u64 = 1;
pub const MAX_TIMEOUT_SECONDS: u64 = 5;

const MIN_STATUS_CODE: u64 = 100;
const MAX_STATUS_CODE: u64 = 599;

/// A record failed validation; `fields` names every offending field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed check record (invalid: {})", .fields.join(", "))]
pub struct ValidationError {
    pub fields: Vec<&'static str>,
}

/// Validate a stored check record and build the typed check
pub fn validate_check(record: &Value) -> Result<Check, ValidationError> {
    let Some(fields) = record.as_object() else {
        return Err(ValidationError { fields: vec!["record"] });
    };

    let mut invalid = Vec::new();

    let id = require(&mut invalid, "id", fixed_len_text(fields.get("id"), CHECK_ID_LEN));
    let owner_phone = require(
        &mut invalid,
        "userPhone",
        fixed_len_text(fields.get("userPhone").or_else(|| fields.get("ownerPhone")), PHONE_LEN),
    );
    let protocol = require(
        &mut invalid,
        "protocol",
        text(fields.get("protocol")).and_then(Protocol::from_name),
    );
    let url = require(
        &mut invalid,
        "url",
        text(fields.get("url")).filter(|url| is_probe_target(protocol, url)),
    );
    let method =
        require(&mut invalid, "method", text(fields.get("method")).and_then(HttpMethod::from_name));
    let acceptable_codes =
        require(&mut invalid, "successCodes", status_codes(first_of(fields, &["successCodes", "acceptableCodes"])));
    let timeout_seconds =
        require(&mut invalid, "timeoutSeconds", timeout_seconds(fields.get("timeoutSeconds")));

    // Engine-owned fields fall back to "never checked" instead of failing.
    let state = text(fields.get("state")).and_then(CheckState::from_name).unwrap_or_default();
    let last_checked_at = first_of(fields, &["lastChecked", "lastCheckedAt"])
        .and_then(Value::as_i64)
        .filter(|millis| *millis > 0)
        .and_then(chrono::DateTime::from_timestamp_millis);

    match (id, owner_phone, protocol, url, method, acceptable_codes, timeout_seconds) {
        (
            Some(id),
            Some(owner_phone),
            Some(protocol),
            Some(url),
            Some(method),
            Some(acceptable_codes),
            Some(timeout_seconds),
        ) => Ok(Check {
            id: id.to_string(),
            owner_phone: owner_phone.to_string(),
            protocol,
            url: url.to_string(),
            method,
            acceptable_codes,
            timeout_seconds,
            state,
            last_checked_at,
        }),
        _ => Err(ValidationError { fields: invalid }),
    }
}

/// Whether a phone number is acceptable as an alert contact
pub fn is_valid_phone(phone: &str) -> bool {
    let phone = phone.trim();
    phone.len() == PHONE_LEN && phone.bytes().all(|b| b.is_ascii_digit())
}

fn require<T>(invalid: &mut Vec<&'static str>, field: &'static str, value: Option<T>) -> Option<T> {
    if value.is_none() {
        invalid.push(field);
    }
    value
}

fn first_of<'a>(fields: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names.iter().find_map(|name| fields.get(*name))
}

/// Trimmed, non-empty string
fn text(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty())
}

fn fixed_len_text(value: Option<&Value>, len: usize) -> Option<&str> {
    text(value).filter(|s| s.chars().count() == len)
}

fn status_codes(value: Option<&Value>) -> Option<Vec<u16>> {
    let codes = value?.as_array()?;
    if codes.is_empty() {
        return None;
    }

    codes
        .iter()
        .map(|code| {
            code.as_u64()
                .filter(|c| (MIN_STATUS_CODE..=MAX_STATUS_CODE).contains(c))
                .map(|c| c as u16)
        })
        .collect()
}

fn timeout_seconds(value: Option<&Value>) -> Option<u8> {
    value?
        .as_u64()
        .filter(|t| (MIN_TIMEOUT_SECONDS..=MAX_TIMEOUT_SECONDS).contains(t))
        .map(|t| t as u8)
}

/// The protocol-relative url must form a parseable URL with a host once the
/// scheme is prefixed.
fn is_probe_target(protocol: Option<Protocol>, url: &str) -> bool {
    if url.contains("://") {
        return false;
    }

    let scheme = protocol.unwrap_or(Protocol::Http).as_str();
    Url::parse(&format!("{scheme}://{url}"))
        .map(|parsed| parsed.host_str().is_some_and(|host| !host.is_empty()))
        .unwrap_or(false)
}
