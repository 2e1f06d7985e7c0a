use async_trait::async_trait;
use thiserror::Error;

use crate::models::Check;
use crate::monitoring::types::CheckState;

pub mod log;
pub mod twilio;

pub use log::LogDispatcher;
pub use twilio::TwilioSms;

/// Longest message body accepted for delivery
pub const MAX_MESSAGE_LEN: usize = 1600;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid alert contact: {0}")]
    InvalidContact(String),
    #[error("Invalid alert message: {0}")]
    InvalidMessage(String),
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Provider rejected alert with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Alert delivery timed out after {0:?}")]
    Timeout(std::time::Duration),
}

/// Delivers state change alerts to a check owner
///
/// Delivery is best-effort: callers log a failure and move on, there is no
/// retry here.
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn send(&self, contact: &str, message: &str) -> Result<(), DispatchError>;
}

/// Text sent when a check changes state
pub fn alert_message(check: &Check, state: CheckState) -> String {
    format!("Alert: your check for {} is currently {}", check.describe(), state)
}

/// Trim a message and enforce the provider's length limits
pub(crate) fn prepare_message(message: &str) -> Result<&str, DispatchError> {
    let message = message.trim();
    if message.is_empty() {
        return Err(DispatchError::InvalidMessage("message is empty".to_string()));
    }
    if message.chars().count() > MAX_MESSAGE_LEN {
        return Err(DispatchError::InvalidMessage(format!(
            "message longer than {MAX_MESSAGE_LEN} characters"
        )));
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{HttpMethod, Protocol};

    #[test]
    fn test_alert_message_names_url_and_state() {
        let check = Check::new(
            "5551234567",
            Protocol::Https,
            "example.com/health",
            HttpMethod::Get,
            vec![200],
            2,
        )
        .unwrap();

        let message = alert_message(&check, CheckState::Down);
        assert_eq!(message, "Alert: your check for GET https://example.com/health is currently DOWN");
        assert!(alert_message(&check, CheckState::Up).ends_with("UP"));
    }

    #[test]
    fn test_prepare_message() {
        assert_eq!(prepare_message("  hello ").unwrap(), "hello");
        assert!(matches!(prepare_message("   "), Err(DispatchError::InvalidMessage(_))));
        assert!(prepare_message(&"x".repeat(MAX_MESSAGE_LEN)).is_ok());
        assert!(prepare_message(&"x".repeat(MAX_MESSAGE_LEN + 1)).is_err());
    }
}
