use async_trait::async_trait;

use super::{AlertDispatcher, DispatchError, prepare_message};

/// Writes alerts to the log instead of delivering them
///
/// Default provider when no SMS credentials are configured.
#[derive(Debug, Default)]
pub struct LogDispatcher;

#[async_trait]
impl AlertDispatcher for LogDispatcher {
    async fn send(&self, contact: &str, message: &str) -> Result<(), DispatchError> {
        let message = prepare_message(message)?;
        tracing::warn!(contact = %contact, "{}", message);
        Ok(())
    }
}
