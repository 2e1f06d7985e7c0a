use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

use super::{AlertDispatcher, DispatchError, prepare_message};
use crate::config::TwilioConfig;
use crate::validation::is_valid_phone;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// SMS alerts through the Twilio Messages API
pub struct TwilioSms {
    client: Client,
    config: TwilioConfig,
}

impl TwilioSms {
    pub fn new(config: TwilioConfig) -> Result<Self, DispatchError> {
        Self::with_request_timeout(config, REQUEST_TIMEOUT)
    }

    /// Build with a custom bound on one provider call
    pub fn with_request_timeout(config: TwilioConfig, request_timeout: Duration) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(request_timeout))
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid
        )
    }
}

#[async_trait]
impl AlertDispatcher for TwilioSms {
    async fn send(&self, contact: &str, message: &str) -> Result<(), DispatchError> {
        if !is_valid_phone(contact) {
            return Err(DispatchError::InvalidContact(contact.to_string()));
        }
        let body = prepare_message(message)?;
        let to = format!("{}{}", self.config.country_code, contact.trim());

        let form = [("From", self.config.from_phone.as_str()), ("To", to.as_str()), ("Body", body)];

        let response = self
            .client
            .post(self.messages_url())
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .form(&form)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 && status != 201 {
            let body = response.text().await.unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(DispatchError::Rejected { status, body });
        }

        tracing::debug!(to = %to, "SMS alert accepted by provider");
        Ok(())
    }
}
