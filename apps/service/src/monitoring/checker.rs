use anyhow::Result;
use std::error::Error as StdError;
use std::io;
use std::time::Duration;

use super::types::{FailureReason, ProbeOutcome};
use crate::models::Check;

/// Sends one request for a check and reports what came back
#[async_trait::async_trait]
pub trait Prober: Send + Sync {
    /// Perform a single attempt; never retries
    async fn probe(&self, check: &Check) -> ProbeOutcome;
}

/// HTTP/HTTPS prober
///
/// Redirects are not followed: the status of the first response decides the
/// outcome.
pub struct HttpChecker {
    client: reqwest::Client,
}

impl HttpChecker {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .user_agent(concat!("uppe-checks/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Prober for HttpChecker {
    async fn probe(&self, check: &Check) -> ProbeOutcome {
        let response = self
            .client
            .request(check.method.into(), check.target_url())
            .timeout(Duration::from_secs(u64::from(check.timeout_seconds)))
            .send()
            .await;

        match response {
            Ok(response) => ProbeOutcome::success(response.status().as_u16()),
            Err(e) => {
                let reason = classify_error(&e);
                tracing::debug!(check_id = %check.id, %reason, "Probe failed: {}", error_chain(&e));
                ProbeOutcome::failure(reason)
            }
        }
    }
}

/// Map a request error onto the probe failure taxonomy
pub fn classify_error(error: &reqwest::Error) -> FailureReason {
    if error.is_timeout() {
        return FailureReason::Timeout;
    }

    let mut source: Option<&(dyn StdError + 'static)> = error.source();
    while let Some(cause) = source {
        if let Some(io_error) = cause.downcast_ref::<io::Error>() {
            match io_error.kind() {
                io::ErrorKind::ConnectionRefused => return FailureReason::ConnectionRefused,
                io::ErrorKind::TimedOut => return FailureReason::Timeout,
                _ => {}
            }
        }
        source = cause.source();
    }

    classify_message(&error_chain(error))
}

/// Fallback classification from the rendered error chain
fn classify_message(chain: &str) -> FailureReason {
    let chain = chain.to_ascii_lowercase();

    if chain.contains("connection refused") {
        FailureReason::ConnectionRefused
    } else if chain.contains("dns error")
        || chain.contains("failed to lookup address")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
    {
        FailureReason::DnsError
    } else if chain.contains("certificate")
        || chain.contains("tls")
        || chain.contains("ssl")
        || chain.contains("handshake")
    {
        FailureReason::TlsError
    } else if chain.contains("timed out") {
        FailureReason::Timeout
    } else {
        FailureReason::TransportError
    }
}

fn error_chain(error: &reqwest::Error) -> String {
    let mut rendered = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
