use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Persisted UP/DOWN classification of a check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckState {
    Up,
    #[default]
    Down,
}

impl CheckState {
    /// Lowercase form used in stored records
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckState::Up => "up",
            CheckState::Down => "down",
        }
    }

    pub fn from_name(raw: &str) -> Option<Self> {
        match raw.trim() {
            "up" => Some(CheckState::Up),
            "down" => Some(CheckState::Down),
            _ => None,
        }
    }
}

impl std::fmt::Display for CheckState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckState::Up => write!(f, "UP"),
            CheckState::Down => write!(f, "DOWN"),
        }
    }
}

/// Why a probe did not produce an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureReason {
    Timeout,
    ConnectionRefused,
    DnsError,
    TlsError,
    TransportError,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FailureReason::Timeout => "timeout",
            FailureReason::ConnectionRefused => "connection-refused",
            FailureReason::DnsError => "dns-error",
            FailureReason::TlsError => "tls-error",
            FailureReason::TransportError => "transport-error",
        };
        f.write_str(name)
    }
}

/// Outcome of a single probe attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeOutcome {
    Success { status_code: u16 },
    Failure { reason: FailureReason },
}

impl ProbeOutcome {
    pub fn success(status_code: u16) -> Self {
        ProbeOutcome::Success { status_code }
    }

    pub fn failure(reason: FailureReason) -> Self {
        ProbeOutcome::Failure { reason }
    }
}

impl std::fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeOutcome::Success { status_code } => write!(f, "status {status_code}"),
            ProbeOutcome::Failure { reason } => write!(f, "failure ({reason})"),
        }
    }
}

/// Result of executing one probe for one check
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Id of the check that was probed
    pub check_id: String,

    /// What the endpoint answered, or why it did not
    pub outcome: ProbeOutcome,

    /// Wall time spent on the attempt
    pub latency_ms: u64,

    /// When the attempt finished
    pub checked_at: DateTime<Utc>,
}

/// Movement of a check between its previous persisted state and a fresh
/// evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Never probed before; the result becomes the baseline
    FirstCheck(CheckState),
    /// Same state as last time
    Steady(CheckState),
    /// The state flipped
    Changed { from: CheckState, to: CheckState },
}

impl Transition {
    pub fn between(previous: Option<CheckState>, next: CheckState) -> Self {
        match previous {
            None => Transition::FirstCheck(next),
            Some(prev) if prev == next => Transition::Steady(next),
            Some(prev) => Transition::Changed { from: prev, to: next },
        }
    }

    /// State to persist after this transition
    pub fn next_state(&self) -> CheckState {
        match *self {
            Transition::FirstCheck(state) | Transition::Steady(state) => state,
            Transition::Changed { to, .. } => to,
        }
    }

    pub fn requires_alert(&self) -> bool {
        matches!(self, Transition::Changed { .. })
    }
}
