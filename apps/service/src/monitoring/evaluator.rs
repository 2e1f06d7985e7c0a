use super::types::{CheckState, ProbeOutcome};

/// Classify a probe outcome against a check's acceptable status codes
///
/// A response is UP only when its status is listed; any failure to get a
/// response is DOWN.
pub fn evaluate(outcome: &ProbeOutcome, acceptable_codes: &[u16]) -> CheckState {
    match outcome {
        ProbeOutcome::Success { status_code } if acceptable_codes.contains(status_code) => {
            CheckState::Up
        }
        ProbeOutcome::Success { .. } | ProbeOutcome::Failure { .. } => CheckState::Down,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::types::FailureReason;

    #[test]
    fn test_listed_code_is_up() {
        assert_eq!(evaluate(&ProbeOutcome::success(200), &[200, 201]), CheckState::Up);
        assert_eq!(evaluate(&ProbeOutcome::success(201), &[200, 201]), CheckState::Up);
    }

    #[test]
    fn test_unlisted_code_is_down() {
        assert_eq!(evaluate(&ProbeOutcome::success(500), &[200, 201]), CheckState::Down);
        assert_eq!(evaluate(&ProbeOutcome::success(200), &[301]), CheckState::Down);
    }

    #[test]
    fn test_failures_are_down() {
        for reason in [
            FailureReason::Timeout,
            FailureReason::ConnectionRefused,
            FailureReason::DnsError,
            FailureReason::TlsError,
            FailureReason::TransportError,
        ] {
            assert_eq!(evaluate(&ProbeOutcome::failure(reason), &[200]), CheckState::Down);
        }
    }
}
