//! Per-request orchestration phases, traced against the request id.
//!
//! `Received → Verifying → (Rejected | Verified) → Persisting →
//! (Committed | Failed)`. Phases exist for observability only; no state is
//! stored between them.

use std::fmt;

/// Lifecycle phase of one manager request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestPhase {
    /// Request accepted for processing.
    Received,
    /// Payment authorization being verified.
    Verifying,
    /// Verification failed; nonce not burned.
    Rejected,
    /// Verification passed; nonce burned.
    Verified,
    /// Record write in flight.
    Persisting,
    /// Record durably written.
    Committed,
    /// Write failed after verification; nonce stays burned.
    Failed,
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Received => "received",
            Self::Verifying => "verifying",
            Self::Rejected => "rejected",
            Self::Verified => "verified",
            Self::Persisting => "persisting",
            Self::Committed => "committed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_lowercase() {
        assert_eq!(RequestPhase::Received.to_string(), "received");
        assert_eq!(RequestPhase::Committed.to_string(), "committed");
        assert_eq!(RequestPhase::Failed.to_string(), "failed");
    }
}
