//! Proving phases and the pure transition table.
//!
//! The machine in [`crate::machine`] drives capabilities; this module
//! holds only the lifecycle data: which phase the attempt is in, which
//! events are legal there, and where each one leads. The table is a
//! total function — an illegal pairing returns `None` rather than
//! panicking, and the caller decides whether that is a programming
//! error or a rejected request.

use serde::{Deserialize, Serialize};

/// Lifecycle phase of one proving attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvingPhase {
    /// Initialized, nothing started.
    Idle,
    /// Loading the document, protocol data and signing key.
    FetchingData,
    /// Request handed to the remote prover.
    GeneratingProof,
    /// The prover accepted the proof.
    Completed,
    /// The attempt ended without a proof. A caller-initiated retry
    /// re-enters `FetchingData`; nothing retries automatically.
    Failed,
}

impl ProvingPhase {
    /// Canonical snake_case tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingData => "fetching_data",
            Self::GeneratingProof => "generating_proof",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the attempt has ended.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for ProvingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Events that drive the proving lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvingEvent {
    /// Caller started the fetch stage.
    StartFetch,
    /// Document, protocol data and key are all in hand.
    FetchSucceeded,
    /// A fetch prerequisite failed (missing signer certificate,
    /// document load or protocol data failure).
    FetchError,
    /// The auth capability refused the signing key.
    AuthError,
    /// The prover accepted the proof.
    ProofSucceeded,
    /// The prover rejected the request or the connection died.
    ProofFailed,
    /// The attempt exceeded its time bound.
    Timeout,
    /// The caller aborted.
    Cancelled,
    /// Caller-initiated re-entry after a failure.
    Retry,
}

impl ProvingEvent {
    /// Canonical snake_case tag, for logs and rejection messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartFetch => "start_fetch",
            Self::FetchSucceeded => "fetch_succeeded",
            Self::FetchError => "fetch_error",
            Self::AuthError => "auth_error",
            Self::ProofSucceeded => "proof_succeeded",
            Self::ProofFailed => "proof_failed",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Retry => "retry",
        }
    }
}

impl std::fmt::Display for ProvingEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The transition table. `None` means `event` is not legal in `phase`.
pub fn transition(phase: ProvingPhase, event: ProvingEvent) -> Option<ProvingPhase> {
    use ProvingEvent as E;
    use ProvingPhase as P;
    match (phase, event) {
        (P::Idle, E::StartFetch) => Some(P::FetchingData),
        (P::Idle, _) => None,

        (P::FetchingData, E::FetchSucceeded) => Some(P::GeneratingProof),
        (P::FetchingData, E::FetchError) => Some(P::Failed),
        (P::FetchingData, E::AuthError) => Some(P::Failed),
        (P::FetchingData, E::Cancelled) => Some(P::Failed),
        (P::FetchingData, _) => None,

        (P::GeneratingProof, E::ProofSucceeded) => Some(P::Completed),
        (P::GeneratingProof, E::ProofFailed) => Some(P::Failed),
        (P::GeneratingProof, E::Timeout) => Some(P::Failed),
        (P::GeneratingProof, E::Cancelled) => Some(P::Failed),
        (P::GeneratingProof, _) => None,

        (P::Completed, _) => None,
        (P::Failed, E::Retry) => Some(P::FetchingData),
        (P::Failed, _) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ProvingEvent as E;
    use ProvingPhase as P;

    const ALL_PHASES: [ProvingPhase; 5] = [
        P::Idle,
        P::FetchingData,
        P::GeneratingProof,
        P::Completed,
        P::Failed,
    ];
    const ALL_EVENTS: [ProvingEvent; 9] = [
        E::StartFetch,
        E::FetchSucceeded,
        E::FetchError,
        E::AuthError,
        E::ProofSucceeded,
        E::ProofFailed,
        E::Timeout,
        E::Cancelled,
        E::Retry,
    ];

    #[test]
    fn happy_path() {
        let p = transition(P::Idle, E::StartFetch).unwrap();
        let p = transition(p, E::FetchSucceeded).unwrap();
        assert_eq!(p, P::GeneratingProof);
        assert_eq!(transition(p, E::ProofSucceeded), Some(P::Completed));
    }

    #[test]
    fn failures_land_in_failed() {
        for event in [E::FetchError, E::AuthError, E::Cancelled] {
            assert_eq!(transition(P::FetchingData, event), Some(P::Failed));
        }
        for event in [E::ProofFailed, E::Timeout, E::Cancelled] {
            assert_eq!(transition(P::GeneratingProof, event), Some(P::Failed));
        }
    }

    #[test]
    fn retry_is_the_only_exit_from_failed() {
        for event in ALL_EVENTS {
            let expected = (event == E::Retry).then_some(P::FetchingData);
            assert_eq!(transition(P::Failed, event), expected);
        }
    }

    #[test]
    fn completed_is_terminal_for_every_event() {
        for event in ALL_EVENTS {
            assert_eq!(transition(P::Completed, event), None);
        }
    }

    #[test]
    fn terminal_flag_matches_the_table() {
        for phase in ALL_PHASES {
            let reachable = ALL_EVENTS
                .iter()
                .any(|&e| transition(phase, e).is_some_and(|next| next != phase));
            // Completed has no exits at all; Failed only re-enters the
            // pipeline through an explicit retry.
            if phase == P::Completed {
                assert!(!reachable);
            }
            assert_eq!(
                phase.is_terminal(),
                matches!(phase, P::Completed | P::Failed)
            );
        }
    }

    #[test]
    fn phase_tags_are_stable() {
        assert_eq!(P::FetchingData.as_str(), "fetching_data");
        assert_eq!(P::GeneratingProof.as_str(), "generating_proof");
        assert_eq!(
            serde_json::to_string(&P::FetchingData).unwrap(),
            r#""fetching_data""#
        );
    }
}
