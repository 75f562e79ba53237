//! Persisted proof-history record shapes.
//!
//! The record layout is fixed: every reader and writer preserves all
//! twelve fields across round-trips, and the wire/storage names use
//! the camelCase spelling the mobile clients persisted from day one.

use serde::{Deserialize, Serialize};

/// Lifecycle status of a persisted proof session.
///
/// `Pending` is the only non-terminal state. Once a session reaches
/// `Success` or `Failure` it never changes again — the first terminal
/// status wins, and resurrection to `Pending` is impossible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProofStatus {
    /// Awaiting a verdict from the relay.
    Pending,
    /// Proof generated and verified.
    Success,
    /// Proof generation or verification failed.
    Failure,
}

impl ProofStatus {
    /// Stable persisted tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Whether the session can never change status again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Failure)
    }

    /// Map a relay status code onto a terminal status. Code 3 is a
    /// generation failure, 4 a verified proof, 5 a verification
    /// failure; anything else is not a verdict.
    pub fn from_relay_code(code: u64) -> Option<Self> {
        match code {
            3 | 5 => Some(Self::Failure),
            4 => Some(Self::Success),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProofStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One persisted proof session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofHistoryEntry {
    /// Storage-assigned identifier.
    pub id: String,
    /// Proof session id, the relay's subscription key.
    pub session_id: String,
    /// Requesting application's display name.
    pub app_name: String,
    /// Verifier endpoint type (`https`, `celo`, ...).
    pub endpoint_type: String,
    /// Session status.
    pub status: ProofStatus,
    /// Machine-readable failure code, for failed sessions.
    pub error_code: Option<String>,
    /// Human-readable failure detail.
    pub error_reason: Option<String>,
    /// Insertion time, milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// JSON-encoded disclosure selection.
    pub disclosures: String,
    /// Requesting application's logo, base64.
    pub logo_base64: Option<String>,
    /// Identifier disclosed to the verifier.
    pub user_id: String,
    /// Kind of identifier (`uuid`, `hex`).
    pub user_id_type: String,
}

/// Fields the caller supplies for a new entry; id and timestamp are
/// assigned at insertion, status starts `PENDING`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProofHistoryEntry {
    pub session_id: String,
    pub app_name: String,
    pub endpoint_type: String,
    pub disclosures: String,
    pub logo_base64: Option<String>,
    pub user_id: String,
    pub user_id_type: String,
}
