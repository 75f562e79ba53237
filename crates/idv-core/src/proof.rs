//! Proof request and outcome shapes.
//!
//! The proof-compute service is opaque: requests carry a kind tag and
//! a JSON payload whose schema belongs to that service, not to this
//! core. Outcomes are the minimal `{ ok, reason }` shape every caller
//! can interpret without knowing the backend.

use serde::{Deserialize, Serialize};

use crate::error::FailureCode;

/// The intent behind a proof request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofRequestKind {
    /// Register the document commitment on the identity registry.
    Register,
    /// Validate the document signer certificate chain.
    Dsc,
    /// Disclose selected attributes to a verifier.
    Disclose,
}

impl ProofRequestKind {
    /// Canonical lowercase tag used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Register => "register",
            Self::Dsc => "dsc",
            Self::Disclose => "disclose",
        }
    }
}

impl std::fmt::Display for ProofRequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request handed to the proof backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProofRequest {
    /// Register, DSC validation, or disclosure.
    pub kind: ProofRequestKind,
    /// Opaque payload; its shape is defined by the proof-compute
    /// service.
    pub payload: serde_json::Value,
}

/// Terminal result of one proof attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutcome {
    /// Whether the proof was computed and accepted.
    pub ok: bool,
    /// Machine-readable reason code on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ProofOutcome {
    /// A successful outcome.
    pub fn success() -> Self {
        Self {
            ok: true,
            reason: None,
        }
    }

    /// A failed outcome carrying a stable reason code.
    pub fn failure(code: FailureCode) -> Self {
        Self {
            ok: false,
            reason: Some(code.as_str().to_string()),
        }
    }
}

/// Lifecycle status of a proof handle. Terminal once resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleStatus {
    /// Resolution has not arrived yet.
    Pending,
    /// Resolved with a successful outcome.
    Completed,
    /// Resolved with a failure (including cancellation and timeout).
    Failed,
}

impl HandleStatus {
    /// Canonical lowercase tag.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether no further transitions are possible.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
