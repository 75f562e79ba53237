//! Error taxonomy shared by every layer of the pipeline.
//!
//! Three families exist, and they never blur:
//!
//! - [`CapabilityError`]: a platform adapter (network, crypto, auth,
//!   storage, scanner) failed. Surfaced to the caller unchanged; the
//!   caller decides whether to retry.
//! - `MrzParseError` (in `idv-mrz`): malformed input, always local,
//!   never retried.
//! - [`FailureCode`]: the machine-readable reason attached to every
//!   terminal proof failure, distinct from any human-readable message
//!   so UI and analytics can classify failures without string matching.

use serde::{Deserialize, Serialize};

/// Failure of a platform capability during an adapter call.
///
/// Variants carry structured context; the capability name identifies
/// which adapter failed without the caller inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum CapabilityError {
    /// The user or platform refused access (secure enclave, keychain).
    #[error("permission denied")]
    PermissionDenied,
    /// Biometric confirmation is required but unavailable on this device.
    #[error("biometric authentication unavailable")]
    BiometricUnavailable,
    /// Network transport failure (HTTP or websocket).
    #[error("transport failure for {endpoint}: {reason}")]
    Transport {
        /// The endpoint or URL involved.
        endpoint: String,
        /// Diagnostic detail from the adapter.
        reason: String,
    },
    /// The scanner driver reported an error.
    #[error("scanner error {code}: {reason}")]
    Scanner {
        /// Driver-defined error code.
        code: String,
        /// Diagnostic detail.
        reason: String,
    },
    /// Persistent storage failed.
    #[error("storage failure during {operation}: {reason}")]
    Storage {
        /// The storage operation that failed.
        operation: String,
        /// Diagnostic detail.
        reason: String,
    },
    /// A cryptographic primitive failed or was given invalid material.
    #[error("crypto failure: {reason}")]
    Crypto {
        /// Diagnostic detail.
        reason: String,
    },
    /// The capability exists but cannot serve requests right now.
    #[error("{capability} unavailable: {reason}")]
    Unavailable {
        /// Capability name (`scanner`, `network`, ...).
        capability: &'static str,
        /// Diagnostic detail.
        reason: String,
    },
}

/// Machine-readable reason code carried by every terminal failure.
///
/// Codes are stable wire/analytics identifiers — renaming a variant
/// must not change its `as_str` value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureCode {
    /// Prerequisite data could not be fetched (missing signer-cert
    /// metadata, protocol data retrieval failure).
    FetchError,
    /// The auth capability denied the signing key.
    AuthError,
    /// Proof generation exceeded its time bound.
    ProofTimeout,
    /// The remote prover rejected or failed the request.
    ProofFailed,
    /// The caller aborted via the cancellation token.
    UserCancelled,
    /// The proof backend is a stub; no proof was attempted.
    ProofStub,
    /// A pending history entry outlived the staleness bound.
    ProofExpired,
}

impl FailureCode {
    /// Stable string code for wire formats, persisted records and
    /// analytics events.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchError => "FETCH_ERROR",
            Self::AuthError => "AUTH_ERROR",
            Self::ProofTimeout => "PROOF_TIMEOUT",
            Self::ProofFailed => "PROOF_FAILED",
            Self::UserCancelled => "USER_CANCELLED",
            Self::ProofStub => "SELF_ERR_PROOF_STUB",
            Self::ProofExpired => "PROOF_EXPIRED",
        }
    }

    /// Whether a UI should present this as an error. Cancellation is
    /// terminal but deliberate, so it is excluded.
    pub fn is_user_facing_error(&self) -> bool {
        !matches!(self, Self::UserCancelled)
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
