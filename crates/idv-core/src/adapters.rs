//! Capability adapter contracts.
//!
//! Every platform-specific concern — camera/NFC scanning, key storage
//! behind biometrics, HTTP and websocket transport, document
//! persistence, analytics — sits behind one of these traits. The core
//! defines signatures and error semantics only; implementations live
//! in the host application. All traits are object-safe and
//! `Send + Sync` so a provided instance can be shared across async
//! tasks behind an `Arc`.
//!
//! A required capability that is absent fails client construction,
//! never a later call.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cancel::CancellationToken;
use crate::document::{DocumentCatalog, DocumentData};
use crate::error::CapabilityError;
use crate::scan::{RawScan, ScanOpts};

// ---------------------------------------------------------------------------
// Key material
// ---------------------------------------------------------------------------

/// Hex-encoded signing key handed out by the auth capability.
///
/// The buffer is zeroized on drop and the `Debug` form is redacted.
/// This key is used only for identity-registry operations, never for
/// general-purpose signing.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKeyHex(String);

impl PrivateKeyHex {
    /// Wrap a hex string, rejecting empty or non-hex input.
    pub fn new(hex_key: impl Into<String>) -> Result<Self, CapabilityError> {
        let hex_key = hex_key.into();
        if hex_key.is_empty() || hex::decode(&hex_key).is_err() {
            return Err(CapabilityError::Crypto {
                reason: "private key must be non-empty hex".into(),
            });
        }
        Ok(Self(hex_key))
    }

    /// Expose the hex string. Callers must not persist it.
    pub fn reveal(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for PrivateKeyHex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PrivateKeyHex(redacted)")
    }
}

// ---------------------------------------------------------------------------
// Capability traits
// ---------------------------------------------------------------------------

/// Document scanner (camera MRZ, NFC chip session, QR).
#[async_trait]
pub trait ScannerAdapter: Send + Sync {
    /// Run one scanner session and return the driver's raw payload.
    /// Must settle with an error when `cancel` fires mid-session.
    async fn scan(
        &self,
        opts: &ScanOpts,
        cancel: &CancellationToken,
    ) -> Result<RawScan, CapabilityError>;
}

/// Cryptographic primitives provided by the platform.
#[async_trait]
pub trait CryptoAdapter: Send + Sync {
    /// SHA-256 digest of `input`.
    async fn hash(&self, input: &[u8]) -> Result<Vec<u8>, CapabilityError>;

    /// Sign `data` with the key named by `key_ref`.
    async fn sign(&self, data: &[u8], key_ref: &str) -> Result<Vec<u8>, CapabilityError>;
}

/// HTTP transport.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    /// GET `url`, expecting a JSON body.
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, CapabilityError>;

    /// POST a JSON body to `url`, expecting a JSON response.
    async fn post_json(
        &self,
        url: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError>;
}

/// Event from an open websocket connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WsEvent {
    /// A text frame arrived.
    Message(String),
    /// The transport reported an error; the connection may be dead.
    Error(String),
    /// The peer closed the connection.
    Closed,
}

/// One open websocket connection.
#[async_trait]
pub trait WsConn: Send {
    /// Send a text frame.
    async fn send(&mut self, data: &str) -> Result<(), CapabilityError>;

    /// Await the next event. `None` after [`WsEvent::Closed`] has been
    /// delivered or [`WsConn::close`] was called.
    async fn recv(&mut self) -> Option<WsEvent>;

    /// Close the connection. Idempotent.
    async fn close(&mut self);
}

/// Websocket transport.
#[async_trait]
pub trait WsAdapter: Send + Sync {
    /// Open a connection to `url`.
    async fn connect(&self, url: &str) -> Result<Box<dyn WsConn>, CapabilityError>;
}

/// The network capability bundles the two transports.
#[derive(Clone)]
pub struct NetworkCapability {
    /// HTTP transport.
    pub http: Arc<dyn HttpAdapter>,
    /// Websocket transport.
    pub ws: Arc<dyn WsAdapter>,
}

/// Secure key storage, gated by platform biometrics.
///
/// Fetching the key may prompt the user; a refusal surfaces as
/// [`CapabilityError::PermissionDenied`], an unusable sensor as
/// [`CapabilityError::BiometricUnavailable`].
#[async_trait]
pub trait AuthAdapter: Send + Sync {
    /// The hex-encoded signing key, or `None` when no key has been
    /// provisioned yet.
    async fn private_key(&self) -> Result<Option<PrivateKeyHex>, CapabilityError>;
}

/// Persisted document catalog and document data.
#[async_trait]
pub trait DocumentsAdapter: Send + Sync {
    /// Load the catalog. An empty catalog is not an error.
    async fn load_catalog(&self) -> Result<DocumentCatalog, CapabilityError>;

    /// Load one document by catalog id.
    async fn load_document(&self, id: &str) -> Result<Option<DocumentData>, CapabilityError>;

    /// Persist the catalog.
    async fn save_catalog(&self, catalog: &DocumentCatalog) -> Result<(), CapabilityError>;
}

/// Generic key-value storage.
#[async_trait]
pub trait StorageAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CapabilityError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), CapabilityError>;
    async fn remove(&self, key: &str) -> Result<(), CapabilityError>;
}

/// Telemetry sink. Fire-and-forget; implementations must not block.
pub trait AnalyticsAdapter: Send + Sync {
    /// Record a named event with a JSON payload.
    fn track_event(&self, event: &str, params: serde_json::Value);
}

/// Time source. Injected so throttling and timeouts are testable.
#[async_trait]
pub trait ClockAdapter: Send + Sync {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;

    /// Sleep for `ms`, returning early (without error) when `cancel`
    /// fires.
    async fn sleep(&self, ms: u64, cancel: &CancellationToken);
}

/// Wall-clock implementation of [`ClockAdapter`] on the tokio timer.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl ClockAdapter for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }

    async fn sleep(&self, ms: u64, cancel: &CancellationToken) {
        tokio::select! {
            _ = tokio::time::sleep(std::time::Duration::from_millis(ms)) => {}
            _ = cancel.cancelled() => {}
        }
    }
}
