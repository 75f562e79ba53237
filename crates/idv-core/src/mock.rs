//! Mock capability implementations for development and testing.
//!
//! Deterministic, in-memory stand-ins for every adapter trait. The
//! client, proving and history crates exercise their logic against
//! these; host applications can also wire them up for simulator
//! builds. None of them performs real I/O.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::adapters::{
    AnalyticsAdapter, AuthAdapter, ClockAdapter, CryptoAdapter, DocumentsAdapter, HttpAdapter,
    PrivateKeyHex, ScannerAdapter, StorageAdapter, WsAdapter, WsConn, WsEvent,
};
use crate::cancel::CancellationToken;
use crate::document::{DocumentCatalog, DocumentData, DocumentMetadata};
use crate::error::CapabilityError;
use crate::scan::{RawScan, ScanOpts};

// ─── Scanner ─────────────────────────────────────────────────────────────

/// Scanner returning a fixed payload for every session.
pub struct MockScanner {
    payload: RawScan,
}

impl MockScanner {
    /// Return `payload` from every scan.
    pub fn returning(payload: RawScan) -> Self {
        Self { payload }
    }
}

#[async_trait]
impl ScannerAdapter for MockScanner {
    async fn scan(
        &self,
        _opts: &ScanOpts,
        cancel: &CancellationToken,
    ) -> Result<RawScan, CapabilityError> {
        if cancel.is_cancelled() {
            return Err(CapabilityError::Scanner {
                code: "CANCELLED".into(),
                reason: "scan cancelled".into(),
            });
        }
        Ok(self.payload.clone())
    }
}

// ─── Crypto ──────────────────────────────────────────────────────────────

/// Crypto adapter with deterministic, non-cryptographic output.
#[derive(Debug, Default)]
pub struct MockCrypto;

#[async_trait]
impl CryptoAdapter for MockCrypto {
    async fn hash(&self, input: &[u8]) -> Result<Vec<u8>, CapabilityError> {
        // Stable and collision-prone; fine for wiring tests.
        Ok(input.iter().rev().copied().collect())
    }

    async fn sign(&self, data: &[u8], key_ref: &str) -> Result<Vec<u8>, CapabilityError> {
        let mut out = key_ref.as_bytes().to_vec();
        out.extend_from_slice(data);
        Ok(out)
    }
}

// ─── HTTP ────────────────────────────────────────────────────────────────

/// HTTP adapter answering every request with one canned JSON value,
/// recording the URLs it was called with.
pub struct MockHttp {
    response: Result<serde_json::Value, String>,
    calls: Mutex<Vec<String>>,
}

impl MockHttp {
    /// Answer every request with `response`.
    pub fn with_response(response: serde_json::Value) -> Self {
        Self {
            response: Ok(response),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Fail every request with a transport error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            response: Err(reason.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// URLs requested so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn answer(&self, url: &str) -> Result<serde_json::Value, CapabilityError> {
        self.calls.lock().push(url.to_string());
        match &self.response {
            Ok(value) => Ok(value.clone()),
            Err(reason) => Err(CapabilityError::Transport {
                endpoint: url.to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

#[async_trait]
impl HttpAdapter for MockHttp {
    async fn get_json(&self, url: &str) -> Result<serde_json::Value, CapabilityError> {
        self.answer(url)
    }

    async fn post_json(
        &self,
        url: &str,
        _body: &serde_json::Value,
    ) -> Result<serde_json::Value, CapabilityError> {
        self.answer(url)
    }
}

// ─── Websocket ───────────────────────────────────────────────────────────

/// Shared recording of frames sent over scripted connections.
#[derive(Clone, Default)]
pub struct SentFrames(Arc<Mutex<Vec<String>>>);

impl SentFrames {
    /// Frames sent so far, in order.
    pub fn frames(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Websocket adapter producing scripted connections: each `connect`
/// yields the same inbound event sequence and records outbound frames.
pub struct MockWs {
    script: Vec<WsEvent>,
    sent: SentFrames,
    connects: AtomicUsize,
}

impl MockWs {
    /// Every connection will deliver `script` in order, then return
    /// `None` from `recv`.
    pub fn scripted(script: Vec<WsEvent>) -> Self {
        Self {
            script,
            sent: SentFrames::default(),
            connects: AtomicUsize::new(0),
        }
    }

    /// How many connections have been opened.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Handle on the outbound frame recording.
    pub fn sent(&self) -> SentFrames {
        self.sent.clone()
    }
}

#[async_trait]
impl WsAdapter for MockWs {
    async fn connect(&self, _url: &str) -> Result<Box<dyn WsConn>, CapabilityError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConn {
            script: self.script.clone().into_iter().collect(),
            sent: self.sent.clone(),
            closed: false,
        }))
    }
}

struct ScriptedConn {
    script: std::collections::VecDeque<WsEvent>,
    sent: SentFrames,
    closed: bool,
}

#[async_trait]
impl WsConn for ScriptedConn {
    async fn send(&mut self, data: &str) -> Result<(), CapabilityError> {
        if self.closed {
            return Err(CapabilityError::Transport {
                endpoint: "mock-ws".into(),
                reason: "send on closed connection".into(),
            });
        }
        self.sent.0.lock().push(data.to_string());
        Ok(())
    }

    async fn recv(&mut self) -> Option<WsEvent> {
        if self.closed {
            return None;
        }
        self.script.pop_front()
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

// ─── Auth ────────────────────────────────────────────────────────────────

/// Auth adapter with a scripted key outcome.
pub struct MockAuth {
    outcome: AuthOutcome,
}

enum AuthOutcome {
    Key(String),
    Absent,
    Denied,
    BiometricUnavailable,
}

impl MockAuth {
    /// Yield the given hex key.
    pub fn with_key(hex_key: impl Into<String>) -> Self {
        Self {
            outcome: AuthOutcome::Key(hex_key.into()),
        }
    }

    /// No key provisioned.
    pub fn absent() -> Self {
        Self {
            outcome: AuthOutcome::Absent,
        }
    }

    /// The user refused the biometric prompt.
    pub fn denied() -> Self {
        Self {
            outcome: AuthOutcome::Denied,
        }
    }

    /// No usable biometric sensor.
    pub fn biometric_unavailable() -> Self {
        Self {
            outcome: AuthOutcome::BiometricUnavailable,
        }
    }
}

#[async_trait]
impl AuthAdapter for MockAuth {
    async fn private_key(&self) -> Result<Option<PrivateKeyHex>, CapabilityError> {
        match &self.outcome {
            AuthOutcome::Key(hex_key) => Ok(Some(PrivateKeyHex::new(hex_key.clone())?)),
            AuthOutcome::Absent => Ok(None),
            AuthOutcome::Denied => Err(CapabilityError::PermissionDenied),
            AuthOutcome::BiometricUnavailable => Err(CapabilityError::BiometricUnavailable),
        }
    }
}

// ─── Documents ───────────────────────────────────────────────────────────

/// In-memory documents capability.
pub struct MockDocuments {
    state: Mutex<DocumentsState>,
}

struct DocumentsState {
    catalog: DocumentCatalog,
    documents: HashMap<String, DocumentData>,
}

impl MockDocuments {
    /// An empty catalog.
    pub fn empty() -> Self {
        Self {
            state: Mutex::new(DocumentsState {
                catalog: DocumentCatalog::default(),
                documents: HashMap::new(),
            }),
        }
    }

    /// A catalog holding `document`, selected.
    pub fn with_selected(document: DocumentData) -> Self {
        let store = Self::empty();
        store.insert(document, true);
        store
    }

    /// Add a document; optionally select it.
    pub fn insert(&self, document: DocumentData, select: bool) {
        let mut state = self.state.lock();
        state.catalog.documents.push(DocumentMetadata {
            id: document.id.clone(),
            category: document.category,
            mock: document.mock,
            registered: false,
        });
        if select {
            state.catalog.selected = Some(document.id.clone());
        }
        state.documents.insert(document.id.clone(), document);
    }
}

#[async_trait]
impl DocumentsAdapter for MockDocuments {
    async fn load_catalog(&self) -> Result<DocumentCatalog, CapabilityError> {
        Ok(self.state.lock().catalog.clone())
    }

    async fn load_document(&self, id: &str) -> Result<Option<DocumentData>, CapabilityError> {
        Ok(self.state.lock().documents.get(id).cloned())
    }

    async fn save_catalog(&self, catalog: &DocumentCatalog) -> Result<(), CapabilityError> {
        self.state.lock().catalog = catalog.clone();
        Ok(())
    }
}

// ─── Storage / analytics / clock ─────────────────────────────────────────

/// In-memory key-value storage.
#[derive(Default)]
pub struct MemoryStorage {
    map: Mutex<HashMap<String, String>>,
}

#[async_trait]
impl StorageAdapter for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, CapabilityError> {
        Ok(self.map.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CapabilityError> {
        self.map.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CapabilityError> {
        self.map.lock().remove(key);
        Ok(())
    }
}

/// Analytics sink recording events in memory.
#[derive(Default)]
pub struct MockAnalytics {
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl MockAnalytics {
    /// Events recorded so far, in order.
    pub fn events(&self) -> Vec<(String, serde_json::Value)> {
        self.events.lock().clone()
    }
}

impl AnalyticsAdapter for MockAnalytics {
    fn track_event(&self, event: &str, params: serde_json::Value) {
        self.events.lock().push((event.to_string(), params));
    }
}

/// Manually-advanced clock. `sleep` returns immediately so tests never
/// park on the timer.
#[derive(Default)]
pub struct TestClock {
    now: Mutex<u64>,
}

impl TestClock {
    /// A clock starting at `now` milliseconds.
    pub fn at(now: u64) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Advance the clock.
    pub fn advance(&self, ms: u64) {
        *self.now.lock() += ms;
    }
}

#[async_trait]
impl ClockAdapter for TestClock {
    fn now_millis(&self) -> u64 {
        *self.now.lock()
    }

    async fn sleep(&self, _ms: u64, _cancel: &CancellationToken) {}
}
