//! Client factory and façade.
//!
//! [`create_client`] validates the provided capability set once, fails
//! closed on the first missing required capability, and returns a
//! cheaply-cloneable [`Client`] combining scan, validate, register,
//! prove and event operations. Capability errors raised inside façade
//! calls propagate to the caller unmodified; MRZ parse failures are a
//! distinct, typed error.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use idv_core::adapters::{
    AnalyticsAdapter, AuthAdapter, ClockAdapter, CryptoAdapter, DocumentsAdapter, NetworkCapability,
    PrivateKeyHex, ScannerAdapter, StorageAdapter, SystemClock,
};
use idv_core::cancel::CancellationToken;
use idv_core::config::Config;
use idv_core::document::{DocumentCatalog, DocumentData, UNKNOWN};
use idv_core::error::{CapabilityError, FailureCode};
use idv_core::proof::{ProofOutcome, ProofRequest};
use idv_core::scan::{ScanOpts, ScanResult};
use idv_mrz::{extract_mrz_info, MrzInfo, MrzParseError};

use crate::events::{EventBus, EventKind, EventPayload, Unsubscribe};
use crate::handle::ProofHandle;
use crate::normalize::normalize_scan;

// ---------------------------------------------------------------------------
// Construction
// ---------------------------------------------------------------------------

/// The capability set handed to [`create_client`].
///
/// `scanner`, `network`, `crypto`, `auth` and `documents` are required;
/// the rest are optional. Presence is validated once at construction.
#[derive(Default)]
pub struct AdapterSet {
    pub scanner: Option<Arc<dyn ScannerAdapter>>,
    pub network: Option<NetworkCapability>,
    pub crypto: Option<Arc<dyn CryptoAdapter>>,
    pub auth: Option<Arc<dyn AuthAdapter>>,
    pub documents: Option<Arc<dyn DocumentsAdapter>>,
    pub storage: Option<Arc<dyn StorageAdapter>>,
    pub analytics: Option<Arc<dyn AnalyticsAdapter>>,
    pub clock: Option<Arc<dyn ClockAdapter>>,
}

/// Construction-time failure: a required capability is absent.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClientBuildError {
    /// Named required capability was not provided.
    #[error("{name} adapter not provided")]
    AdapterMissing {
        /// Capability name, in the fixed priority order.
        name: &'static str,
    },
}

/// Façade-call failure: either local validation or a capability error.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Malformed MRZ or scan payload. Local, never retried.
    #[error(transparent)]
    Parse(#[from] MrzParseError),
    /// A capability failed; surfaced unchanged.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Outcome of [`Client::validate_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the scan is acceptable for registration.
    pub ok: bool,
    /// Reason code when not.
    pub reason: Option<String>,
}

/// Outcome of registration queries and submissions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationStatus {
    /// Whether the document is registered.
    pub registered: bool,
    /// Reason code when the answer is negative or unavailable.
    pub reason: Option<String>,
}

/// Options for [`Client::generate_proof`].
#[derive(Default)]
pub struct ProofOptions {
    /// Overall bound in milliseconds; defaults to the configured
    /// `proof_ms`.
    pub timeout_ms: Option<u64>,
    /// Caller-owned cancellation token; a fresh one is created when
    /// absent.
    pub cancel: Option<CancellationToken>,
}

struct ClientInner {
    config: Config,
    scanner: Arc<dyn ScannerAdapter>,
    network: NetworkCapability,
    crypto: Arc<dyn CryptoAdapter>,
    auth: Arc<dyn AuthAdapter>,
    documents: Arc<dyn DocumentsAdapter>,
    storage: Option<Arc<dyn StorageAdapter>>,
    analytics: Option<Arc<dyn AnalyticsAdapter>>,
    clock: Arc<dyn ClockAdapter>,
    events: EventBus,
}

/// The client façade. Cheap to clone; clones share capabilities and
/// the event bus.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").finish_non_exhaustive()
    }
}

/// Validate the capability set and construct the client façade.
///
/// Required capabilities are checked in a fixed priority order —
/// scanner, network, crypto, auth, documents — and the first missing
/// one determines the error.
pub fn create_client(config: Config, adapters: AdapterSet) -> Result<Client, ClientBuildError> {
    let missing = |name| ClientBuildError::AdapterMissing { name };
    let scanner = adapters.scanner.ok_or(missing("scanner"))?;
    let network = adapters.network.ok_or(missing("network"))?;
    let crypto = adapters.crypto.ok_or(missing("crypto"))?;
    let auth = adapters.auth.ok_or(missing("auth"))?;
    let documents = adapters.documents.ok_or(missing("documents"))?;

    Ok(Client {
        inner: Arc::new(ClientInner {
            config,
            scanner,
            network,
            crypto,
            auth,
            documents,
            storage: adapters.storage,
            analytics: adapters.analytics,
            clock: adapters.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            events: EventBus::new(),
        }),
    })
}

// ---------------------------------------------------------------------------
// Façade
// ---------------------------------------------------------------------------

impl Client {
    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The network capability, for the proving and history layers.
    pub fn network(&self) -> &NetworkCapability {
        &self.inner.network
    }

    /// The documents capability.
    pub fn documents(&self) -> &Arc<dyn DocumentsAdapter> {
        &self.inner.documents
    }

    /// The crypto capability.
    pub fn crypto(&self) -> &Arc<dyn CryptoAdapter> {
        &self.inner.crypto
    }

    /// The auth capability.
    pub fn auth(&self) -> &Arc<dyn AuthAdapter> {
        &self.inner.auth
    }

    /// The injected clock (system clock when none was provided).
    pub fn clock(&self) -> &Arc<dyn ClockAdapter> {
        &self.inner.clock
    }

    /// The optional key-value storage capability.
    pub fn storage(&self) -> Option<&Arc<dyn StorageAdapter>> {
        self.inner.storage.as_ref()
    }

    // -- events -------------------------------------------------------------

    /// Subscribe to an event kind. The returned handle revokes the
    /// subscription; revocation is idempotent.
    pub fn on(
        &self,
        kind: EventKind,
        callback: impl Fn(&EventPayload) + Send + Sync + 'static,
    ) -> Unsubscribe {
        self.inner.events.on(kind, callback)
    }

    /// Emit an event to all current subscribers, synchronously, in
    /// registration order.
    pub fn emit(&self, payload: &EventPayload) {
        self.inner.events.emit(payload);
    }

    // -- scanning and validation --------------------------------------------

    /// Parse and validate raw MRZ text. Pure; no capability involved.
    pub fn extract_mrz_info(&self, raw: &str) -> Result<MrzInfo, MrzParseError> {
        extract_mrz_info(raw)
    }

    /// Run one scanner session and normalize the payload.
    pub async fn scan_document(
        &self,
        opts: &ScanOpts,
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ClientError> {
        let raw = self.inner.scanner.scan(opts, cancel).await?;
        Ok(normalize_scan(raw)?)
    }

    /// Judge whether a scan is acceptable for registration.
    pub fn validate_document(&self, scan: &ScanResult) -> ValidationResult {
        match scan {
            ScanResult::Mrz { info } => ValidationResult {
                ok: info.validation.overall,
                reason: (!info.validation.overall).then(|| "mrz_checksum_failed".to_string()),
            },
            ScanResult::Nfc { document } => {
                if document.document_number == UNKNOWN {
                    ValidationResult {
                        ok: false,
                        reason: Some("missing_document_number".to_string()),
                    }
                } else if !document.has_signer_cert() {
                    ValidationResult {
                        ok: false,
                        reason: Some("missing_signer_certificate".to_string()),
                    }
                } else {
                    ValidationResult {
                        ok: true,
                        reason: None,
                    }
                }
            }
            ScanResult::Qr { payload } => ValidationResult {
                ok: !payload.is_empty(),
                reason: payload.is_empty().then(|| "empty_payload".to_string()),
            },
        }
    }

    // -- registration -------------------------------------------------------

    /// Whether the document (selected when `doc_id` is `None`) is
    /// registered, consulting the local catalog first and the registry
    /// API for documents the catalog does not mark registered.
    pub async fn check_registration(
        &self,
        doc_id: Option<&str>,
    ) -> Result<RegistrationStatus, ClientError> {
        let catalog = self.inner.documents.load_catalog().await?;
        let Some(id) = doc_id
            .map(str::to_string)
            .or_else(|| catalog.selected.clone())
        else {
            return Ok(RegistrationStatus {
                registered: false,
                reason: Some("no_document_selected".to_string()),
            });
        };

        if let Some(metadata) = catalog.documents.iter().find(|d| d.id == id) {
            if metadata.registered {
                return Ok(RegistrationStatus {
                    registered: true,
                    reason: None,
                });
            }
        }

        let url = format!("{}/v1/registration/status", self.inner.config.endpoints.api);
        let response = self
            .inner
            .network
            .http
            .post_json(&url, &json!({ "document_id": id }))
            .await?;
        let registered = response["registered"].as_bool().unwrap_or(false);
        Ok(RegistrationStatus {
            registered,
            reason: (!registered).then(|| "not_registered".to_string()),
        })
    }

    /// Submit the document for registration and persist the updated
    /// catalog on success.
    pub async fn register_document(
        &self,
        doc_id: Option<&str>,
    ) -> Result<RegistrationStatus, ClientError> {
        let mut catalog = self.inner.documents.load_catalog().await?;
        let Some(id) = doc_id
            .map(str::to_string)
            .or_else(|| catalog.selected.clone())
        else {
            return Ok(RegistrationStatus {
                registered: false,
                reason: Some("no_document_selected".to_string()),
            });
        };

        let Some(document) = self.inner.documents.load_document(&id).await? else {
            return Ok(RegistrationStatus {
                registered: false,
                reason: Some("document_not_found".to_string()),
            });
        };

        let url = format!("{}/v1/registration", self.inner.config.endpoints.api);
        let body = json!({
            "document_id": document.id,
            "category": document.category.as_str(),
        });
        let response = self.inner.network.http.post_json(&url, &body).await?;
        let registered = response["registered"].as_bool().unwrap_or(false);

        if registered {
            if let Some(metadata) = catalog.documents.iter_mut().find(|d| d.id == id) {
                metadata.registered = true;
            }
            self.inner.documents.save_catalog(&catalog).await?;
        }
        Ok(RegistrationStatus {
            registered,
            reason: (!registered).then(|| "registration_rejected".to_string()),
        })
    }

    // -- proving ------------------------------------------------------------

    /// Start a proof request. Returns a pending [`ProofHandle`]
    /// synchronously; resolution happens asynchronously.
    ///
    /// The proof backend is an opaque remote service. Until one is
    /// wired up the handle settles with `ok: false` and the stub
    /// reason code rather than erroring.
    pub fn generate_proof(&self, request: ProofRequest, opts: ProofOptions) -> ProofHandle {
        let session_id = Uuid::new_v4().to_string();
        let cancel = opts.cancel.unwrap_or_default();
        let timeout_ms = opts
            .timeout_ms
            .unwrap_or(self.inner.config.timeouts.proof_ms);
        let (handle, resolver) = ProofHandle::pending(session_id.clone(), cancel.clone());

        let client = self.clone();
        tokio::spawn(async move {
            let outcome = tokio::select! {
                outcome = client.prove_via_backend(&request) => outcome,
                _ = cancel.cancelled() => ProofOutcome::failure(FailureCode::UserCancelled),
                _ = tokio::time::sleep(std::time::Duration::from_millis(timeout_ms)) => {
                    tracing::warn!(session_id = %session_id, timeout_ms, "proof generation timed out");
                    ProofOutcome::failure(FailureCode::ProofTimeout)
                }
            };
            resolver.resolve(outcome);
        });
        handle
    }

    /// Hand the request to the proof-compute service.
    async fn prove_via_backend(&self, request: &ProofRequest) -> ProofOutcome {
        tracing::debug!(kind = %request.kind, "proof backend not wired, resolving stub outcome");
        ProofOutcome::failure(FailureCode::ProofStub)
    }

    // -- capability passthroughs --------------------------------------------

    /// The hex-encoded signing key, possibly after a biometric prompt.
    pub async fn private_key(&self) -> Result<Option<PrivateKeyHex>, CapabilityError> {
        self.inner.auth.private_key().await
    }

    /// Whether a signing key has been provisioned.
    pub async fn has_private_key(&self) -> Result<bool, CapabilityError> {
        Ok(self.inner.auth.private_key().await?.is_some())
    }

    /// Load the document catalog.
    pub async fn load_document_catalog(&self) -> Result<DocumentCatalog, CapabilityError> {
        self.inner.documents.load_catalog().await
    }

    /// Load one document by catalog id.
    pub async fn load_document_by_id(
        &self,
        id: &str,
    ) -> Result<Option<DocumentData>, CapabilityError> {
        self.inner.documents.load_document(id).await
    }

    /// Persist the document catalog.
    pub async fn save_document_catalog(
        &self,
        catalog: &DocumentCatalog,
    ) -> Result<(), CapabilityError> {
        self.inner.documents.save_catalog(catalog).await
    }

    /// Record an analytics event. No-op without an analytics
    /// capability.
    pub fn track_event(&self, event: &str, params: serde_json::Value) {
        if let Some(analytics) = &self.inner.analytics {
            analytics.track_event(event, params);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use idv_core::document::DocumentCategory;
    use idv_core::mock::{MockAuth, MockCrypto, MockDocuments, MockHttp, MockScanner, MockWs};
    use idv_core::scan::RawScan;

    const SAMPLE_TD3: &str = "P<UTOERIKSSON<<ANNA<MARIA<<<<<<<<<<<<<<<<<<<\nL898902C36UTO7408122F1204159ZE184226B<<<<<10";

    fn sample_document(registered_cert: bool) -> DocumentData {
        DocumentData {
            id: "doc-1".into(),
            category: DocumentCategory::Passport,
            mock: false,
            document_number: "L898902C3".into(),
            date_of_birth: "740812".into(),
            date_of_expiry: "120415".into(),
            issuing_country: "UTO".into(),
            nationality: "UTO".into(),
            mrz_validation: None,
            signer_cert: registered_cert.then(|| idv_core::document::SignerCertMetadata {
                authority_key_identifier: "aabbcc".into(),
                subject_key_identifier: None,
                signature_algorithm: None,
            }),
        }
    }

    struct Fixture {
        http: Arc<MockHttp>,
        documents: Arc<MockDocuments>,
    }

    fn full_set(http_response: serde_json::Value) -> (AdapterSet, Fixture) {
        let http = Arc::new(MockHttp::with_response(http_response));
        let documents = Arc::new(MockDocuments::with_selected(sample_document(true)));
        let set = AdapterSet {
            scanner: Some(Arc::new(MockScanner::returning(RawScan::Text {
                mrz: SAMPLE_TD3.into(),
            }))),
            network: Some(NetworkCapability {
                http: http.clone(),
                ws: Arc::new(MockWs::scripted(Vec::new())),
            }),
            crypto: Some(Arc::new(MockCrypto)),
            auth: Some(Arc::new(MockAuth::with_key("aa".repeat(32)))),
            documents: Some(documents.clone()),
            storage: None,
            analytics: None,
            clock: None,
        };
        (set, Fixture { http, documents })
    }

    fn client_with(http_response: serde_json::Value) -> (Client, Fixture) {
        let (set, fixture) = full_set(http_response);
        let client = create_client(Config::default(), set).unwrap();
        (client, fixture)
    }

    #[test]
    fn missing_adapters_reported_in_priority_order() {
        let err = create_client(Config::default(), AdapterSet::default()).unwrap_err();
        assert_eq!(err.to_string(), "scanner adapter not provided");

        let (mut set, _) = full_set(json!({}));
        set.network = None;
        let err = create_client(Config::default(), set).unwrap_err();
        assert_eq!(err.to_string(), "network adapter not provided");

        let (mut set, _) = full_set(json!({}));
        set.network = None;
        set.crypto = None;
        let err = create_client(Config::default(), set).unwrap_err();
        assert_eq!(err.to_string(), "network adapter not provided");

        let (mut set, _) = full_set(json!({}));
        set.crypto = None;
        let err = create_client(Config::default(), set).unwrap_err();
        assert_eq!(err.to_string(), "crypto adapter not provided");

        let (mut set, _) = full_set(json!({}));
        set.auth = None;
        let err = create_client(Config::default(), set).unwrap_err();
        assert_eq!(err.to_string(), "auth adapter not provided");

        let (mut set, _) = full_set(json!({}));
        set.documents = None;
        let err = create_client(Config::default(), set).unwrap_err();
        assert_eq!(err.to_string(), "documents adapter not provided");
    }

    #[test]
    fn optional_capabilities_are_not_required() {
        let (set, _) = full_set(json!({}));
        assert!(set.storage.is_none() && set.analytics.is_none() && set.clock.is_none());
        assert!(create_client(Config::default(), set).is_ok());
    }

    #[tokio::test]
    async fn scan_document_normalizes_mrz_text() {
        let (client, _) = client_with(json!({}));
        let result = client
            .scan_document(&ScanOpts::Mrz, &CancellationToken::new())
            .await
            .unwrap();
        match result {
            ScanResult::Mrz { info } => {
                assert_eq!(info.document_number, "L898902C3");
                assert!(info.validation.overall);
            }
            other => panic!("expected mrz result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn validate_document_flags_missing_signer_cert() {
        let (client, _) = client_with(json!({}));
        let scan = ScanResult::Nfc {
            document: sample_document(false),
        };
        let verdict = client.validate_document(&scan);
        assert!(!verdict.ok);
        assert_eq!(verdict.reason.as_deref(), Some("missing_signer_certificate"));

        let scan = ScanResult::Nfc {
            document: sample_document(true),
        };
        assert!(client.validate_document(&scan).ok);
    }

    #[tokio::test]
    async fn check_registration_prefers_the_local_catalog() {
        let (client, fixture) = client_with(json!({ "registered": false }));

        // Catalog does not mark doc-1 registered, so the registry is
        // consulted.
        let status = client.check_registration(None).await.unwrap();
        assert!(!status.registered);
        assert_eq!(fixture.http.calls().len(), 1);

        // Once registration succeeds the catalog answers alone.
        let (client, fixture) = client_with(json!({ "registered": true }));
        client.register_document(None).await.unwrap();
        let status = client.check_registration(None).await.unwrap();
        assert!(status.registered);
        assert_eq!(fixture.http.calls().len(), 1, "catalog hit must skip the registry");
    }

    #[tokio::test]
    async fn check_registration_without_selection() {
        let http = Arc::new(MockHttp::with_response(json!({})));
        let (mut set, _) = full_set(json!({}));
        set.network = Some(NetworkCapability {
            http: http.clone(),
            ws: Arc::new(MockWs::scripted(Vec::new())),
        });
        set.documents = Some(Arc::new(MockDocuments::empty()));
        let client = create_client(Config::default(), set).unwrap();

        let status = client.check_registration(None).await.unwrap();
        assert!(!status.registered);
        assert_eq!(status.reason.as_deref(), Some("no_document_selected"));
        assert!(http.calls().is_empty());
    }

    #[tokio::test]
    async fn register_document_persists_the_updated_catalog() {
        let (client, fixture) = client_with(json!({ "registered": true }));
        let status = client.register_document(None).await.unwrap();
        assert!(status.registered);

        let catalog = fixture.documents.load_catalog().await.unwrap();
        assert!(catalog.documents.iter().any(|d| d.id == "doc-1" && d.registered));
        assert!(catalog.has_valid_registered_document());
    }

    #[tokio::test]
    async fn transport_failures_surface_as_capability_errors() {
        let (mut set, _) = full_set(json!({}));
        set.network = Some(NetworkCapability {
            http: Arc::new(MockHttp::failing("connection refused")),
            ws: Arc::new(MockWs::scripted(Vec::new())),
        });
        let client = create_client(Config::default(), set).unwrap();

        let err = client.check_registration(None).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Capability(CapabilityError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn generate_proof_resolves_the_stub_outcome() {
        let (client, _) = client_with(json!({}));
        let handle = client.generate_proof(
            ProofRequest {
                kind: idv_core::proof::ProofRequestKind::Disclose,
                payload: json!({ "fields": ["date_of_birth"] }),
            },
            ProofOptions::default(),
        );
        let outcome = handle.result().await;
        assert!(!outcome.ok);
        assert_eq!(outcome.reason.as_deref(), Some("SELF_ERR_PROOF_STUB"));
    }

    #[tokio::test]
    async fn events_reach_subscribers_through_the_facade() {
        let (client, _) = client_with(json!({}));
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = client.on(EventKind::State, move |payload| {
            if let EventPayload::State(state) = payload {
                sink.lock().push(state.clone());
            }
        });
        client.emit(&EventPayload::State("fetching_data".into()));
        client.emit(&EventPayload::Progress(idv_core::scan::Progress {
            step: "proving".into(),
            percent: Some(40),
        }));
        assert_eq!(*seen.lock(), vec!["fetching_data".to_string()]);
    }
}
