//! The proving machine: one attempt at a time, capability by
//! capability.
//!
//! ## Attempt lifecycle
//!
//! `init` snapshots the selected document and environment and starts
//! in `Idle`. `start_fetching_data` loads the full document, checks
//! the signer-certificate precondition, pulls protocol data over HTTP
//! and the signing key from the auth capability; any miss ends the
//! attempt in `Failed` with a machine-readable reason. `generate_proof`
//! then drives the remote prover over the websocket, forwarding
//! progress frames as events until the prover answers, the time bound
//! expires or the caller cancels.
//!
//! Nothing retries automatically: a failed attempt stays `Failed`
//! until the caller re-enters the pipeline by calling
//! `start_fetching_data` again. Two concurrent attempts on one machine
//! are rejected, never interleaved — both would contend for the same
//! signing-key retrieval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;
use uuid::Uuid;

use idv_client::{Client, EventPayload};
use idv_core::adapters::{PrivateKeyHex, WsEvent};
use idv_core::cancel::CancellationToken;
use idv_core::config::Environment;
use idv_core::document::DocumentCategory;
use idv_core::error::{CapabilityError, FailureCode};
use idv_core::proof::{ProofOutcome, ProofRequestKind};
use idv_core::scan::Progress;

use crate::state::{transition, ProvingEvent, ProvingPhase};

/// Failure of a machine operation itself, as opposed to a failed
/// attempt (which is a phase outcome, not an error).
#[derive(Debug, thiserror::Error)]
pub enum ProvingError {
    /// Another attempt is running on this machine.
    #[error("a proving attempt is already in flight")]
    AttemptInFlight,
    /// The operation is not legal in the current phase.
    #[error("event {event} is not legal in phase {phase}")]
    InvalidTransition {
        /// Phase the machine was in.
        phase: ProvingPhase,
        /// Event the operation would have applied.
        event: ProvingEvent,
    },
    /// `generate_proof` called before the fetch stage completed.
    #[error("proof generation requires the generating_proof phase, machine is {phase}")]
    NotGenerating {
        /// Phase the machine was in.
        phase: ProvingPhase,
    },
    /// A capability failed during initialization.
    #[error(transparent)]
    Capability(#[from] CapabilityError),
}

/// Identity of the document an attempt works on, captured at `init`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSnapshot {
    /// Catalog id.
    pub id: String,
    /// Passport or identity card.
    pub category: DocumentCategory,
    /// Whether the document is a mock.
    pub mock: bool,
}

/// Observable machine state.
#[derive(Debug, Clone)]
pub struct ProvingState {
    /// Current phase.
    pub phase: ProvingPhase,
    /// What the proof is for.
    pub intent: ProofRequestKind,
    /// Environment the attempt targets.
    pub environment: Environment,
    /// Document snapshot, when a document was selected at `init`.
    pub document: Option<DocumentSnapshot>,
    /// Reason code of the last failure, cleared on re-entry.
    pub error_code: Option<FailureCode>,
}

struct Fetched {
    protocol: serde_json::Value,
    key: PrivateKeyHex,
}

struct Inner {
    phase: ProvingPhase,
    intent: ProofRequestKind,
    environment: Environment,
    document: Option<DocumentSnapshot>,
    error_code: Option<FailureCode>,
    fetched: Option<Fetched>,
}

/// Orchestrates one proof attempt against the client's capabilities.
pub struct ProvingMachine {
    client: Client,
    cancel: CancellationToken,
    state: Mutex<Inner>,
    in_flight: AtomicBool,
}

impl ProvingMachine {
    /// Reset to `Idle` for `intent`, snapshotting the selected
    /// document and environment. A catalog without a selection is not
    /// an error here — the fetch stage reports it as a fetch failure.
    pub async fn init(
        client: Client,
        intent: ProofRequestKind,
        cancel: CancellationToken,
    ) -> Result<Self, ProvingError> {
        let catalog = client.load_document_catalog().await?;
        let document = catalog.selected_document().map(|m| DocumentSnapshot {
            id: m.id.clone(),
            category: m.category,
            mock: m.mock,
        });
        let environment = client.config().environment;
        Ok(Self {
            client,
            cancel,
            state: Mutex::new(Inner {
                phase: ProvingPhase::Idle,
                intent,
                environment,
                document,
                error_code: None,
                fetched: None,
            }),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Current phase.
    pub fn phase(&self) -> ProvingPhase {
        self.state.lock().phase
    }

    /// Observable snapshot of the machine.
    pub fn snapshot(&self) -> ProvingState {
        let inner = self.state.lock();
        ProvingState {
            phase: inner.phase,
            intent: inner.intent,
            environment: inner.environment,
            document: inner.document.clone(),
            error_code: inner.error_code,
        }
    }

    /// Abort the attempt. In-flight capability calls observe the token
    /// at their next suspension point; completed side effects stay.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    // ─── Fetch stage ─────────────────────────────────────────────────────

    /// Load the document, protocol data and signing key.
    ///
    /// Returns the resulting phase: `GeneratingProof` when everything
    /// is in hand, `Failed` when a prerequisite was missed (exactly
    /// one error event is emitted with the reason code). Calling this
    /// from `Failed` is the explicit retry path. A call while another
    /// attempt runs is rejected with [`ProvingError::AttemptInFlight`].
    pub async fn start_fetching_data(&self) -> Result<ProvingPhase, ProvingError> {
        let _guard = self.acquire()?;

        {
            let mut inner = self.state.lock();
            let event = match inner.phase {
                ProvingPhase::Failed => ProvingEvent::Retry,
                _ => ProvingEvent::StartFetch,
            };
            let next = transition(inner.phase, event).ok_or(ProvingError::InvalidTransition {
                phase: inner.phase,
                event,
            })?;
            inner.phase = next;
            inner.error_code = None;
            inner.fetched = None;
        }
        self.emit_phase(ProvingPhase::FetchingData);

        if self.cancel.is_cancelled() {
            return Ok(self.fail(
                ProvingEvent::Cancelled,
                FailureCode::UserCancelled,
                "attempt cancelled before fetch",
            ));
        }

        let snapshot = self.state.lock().document.clone();
        let Some(snapshot) = snapshot else {
            return Ok(self.fail(
                ProvingEvent::FetchError,
                FailureCode::FetchError,
                "no document selected",
            ));
        };
        let document = match self.client.load_document_by_id(&snapshot.id).await {
            Ok(Some(document)) => document,
            Ok(None) => {
                return Ok(self.fail(
                    ProvingEvent::FetchError,
                    FailureCode::FetchError,
                    "selected document not found",
                ));
            }
            Err(err) => {
                return Ok(self.fail(
                    ProvingEvent::FetchError,
                    FailureCode::FetchError,
                    &err.to_string(),
                ));
            }
        };

        // Hard precondition: without parsed signer-certificate
        // metadata the prover cannot anchor the document, so protocol
        // data is never fetched.
        if !document.has_signer_cert() {
            return Ok(self.fail(
                ProvingEvent::FetchError,
                FailureCode::FetchError,
                "document has no parsed signer certificate",
            ));
        }

        if self.cancel.is_cancelled() {
            return Ok(self.fail(
                ProvingEvent::Cancelled,
                FailureCode::UserCancelled,
                "attempt cancelled during fetch",
            ));
        }

        let url = format!(
            "{}/v1/protocol/{}/data",
            self.client.config().endpoints.api,
            document.category.as_str()
        );
        let protocol = match self.client.network().http.get_json(&url).await {
            Ok(protocol) => protocol,
            Err(err) => {
                return Ok(self.fail(
                    ProvingEvent::FetchError,
                    FailureCode::FetchError,
                    &err.to_string(),
                ));
            }
        };

        if self.cancel.is_cancelled() {
            return Ok(self.fail(
                ProvingEvent::Cancelled,
                FailureCode::UserCancelled,
                "attempt cancelled during fetch",
            ));
        }

        // May prompt for biometrics. A refusal is terminal for this
        // attempt, never retried behind the user's back.
        let key = match self.client.private_key().await {
            Ok(Some(key)) => key,
            Ok(None) => {
                return Ok(self.fail(
                    ProvingEvent::AuthError,
                    FailureCode::AuthError,
                    "no signing key provisioned",
                ));
            }
            Err(err) => {
                return Ok(self.fail(
                    ProvingEvent::AuthError,
                    FailureCode::AuthError,
                    &err.to_string(),
                ));
            }
        };

        {
            let mut inner = self.state.lock();
            if let Some(next) = transition(inner.phase, ProvingEvent::FetchSucceeded) {
                inner.phase = next;
            }
            inner.fetched = Some(Fetched { protocol, key });
        }
        self.emit_phase(ProvingPhase::GeneratingProof);
        Ok(ProvingPhase::GeneratingProof)
    }

    // ─── Generation stage ────────────────────────────────────────────────

    /// Drive the remote prover with the fetched prerequisites.
    ///
    /// `payload` carries the intent-specific request body (disclosure
    /// selection, registration commitment). Progress frames are
    /// forwarded as progress events; the call settles when the prover
    /// answers, `timeout_ms` (default: the configured proof timeout)
    /// expires, or the attempt is cancelled. The connection is closed
    /// on every exit path.
    pub async fn generate_proof(
        &self,
        payload: serde_json::Value,
        timeout_ms: Option<u64>,
    ) -> Result<ProofOutcome, ProvingError> {
        let _guard = self.acquire()?;

        let (intent, environment, protocol, key) = {
            let mut inner = self.state.lock();
            if inner.phase != ProvingPhase::GeneratingProof {
                return Err(ProvingError::NotGenerating { phase: inner.phase });
            }
            let fetched = inner
                .fetched
                .take()
                .ok_or(ProvingError::NotGenerating { phase: inner.phase })?;
            (
                inner.intent,
                inner.environment,
                fetched.protocol,
                fetched.key,
            )
        };

        let session_id = Uuid::new_v4().to_string();
        let timeout_ms = timeout_ms.unwrap_or(self.client.config().timeouts.proof_ms);

        let mut request = json!({
            "type": intent.as_str(),
            "session_id": session_id,
            "environment": environment.as_str(),
            "protocol": protocol,
            "payload": payload,
        });
        let signature = match self
            .client
            .crypto()
            .sign(request.to_string().as_bytes(), key.reveal())
            .await
        {
            Ok(signature) => signature,
            Err(err) => {
                let outcome = self.settle(
                    ProvingEvent::ProofFailed,
                    FailureCode::ProofFailed,
                    &err.to_string(),
                );
                return Ok(outcome);
            }
        };
        request["signature"] = json!(hex::encode(signature));

        let prover_url = self.client.config().endpoints.prover_ws.clone();
        let mut conn = match self.client.network().ws.connect(&prover_url).await {
            Ok(conn) => conn,
            Err(err) => {
                let outcome = self.settle(
                    ProvingEvent::ProofFailed,
                    FailureCode::ProofFailed,
                    &err.to_string(),
                );
                return Ok(outcome);
            }
        };
        if let Err(err) = conn.send(&request.to_string()).await {
            conn.close().await;
            let outcome = self.settle(
                ProvingEvent::ProofFailed,
                FailureCode::ProofFailed,
                &err.to_string(),
            );
            return Ok(outcome);
        }

        let deadline = tokio::time::sleep(Duration::from_millis(timeout_ms));
        tokio::pin!(deadline);

        let verdict: (ProvingEvent, Option<FailureCode>, String) = loop {
            tokio::select! {
                _ = &mut deadline => {
                    tracing::warn!(session_id = %session_id, timeout_ms, "proof generation timed out");
                    break (
                        ProvingEvent::Timeout,
                        Some(FailureCode::ProofTimeout),
                        "proof generation exceeded its time bound".into(),
                    );
                }
                _ = self.cancel.cancelled() => {
                    break (
                        ProvingEvent::Cancelled,
                        Some(FailureCode::UserCancelled),
                        "attempt cancelled during proof generation".into(),
                    );
                }
                frame = conn.recv() => match frame {
                    Some(WsEvent::Message(text)) => {
                        match self.handle_prover_frame(&text) {
                            Some(verdict) => break verdict,
                            None => continue,
                        }
                    }
                    Some(WsEvent::Error(reason)) => {
                        break (ProvingEvent::ProofFailed, Some(FailureCode::ProofFailed), reason);
                    }
                    Some(WsEvent::Closed) | None => {
                        break (
                            ProvingEvent::ProofFailed,
                            Some(FailureCode::ProofFailed),
                            "prover connection closed before a result".into(),
                        );
                    }
                }
            }
        };
        conn.close().await;

        let (event, code, message) = verdict;
        match code {
            Some(code) => Ok(self.settle(event, code, &message)),
            None => {
                {
                    let mut inner = self.state.lock();
                    if let Some(next) = transition(inner.phase, event) {
                        inner.phase = next;
                    }
                }
                self.emit_phase(ProvingPhase::Completed);
                Ok(ProofOutcome::success())
            }
        }
    }

    /// Interpret one prover frame. `None` keeps the session alive.
    fn handle_prover_frame(
        &self,
        text: &str,
    ) -> Option<(ProvingEvent, Option<FailureCode>, String)> {
        let msg: serde_json::Value = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed prover frame");
                return None;
            }
        };
        match msg["type"].as_str() {
            Some("progress") => {
                let step = msg["step"].as_str().unwrap_or("proving").to_string();
                let percent = msg["percent"].as_u64().map(|p| p.min(100) as u8);
                self.client
                    .emit(&EventPayload::Progress(Progress { step, percent }));
                None
            }
            Some("result") => {
                if msg["ok"].as_bool().unwrap_or(false) {
                    Some((ProvingEvent::ProofSucceeded, None, String::new()))
                } else {
                    let reason = msg["reason"]
                        .as_str()
                        .unwrap_or("prover rejected the request")
                        .to_string();
                    Some((ProvingEvent::ProofFailed, Some(FailureCode::ProofFailed), reason))
                }
            }
            other => {
                tracing::debug!(frame_type = ?other, "ignoring unknown prover frame");
                None
            }
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn acquire(&self) -> Result<FlightGuard<'_>, ProvingError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ProvingError::AttemptInFlight);
        }
        Ok(FlightGuard(&self.in_flight))
    }

    /// Apply a failure event, record the reason code, and emit exactly
    /// one error event plus the terminal state event.
    fn fail(&self, event: ProvingEvent, code: FailureCode, message: &str) -> ProvingPhase {
        let phase = {
            let mut inner = self.state.lock();
            if let Some(next) = transition(inner.phase, event) {
                inner.phase = next;
            } else {
                tracing::warn!(phase = %inner.phase, event = %event, "failure event not in table");
            }
            inner.error_code = Some(code);
            inner.phase
        };
        tracing::warn!(code = %code, message, "proving attempt failed");
        self.client.emit(&EventPayload::Error {
            code,
            message: message.to_string(),
        });
        self.emit_phase(phase);
        phase
    }

    /// [`Self::fail`], shaped as the proof outcome.
    fn settle(&self, event: ProvingEvent, code: FailureCode, message: &str) -> ProofOutcome {
        self.fail(event, code, message);
        ProofOutcome::failure(code)
    }

    fn emit_phase(&self, phase: ProvingPhase) {
        self.client
            .emit(&EventPayload::State(phase.as_str().to_string()));
    }
}

struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
