//! The proof history store.
//!
//! ## Synchronization model
//!
//! `sync_status` reconciles pending sessions against the status relay:
//! one websocket connection per pass, one subscription per pending
//! session, terminal updates applied as verdicts arrive. Passes are
//! throttled — a call inside the cooldown window is skipped outright,
//! never queued — and the connection is force-closed after a fixed
//! upper bound so an unresponsive relay cannot leak a socket. The
//! throttle timestamp is owned by the store instance; two stores never
//! share it.
//!
//! Loading is page-based: `load_more_history` fetches the next unseen
//! page, stops once the loaded count reaches the reported total, and
//! turns a call during an in-flight load into a no-op.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use idv_core::adapters::{ClockAdapter, WsAdapter, WsEvent};
use idv_core::error::{CapabilityError, FailureCode};

use crate::db::HistoryDatabase;
use crate::types::{NewProofHistoryEntry, ProofHistoryEntry, ProofStatus};

/// Store tuning. The defaults match the shipped mobile clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Websocket URL of the status relay.
    pub relay_ws: String,
    /// Rows per history page.
    pub page_size: u32,
    /// Sync cooldown window in milliseconds. Also scales the relay
    /// force-close bound (4x the window).
    pub sync_throttle_ms: u64,
    /// Age after which a pending entry is expired with
    /// `PROOF_EXPIRED` instead of being re-subscribed.
    pub stale_after_ms: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            relay_ws: "wss://relay.idv.example".into(),
            page_size: 20,
            sync_throttle_ms: 30_000,
            stale_after_ms: 60 * 60 * 1000,
        }
    }
}

struct StoreState {
    entries: Vec<ProofHistoryEntry>,
    current_page: u32,
    has_more: bool,
    loading: bool,
    syncing: bool,
    last_sync_ms: Option<u64>,
}

/// Cached view over the history database plus relay reconciliation.
pub struct ProofHistoryStore {
    db: Arc<dyn HistoryDatabase>,
    ws: Arc<dyn WsAdapter>,
    clock: Arc<dyn ClockAdapter>,
    config: HistoryConfig,
    state: Mutex<StoreState>,
}

impl ProofHistoryStore {
    /// A store over `db`, syncing through `ws` against the configured
    /// relay.
    pub fn new(
        config: HistoryConfig,
        db: Arc<dyn HistoryDatabase>,
        ws: Arc<dyn WsAdapter>,
        clock: Arc<dyn ClockAdapter>,
    ) -> Self {
        Self {
            db,
            ws,
            clock,
            config,
            state: Mutex::new(StoreState {
                entries: Vec::new(),
                current_page: 1,
                has_more: true,
                loading: false,
                syncing: false,
                last_sync_ms: None,
            }),
        }
    }

    /// Prepare storage, load the first page when the cache is empty,
    /// then reconcile pending sessions once.
    pub async fn init(&self) -> Result<(), CapabilityError> {
        self.db.init().await?;
        if self.state.lock().entries.is_empty() {
            self.load_more_history().await?;
        }
        self.sync_status().await
    }

    /// Loaded entries, newest first.
    pub fn entries(&self) -> Vec<ProofHistoryEntry> {
        self.state.lock().entries.clone()
    }

    /// Whether unloaded pages remain.
    pub fn has_more(&self) -> bool {
        self.state.lock().has_more
    }

    /// Insert a new `PENDING` entry and return it with its assigned
    /// id. A storage failure is reported to the caller, not retried.
    pub async fn add_entry(
        &self,
        entry: NewProofHistoryEntry,
    ) -> Result<ProofHistoryEntry, CapabilityError> {
        let timestamp = self.clock.now_millis();
        let inserted = self.db.insert(entry, timestamp).await?;
        self.state.lock().entries.insert(0, inserted.clone());
        Ok(inserted)
    }

    /// Apply a status update. The first terminal status wins; a later
    /// update for the same session is ignored and reported as not
    /// applied.
    pub async fn update_status(
        &self,
        session_id: &str,
        status: ProofStatus,
        error_code: Option<&str>,
        error_reason: Option<&str>,
    ) -> Result<bool, CapabilityError> {
        let applied = self
            .db
            .update_status(session_id, status, error_code, error_reason)
            .await?;
        if applied {
            let mut state = self.state.lock();
            if let Some(entry) = state.entries.iter_mut().find(|e| e.session_id == session_id) {
                entry.status = status;
                entry.error_code = error_code.map(str::to_string);
                entry.error_reason = error_reason.map(str::to_string);
            }
        }
        Ok(applied)
    }

    /// Load the next page. A call while a load is in flight, or after
    /// the last page, is a no-op.
    pub async fn load_more_history(&self) -> Result<(), CapabilityError> {
        let page = {
            let mut state = self.state.lock();
            if state.loading || !state.has_more {
                return Ok(());
            }
            state.loading = true;
            state.current_page
        };
        let _guard = ClearFlag::loading(&self.state);

        let result = self.db.page(page, self.config.page_size).await?;
        let mut state = self.state.lock();
        // An insert since the last page shifts the newest-first pages,
        // so the boundary row can come back; keep each row once.
        for row in result.rows {
            if state.entries.iter().all(|e| e.id != row.id) {
                state.entries.push(row);
            }
        }
        state.current_page += 1;
        state.has_more = (state.entries.len() as u64) < result.total_count;
        Ok(())
    }

    /// Drop the cached view. The next load starts from page one; the
    /// database is untouched.
    pub fn reset_history(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.current_page = 1;
        state.has_more = true;
    }

    /// Remove every persisted entry and reset the view.
    pub async fn clear_history(&self) -> Result<(), CapabilityError> {
        self.db.clear().await?;
        self.reset_history();
        Ok(())
    }

    // ─── Relay synchronization ───────────────────────────────────────────

    /// Reconcile pending sessions against the relay.
    ///
    /// Skipped entirely inside the cooldown window or while another
    /// pass runs. Stale pending entries are expired locally before the
    /// connection opens; a pass with nothing pending opens no
    /// connection at all.
    pub async fn sync_status(&self) -> Result<(), CapabilityError> {
        let now = self.clock.now_millis();
        {
            let mut state = self.state.lock();
            if state.syncing {
                return Ok(());
            }
            if let Some(last) = state.last_sync_ms {
                if now.saturating_sub(last) < self.config.sync_throttle_ms {
                    tracing::debug!("status sync skipped, inside the cooldown window");
                    return Ok(());
                }
            }
            state.syncing = true;
            state.last_sync_ms = Some(now);
        }
        let _guard = ClearFlag::syncing(&self.state);

        self.expire_stale(now).await?;

        let pending = self.db.pending().await?;
        if pending.is_empty() {
            tracing::debug!("no pending proofs to sync");
            return Ok(());
        }

        let mut conn = self.ws.connect(&self.config.relay_ws).await?;
        let mut outstanding: HashSet<String> =
            pending.iter().map(|e| e.session_id.clone()).collect();
        for entry in &pending {
            let frame = json!({ "type": "subscribe", "session_id": entry.session_id });
            if let Err(err) = conn.send(&frame.to_string()).await {
                conn.close().await;
                return Err(err);
            }
        }

        // Upper bound on the whole pass; an unresponsive relay must
        // not hold the socket open indefinitely.
        let force_close =
            tokio::time::sleep(Duration::from_millis(self.config.sync_throttle_ms * 4));
        tokio::pin!(force_close);

        loop {
            tokio::select! {
                _ = &mut force_close => {
                    tracing::warn!(
                        outstanding = outstanding.len(),
                        "relay sync force-closed with sessions unresolved"
                    );
                    break;
                }
                frame = conn.recv() => match frame {
                    Some(WsEvent::Message(text)) => {
                        let verdict = match self.apply_relay_verdict(&text).await {
                            Ok(verdict) => verdict,
                            Err(err) => {
                                conn.close().await;
                                return Err(err);
                            }
                        };
                        if let Some(session_id) = verdict {
                            let frame =
                                json!({ "type": "unsubscribe", "session_id": session_id });
                            if conn.send(&frame.to_string()).await.is_err() {
                                break;
                            }
                            outstanding.remove(&session_id);
                            if outstanding.is_empty() {
                                break;
                            }
                        }
                    }
                    Some(WsEvent::Error(reason)) => {
                        tracing::warn!(reason = %reason, "relay connection error");
                        break;
                    }
                    Some(WsEvent::Closed) | None => break,
                }
            }
        }
        conn.close().await;
        Ok(())
    }

    /// Handle one relay frame; returns the resolved session id when
    /// the frame carried a verdict.
    async fn apply_relay_verdict(&self, text: &str) -> Result<Option<String>, CapabilityError> {
        let msg: serde_json::Value = match serde_json::from_str(text) {
            Ok(msg) => msg,
            Err(err) => {
                tracing::warn!(error = %err, "dropping malformed relay frame");
                return Ok(None);
            }
        };
        let (Some(code), Some(session_id)) = (msg["status"].as_u64(), msg["request_id"].as_str())
        else {
            return Ok(None);
        };
        let Some(status) = ProofStatus::from_relay_code(code) else {
            tracing::debug!(code, "ignoring non-terminal relay status");
            return Ok(None);
        };
        self.update_status(session_id, status, None, None).await?;
        Ok(Some(session_id.to_string()))
    }

    /// Fail pending entries that outlived the staleness bound.
    async fn expire_stale(&self, now: u64) -> Result<(), CapabilityError> {
        let pending = self.db.pending().await?;
        for entry in pending {
            if now.saturating_sub(entry.timestamp) > self.config.stale_after_ms {
                tracing::info!(session_id = %entry.session_id, "expiring stale pending proof");
                self.update_status(
                    &entry.session_id,
                    ProofStatus::Failure,
                    Some(FailureCode::ProofExpired.as_str()),
                    Some("no terminal status arrived before the staleness bound"),
                )
                .await?;
            }
        }
        Ok(())
    }
}

/// Clears a busy flag on drop, so early returns and errors cannot
/// leave the store wedged.
struct ClearFlag<'a> {
    state: &'a Mutex<StoreState>,
    syncing: bool,
}

impl<'a> ClearFlag<'a> {
    fn loading(state: &'a Mutex<StoreState>) -> Self {
        Self {
            state,
            syncing: false,
        }
    }

    fn syncing(state: &'a Mutex<StoreState>) -> Self {
        Self {
            state,
            syncing: true,
        }
    }
}

impl Drop for ClearFlag<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if self.syncing {
            state.syncing = false;
        } else {
            state.loading = false;
        }
    }
}
