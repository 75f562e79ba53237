//! History persistence contract and the in-memory reference
//! implementation.
//!
//! The trait is the query surface the store needs from the storage
//! capability; the host wires it to its database of choice.
//! [`MemoryHistoryDatabase`] backs tests and simulator builds.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use idv_core::error::CapabilityError;

use crate::types::{NewProofHistoryEntry, ProofHistoryEntry, ProofStatus};

/// One page of history rows plus the server-side total.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryPage {
    /// Rows for the requested page, newest first.
    pub rows: Vec<ProofHistoryEntry>,
    /// Total row count across all pages.
    pub total_count: u64,
}

/// Query surface of the history persistence layer.
///
/// Implementations enforce the terminal-status rule: `update_status`
/// must never overwrite a terminal status and must report whether the
/// update was applied.
#[async_trait]
pub trait HistoryDatabase: Send + Sync {
    /// Prepare the backing storage (create tables, run migrations).
    async fn init(&self) -> Result<(), CapabilityError>;

    /// Insert a new `PENDING` entry and return it with its assigned
    /// id and the given timestamp.
    async fn insert(
        &self,
        entry: NewProofHistoryEntry,
        timestamp: u64,
    ) -> Result<ProofHistoryEntry, CapabilityError>;

    /// Apply a status update for `session_id`. Returns `false` when
    /// the session is unknown or already terminal.
    async fn update_status(
        &self,
        session_id: &str,
        status: ProofStatus,
        error_code: Option<&str>,
        error_reason: Option<&str>,
    ) -> Result<bool, CapabilityError>;

    /// One page of rows, newest first. Pages are 1-based.
    async fn page(&self, page: u32, page_size: u32) -> Result<HistoryPage, CapabilityError>;

    /// All entries still `PENDING`, oldest first.
    async fn pending(&self) -> Result<Vec<ProofHistoryEntry>, CapabilityError>;

    /// Remove every entry.
    async fn clear(&self) -> Result<(), CapabilityError>;
}

/// In-memory [`HistoryDatabase`].
#[derive(Default)]
pub struct MemoryHistoryDatabase {
    // Insertion order; reads reverse it to serve newest first.
    entries: Mutex<Vec<ProofHistoryEntry>>,
    next_id: AtomicU64,
}

impl MemoryHistoryDatabase {
    /// An empty database.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryDatabase for MemoryHistoryDatabase {
    async fn init(&self) -> Result<(), CapabilityError> {
        Ok(())
    }

    async fn insert(
        &self,
        entry: NewProofHistoryEntry,
        timestamp: u64,
    ) -> Result<ProofHistoryEntry, CapabilityError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let entry = ProofHistoryEntry {
            id: id.to_string(),
            session_id: entry.session_id,
            app_name: entry.app_name,
            endpoint_type: entry.endpoint_type,
            status: ProofStatus::Pending,
            error_code: None,
            error_reason: None,
            timestamp,
            disclosures: entry.disclosures,
            logo_base64: entry.logo_base64,
            user_id: entry.user_id,
            user_id_type: entry.user_id_type,
        };
        self.entries.lock().push(entry.clone());
        Ok(entry)
    }

    async fn update_status(
        &self,
        session_id: &str,
        status: ProofStatus,
        error_code: Option<&str>,
        error_reason: Option<&str>,
    ) -> Result<bool, CapabilityError> {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.iter_mut().find(|e| e.session_id == session_id) else {
            return Ok(false);
        };
        if entry.status.is_terminal() {
            return Ok(false);
        }
        entry.status = status;
        entry.error_code = error_code.map(str::to_string);
        entry.error_reason = error_reason.map(str::to_string);
        Ok(true)
    }

    async fn page(&self, page: u32, page_size: u32) -> Result<HistoryPage, CapabilityError> {
        let entries = self.entries.lock();
        let start = (page.saturating_sub(1) as usize) * page_size as usize;
        let rows = entries
            .iter()
            .rev()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect();
        Ok(HistoryPage {
            rows,
            total_count: entries.len() as u64,
        })
    }

    async fn pending(&self) -> Result<Vec<ProofHistoryEntry>, CapabilityError> {
        Ok(self
            .entries
            .lock()
            .iter()
            .filter(|e| e.status == ProofStatus::Pending)
            .cloned()
            .collect())
    }

    async fn clear(&self) -> Result<(), CapabilityError> {
        self.entries.lock().clear();
        Ok(())
    }
}
