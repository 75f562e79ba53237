//! # idv-history — Proof History and Relay Synchronization
//!
//! Persisted record of every proof session the user ran, with
//! page-based loading and throttled reconciliation of pending sessions
//! against the status relay.
//!
//! Persistence sits behind the [`HistoryDatabase`] trait; the host
//! binds it to its storage engine, and [`MemoryHistoryDatabase`]
//! serves tests and simulator builds. [`ProofHistoryStore`] owns the
//! cached view, the paging cursor and the sync throttle state.

pub mod db;
pub mod store;
pub mod types;

pub use db::{HistoryDatabase, HistoryPage, MemoryHistoryDatabase};
pub use store::{HistoryConfig, ProofHistoryStore};
pub use types::{NewProofHistoryEntry, ProofHistoryEntry, ProofStatus};
