//! # idv-core — Capability Contracts and Canonical Types
//!
//! The foundation of the document proof pipeline. This crate defines:
//!
//! - the **capability adapter traits** the host application implements
//!   (scanner, crypto, network, auth, documents, storage, analytics,
//!   clock) — contracts only, no behavior;
//! - the **canonical document model** shared by every acquisition path;
//! - the **error taxonomy** separating parse errors, capability errors
//!   and terminal failure codes;
//! - the **cancellation token** threaded through every suspension
//!   point.
//!
//! Nothing in this crate performs I/O. Implementations of the traits
//! live in the embedding application; the client, proving and history
//! crates consume them through these contracts.

pub mod adapters;
pub mod cancel;
pub mod config;
pub mod document;
pub mod error;
pub mod mock;
pub mod proof;
pub mod scan;

pub use adapters::{
    AnalyticsAdapter, AuthAdapter, ClockAdapter, CryptoAdapter, DocumentsAdapter, HttpAdapter,
    NetworkCapability, PrivateKeyHex, ScannerAdapter, StorageAdapter, SystemClock, WsAdapter,
    WsConn, WsEvent,
};
pub use cancel::{CancellationToken, Cancelled};
pub use config::{Config, ConfigPatch, Endpoints, Environment, Timeouts};
pub use document::{
    DocumentCatalog, DocumentCategory, DocumentData, DocumentMetadata, SignerCertMetadata, UNKNOWN,
};
pub use error::{CapabilityError, FailureCode};
pub use proof::{HandleStatus, ProofOutcome, ProofRequest, ProofRequestKind};
pub use scan::{ChipRead, Progress, RawScan, ScanMode, ScanOpts, ScanResult};
