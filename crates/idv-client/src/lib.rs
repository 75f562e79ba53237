//! # idv-client — Client Factory and Façade
//!
//! Combines the capability adapters into one client object: scan →
//! normalize → validate → register → prove, plus a synchronous event
//! bus. Construction validates that every required capability is
//! present — a missing one fails [`create_client`] immediately, never
//! a later call.
//!
//! The heavy lifting lives elsewhere: MRZ parsing in `idv-mrz`, proof
//! orchestration in `idv-proving`, history in `idv-history`. This
//! crate is the wiring between them and the host-provided adapters.

mod client;
mod events;
mod handle;
mod normalize;

pub use client::{
    create_client, AdapterSet, Client, ClientBuildError, ClientError, ProofOptions,
    RegistrationStatus, ValidationResult,
};
pub use events::{EventBus, EventKind, EventPayload, Unsubscribe};
pub use handle::ProofHandle;
pub use normalize::normalize_scan;
