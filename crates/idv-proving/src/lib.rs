//! # idv-proving — Proof Orchestration
//!
//! Drives one proof attempt end to end: fetch the selected document
//! and its prerequisites, hand the request to the remote prover over
//! the websocket, and report every phase change and failure through
//! the client event bus.
//!
//! The lifecycle is a closed state machine
//! (`Idle → FetchingData → GeneratingProof → {Completed, Failed}`)
//! with a pure transition table in [`state`]; [`machine`] binds it to
//! the capabilities. Retries are always caller-initiated.

pub mod machine;
pub mod state;

pub use machine::{DocumentSnapshot, ProvingError, ProvingMachine, ProvingState};
pub use state::{transition, ProvingEvent, ProvingPhase};
