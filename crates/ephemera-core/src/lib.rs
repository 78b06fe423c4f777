//! Ephemera core
//!
//! Access control and lifecycle rules for ephemeral messages. Every operation
//! here is stateless: the `RecordStore` conditional update is the only
//! synchronisation point, so any number of processes may serve the same
//! message concurrently.

pub mod access;
pub mod error;
pub mod expiration;
pub mod lifecycle;
pub mod memory;
pub mod reveal;
pub mod self_destruct;
pub mod store;

pub use access::{AccessDecision, evaluate_access, normalize_email};
pub use error::{EngineError, Result};
pub use expiration::{Availability, UnavailableReason, check_availability};
pub use lifecycle::{check_access, create_message, delete_message, preview};
pub use memory::MemoryStore;
pub use reveal::{Revelation, ViewerContext, reveal};
pub use self_destruct::{SweepReport, arm_self_destruct, enforce_deadline, sweep};
pub use store::{ExpectedState, RecordStore, RecordUpdate, StoreError, UpdateOutcome};

#[cfg(test)]
mod test_support;
