//! Runtime: applying transitions against a store.
//!
//! # Key Concepts
//!
//! - **Engine**: owns the registry and settings, and turns each call into
//!   one unit of work
//! - **StateMachine**: read-only view of one entity's workflow, answering
//!   which transitions are available and why one is not
//! - **Store**: persistence adapter whose `commit` is atomic
//!
//! A unit of work stages every write in memory. Effects on related entities
//! run inside it through intents; an intent targeting an entity that is still
//! being processed waits until that entity is staged. Nothing is written and
//! no notification is sent unless every step succeeds.

mod engine;
mod error;
mod machine;
mod store;

pub use engine::{Engine, Outcome, SweepReport};
pub use error::{ErrorCategory, FsmError, StoreError};
pub use machine::{Diagnosis, Rejection, StateMachine};
pub use store::{Changeset, MemoryStore, Store};
