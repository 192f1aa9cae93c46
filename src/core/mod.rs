//! Core workflow types.
//!
//! This module contains the pure part of the engine:
//! - States and transition sources
//! - Entities, entity references and actors
//! - Condition and permission predicates
//! - The evaluation context predicates receive
//! - The append-only audit trail
//!
//! Nothing in here performs I/O or mutates persisted state.

mod context;
mod entity;
mod guard;
mod history;
mod state;

pub use context::{Context, Lookup};
pub use entity::{Actor, Entity, EntityRef};
pub use guard::{first_unmet, Condition, Permission};
pub use history::{AuditEntry, AuditLog};
pub use state::{Source, State, StateId};
