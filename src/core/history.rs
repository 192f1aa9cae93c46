//! Audit trail of applied transitions.
//!
//! Entries are append-only. The engine creates exactly one per successfully
//! applied transition and never touches it again.

use super::entity::EntityRef;
use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Record of one applied transition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub entity: EntityRef,
    pub transition: String,
    /// `None` for automatic and cascaded transitions and for anonymous callers
    pub actor: Option<u64>,
    /// `None` when the entity was created by this transition
    pub from: Option<StateId>,
    pub to: StateId,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    pub fn new(
        entity: EntityRef,
        transition: impl Into<String>,
        actor: Option<u64>,
        from: Option<StateId>,
        to: StateId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity,
            transition: transition.into(),
            actor,
            from,
            to,
            timestamp,
        }
    }
}

/// Ordered audit trail.
///
/// `record` returns a new log rather than mutating in place, so a log handed
/// out to a reader never changes underneath it.
///
/// # Example
///
/// ```rust
/// use lifecycle::core::{AuditEntry, AuditLog, EntityRef, StateId};
/// use chrono::Utc;
///
/// let activity = EntityRef::new("activity", 1);
/// let log = AuditLog::new()
///     .record(AuditEntry::new(
///         activity.clone(), "submit", Some(5),
///         Some(StateId::new("draft")), StateId::new("submitted"), Utc::now(),
///     ))
///     .record(AuditEntry::new(
///         activity.clone(), "approve", Some(1),
///         Some(StateId::new("submitted")), StateId::new("open"), Utc::now(),
///     ));
///
/// let path: Vec<&str> = log.path(&activity).iter().map(|s| s.as_str()).collect();
/// assert_eq!(path, ["draft", "submitted", "open"]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuditLog {
    entries: Vec<AuditEntry>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn record(&self, entry: AuditEntry) -> Self {
        let mut entries = self.entries.clone();
        entries.push(entry);
        Self { entries }
    }

    /// Append in place. Used by stores that own their log.
    pub(crate) fn push(&mut self, entry: AuditEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn for_entity<'a>(&'a self, entity: &EntityRef) -> impl Iterator<Item = &'a AuditEntry> + 'a {
        let entity = entity.clone();
        self.entries.iter().filter(move |entry| entry.entity == entity)
    }

    /// States one entity went through, starting with the state it left first.
    pub fn path(&self, entity: &EntityRef) -> Vec<&StateId> {
        let mut path = Vec::new();
        let mut entries = self.for_entity(entity).peekable();
        if let Some(first) = entries.peek().copied() {
            if let Some(from) = &first.from {
                path.push(from);
            }
        }
        for entry in entries {
            path.push(&entry.to);
        }
        path
    }

    /// Time between an entity's first and last recorded transition.
    pub fn duration(&self, entity: &EntityRef) -> Option<Duration> {
        let mut entries = self.for_entity(entity);
        let first = entries.next()?;
        let last = entries.last().unwrap_or(first);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }
}
