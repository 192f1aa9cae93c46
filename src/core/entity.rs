//! Entities driven by the engine and the actors that act on them.

use super::state::StateId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Identity of one entity: its kind plus its id within that kind.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    pub kind: String,
    pub id: u64,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// A workflow-driven entity.
///
/// The status is the only column the engine owns. `None` means the entity
/// has not been created yet. Every other attribute lives in `fields` and is
/// what triggers watch.
///
/// # Example
///
/// ```rust
/// use lifecycle::core::Entity;
///
/// let mut activity = Entity::new("activity", 1).with("title", "Beach cleanup");
/// activity.set("capacity", 20);
///
/// assert_eq!(activity.get_str("title"), Some("Beach cleanup"));
/// assert_eq!(activity.get_i64("capacity"), Some(20));
/// assert!(activity.status().is_none());
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    reference: EntityRef,
    status: Option<StateId>,
    fields: BTreeMap<String, Value>,
}

impl Entity {
    pub fn new(kind: impl Into<String>, id: u64) -> Self {
        Self {
            reference: EntityRef::new(kind, id),
            status: None,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field assignment.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn reference(&self) -> &EntityRef {
        &self.reference
    }

    pub fn kind(&self) -> &str {
        &self.reference.kind
    }

    pub fn id(&self) -> u64 {
        self.reference.id
    }

    pub fn status(&self) -> Option<&StateId> {
        self.status.as_ref()
    }

    /// Only the runtime moves an entity between states.
    pub(crate) fn set_status(&mut self, status: StateId) {
        self.status = Some(status);
    }

    /// Restore a persisted status, e.g. when loading from a database row.
    pub fn with_status(mut self, status: impl Into<StateId>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    pub fn get_i64(&self, field: &str) -> Option<i64> {
        self.get(field).and_then(Value::as_i64)
    }

    pub fn get_u64(&self, field: &str) -> Option<u64> {
        self.get(field).and_then(Value::as_u64)
    }

    pub fn get_bool(&self, field: &str) -> Option<bool> {
        self.get(field).and_then(Value::as_bool)
    }

    /// Read an RFC 3339 timestamp field. Nulls and malformed values read as `None`.
    pub fn get_datetime(&self, field: &str) -> Option<DateTime<Utc>> {
        self.get_str(field)
            .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
            .map(|parsed| parsed.with_timezone(&Utc))
    }

    /// Whether the field is absent, null or a whitespace-only string.
    pub fn is_blank(&self, field: &str) -> bool {
        match self.get(field) {
            None | Some(Value::Null) => true,
            Some(Value::String(text)) => text.trim().is_empty(),
            Some(_) => false,
        }
    }
}

/// Someone (or something) requesting a transition.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: u64,
    pub staff: bool,
    pub roles: BTreeSet<String>,
}

impl Actor {
    pub fn user(id: u64) -> Self {
        Self {
            id,
            staff: false,
            roles: BTreeSet::new(),
        }
    }

    pub fn staff(id: u64) -> Self {
        Self {
            staff: true,
            ..Self::user(id)
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.insert(role.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}
