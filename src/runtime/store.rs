//! Persistence boundary and the unit of work.

use super::error::StoreError;
use crate::core::{AuditEntry, AuditLog, Entity, EntityRef, Lookup};
use crate::notify::Notification;
use std::collections::BTreeMap;

/// Everything one engine call wants persisted.
#[derive(Clone, Debug, Default)]
pub struct Changeset {
    pub entities: Vec<Entity>,
    pub audit: Vec<AuditEntry>,
}

/// Persistence adapter.
///
/// `commit` is the atomic unit the engine relies on: either every entity
/// write and audit entry in the changeset lands, or none does.
pub trait Store: Lookup {
    fn commit(&mut self, changes: Changeset) -> Result<(), StoreError>;
}

/// In-memory store keeping entities and the audit trail.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    entities: BTreeMap<EntityRef, Entity>,
    audit: AuditLog,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an entity directly, bypassing the engine. For fixtures and imports.
    pub fn insert(&mut self, entity: Entity) {
        self.entities.insert(entity.reference().clone(), entity);
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl Lookup for MemoryStore {
    fn get(&self, entity: &EntityRef) -> Option<Entity> {
        self.entities.get(entity).cloned()
    }

    fn list(&self, kind: &str) -> Vec<Entity> {
        self.entities
            .values()
            .filter(|entity| entity.kind() == kind)
            .cloned()
            .collect()
    }
}

impl Store for MemoryStore {
    fn commit(&mut self, changes: Changeset) -> Result<(), StoreError> {
        // Validate everything before touching anything.
        if let Some(entity) = changes.entities.iter().find(|e| e.status().is_none()) {
            return Err(StoreError::Rejected {
                entity: entity.reference().clone(),
                reason: "entity has no status".to_string(),
            });
        }

        for entity in changes.entities {
            self.entities.insert(entity.reference().clone(), entity);
        }
        for entry in changes.audit {
            self.audit.push(entry);
        }
        Ok(())
    }
}

/// Staged writes of one engine call, layered over the store.
///
/// Reads see staged entities first. Nothing reaches the store until
/// [`commit`](Transaction::commit); dropping the transaction discards it.
pub(crate) struct Transaction<'a> {
    store: &'a mut dyn Store,
    staged: BTreeMap<EntityRef, Entity>,
    audit: Vec<AuditEntry>,
    outbox: Vec<Notification>,
}

pub(crate) struct Committed {
    pub entities: Vec<EntityRef>,
    pub audit: Vec<AuditEntry>,
    pub notifications: Vec<Notification>,
}

impl<'a> Transaction<'a> {
    pub fn new(store: &'a mut dyn Store) -> Self {
        Self {
            store,
            staged: BTreeMap::new(),
            audit: Vec::new(),
            outbox: Vec::new(),
        }
    }

    pub fn stage(&mut self, entity: Entity) {
        self.staged.insert(entity.reference().clone(), entity);
    }

    pub fn record(&mut self, entry: AuditEntry) {
        self.audit.push(entry);
    }

    pub fn notify(&mut self, notification: Notification) {
        self.outbox.push(notification);
    }

    pub fn commit(self) -> Result<Committed, StoreError> {
        let entities: Vec<EntityRef> = self.staged.keys().cloned().collect();
        let changes = Changeset {
            entities: self.staged.into_values().collect(),
            audit: self.audit.clone(),
        };
        self.store.commit(changes)?;
        Ok(Committed {
            entities,
            audit: self.audit,
            notifications: self.outbox,
        })
    }
}

impl Lookup for Transaction<'_> {
    fn get(&self, entity: &EntityRef) -> Option<Entity> {
        self.staged
            .get(entity)
            .cloned()
            .or_else(|| self.store.get(entity))
    }

    fn list(&self, kind: &str) -> Vec<Entity> {
        let mut merged: BTreeMap<u64, Entity> = self
            .store
            .list(kind)
            .into_iter()
            .map(|entity| (entity.id(), entity))
            .collect();
        for (reference, entity) in &self.staged {
            if reference.kind == kind {
                merged.insert(reference.id, entity.clone());
            }
        }
        merged.into_values().collect()
    }
}
