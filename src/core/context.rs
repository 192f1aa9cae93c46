//! Read-only evaluation context shared by conditions, permissions and effects.

use super::entity::{Entity, EntityRef};
use crate::config::Settings;
use chrono::{DateTime, Utc};

/// Read access to entities.
///
/// Implemented by stores and by the unit of work, which layers staged
/// writes over the store.
pub trait Lookup {
    fn get(&self, entity: &EntityRef) -> Option<Entity>;

    /// All entities of one kind, ordered by id.
    fn list(&self, kind: &str) -> Vec<Entity>;
}

/// Everything a predicate may consult besides the entity itself.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    lookup: &'a dyn Lookup,
    settings: &'a Settings,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub fn new(lookup: &'a dyn Lookup, settings: &'a Settings, now: DateTime<Utc>) -> Self {
        Self {
            lookup,
            settings,
            now,
        }
    }

    pub fn lookup(&self) -> &'a dyn Lookup {
        self.lookup
    }

    pub fn settings(&self) -> &'a Settings {
        self.settings
    }

    /// The instant the current operation started. Fixed for its whole duration.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn get(&self, entity: &EntityRef) -> Option<Entity> {
        self.lookup.get(entity)
    }

    /// Entities of `kind` whose `field` holds `id`, e.g. the contributors of one activity.
    pub fn related(&self, kind: &str, field: &str, id: u64) -> Vec<Entity> {
        self.lookup
            .list(kind)
            .into_iter()
            .filter(|candidate| candidate.get_u64(field) == Some(id))
            .collect()
    }

    pub fn feature(&self, name: &str) -> bool {
        self.settings.feature(name)
    }
}
