//! Registered transitions.

use crate::core::{first_unmet, Actor, Condition, Context, Entity, Permission, Source, StateId};
use crate::effects::Effect;
use std::fmt;
use std::sync::Arc;

/// A named, guarded move from a set of source states to one target state.
///
/// Built with [`TransitionBuilder`](crate::builder::TransitionBuilder).
#[derive(Clone)]
pub struct Transition {
    pub name: String,
    pub description: String,
    pub sources: Vec<Source>,
    pub target: StateId,
    /// Automatic transitions are applied by sweeps and cascades without an
    /// actor request, and skip the permission check.
    pub automatic: bool,
    /// All must hold, checked in declared order.
    pub conditions: Vec<Condition>,
    /// Always present on manual transitions.
    pub permission: Option<Permission>,
    pub effects: Vec<Arc<dyn Effect>>,
}

impl Transition {
    pub fn accepts_source(&self, status: Option<&StateId>) -> bool {
        self.sources.iter().any(|source| source.matches(status))
    }

    pub fn is_creation(&self) -> bool {
        self.sources.contains(&Source::Empty)
    }

    /// The first condition that does not hold on `entity`.
    pub fn unmet_condition(&self, entity: &Entity, ctx: &Context<'_>) -> Option<&Condition> {
        first_unmet(&self.conditions, entity, ctx)
    }

    /// Source state matches and every condition holds. Ignores permissions.
    pub fn is_eligible(&self, entity: &Entity, ctx: &Context<'_>) -> bool {
        self.accepts_source(entity.status()) && self.unmet_condition(entity, ctx).is_none()
    }

    /// Permission check. Automatic transitions are permitted for everyone.
    pub fn permits(&self, actor: Option<&Actor>, entity: &Entity, ctx: &Context<'_>) -> bool {
        if self.automatic {
            return true;
        }
        self.permission
            .as_ref()
            .is_some_and(|permission| permission.check(actor, entity, ctx))
    }

    /// A copy of `entity` as it would look right after this transition.
    pub(crate) fn simulate(&self, entity: &Entity) -> Entity {
        let mut simulated = entity.clone();
        simulated.set_status(self.target.clone());
        simulated
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("name", &self.name)
            .field("sources", &self.sources)
            .field("target", &self.target)
            .field("automatic", &self.automatic)
            .field("conditions", &self.conditions)
            .field("permission", &self.permission)
            .field(
                "effects",
                &self.effects.iter().map(|e| e.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
