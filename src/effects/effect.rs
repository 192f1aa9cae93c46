//! The effect protocol.

use super::preview::PreviewContext;
use crate::core::{Actor, Condition, Context, Entity, EntityRef};
use crate::notify::Notification;
use std::sync::Arc;
use thiserror::Error;

/// Failure raised by an effect hook. Aborts the whole unit of work.
#[derive(Debug, Error)]
pub enum EffectError {
    #[error("{0}")]
    Failed(String),

    #[error("Missing field '{field}' on {entity}")]
    MissingField { entity: EntityRef, field: String },
}

/// How a cascaded transition treats a related entity it cannot move.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeMode {
    /// Skip entities whose state or conditions do not allow the transition.
    IfEligible,
    /// Any rejection aborts the whole unit of work.
    Required,
}

/// Work an effect asks the runtime to perform on its behalf.
///
/// Effects never call into another entity's state machine directly; they
/// enqueue intents and the runtime executes them within the same unit of work.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    Transition {
        target: EntityRef,
        transition: String,
        mode: CascadeMode,
    },
    Notify(Notification),
}

/// Nested effects an effect would cause on some (possibly other) entity.
///
/// `entity` is a simulated copy, e.g. with the status it would have after a
/// cascaded transition. It is never persisted. `snapshot` is the entity as
/// stored, which trigger detection compares against.
pub struct Expansion {
    pub snapshot: Entity,
    pub entity: Entity,
    pub effects: Vec<Arc<dyn Effect>>,
}

/// Context handed to effect hooks.
pub struct EffectContext<'a> {
    context: Context<'a>,
    actor: Option<&'a Actor>,
    intents: Vec<Intent>,
}

impl<'a> EffectContext<'a> {
    pub(crate) fn new(context: Context<'a>, actor: Option<&'a Actor>) -> Self {
        Self {
            context,
            actor,
            intents: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context<'a> {
        &self.context
    }

    /// The actor who requested the outermost transition, if any.
    pub fn actor(&self) -> Option<&'a Actor> {
        self.actor
    }

    /// Ask for `transition` to be applied to `target` in the same unit of work.
    pub fn transition(&mut self, target: EntityRef, transition: impl Into<String>, mode: CascadeMode) {
        self.intents.push(Intent::Transition {
            target,
            transition: transition.into(),
            mode,
        });
    }

    pub fn notify(&mut self, notification: Notification) {
        self.intents.push(Intent::Notify(notification));
    }

    pub(crate) fn into_intents(self) -> Vec<Intent> {
        self.intents
    }
}

/// A unit of side work bound to a transition or a trigger.
///
/// Effect definitions are shared across entities; the entity they act on is
/// passed to every hook. Hooks run in declared order: all `pre_save` hooks
/// before the entity is persisted, all `post_save` hooks after. An effect
/// whose [`conditions`](Effect::conditions) do not hold is skipped without
/// failing the transition.
pub trait Effect: Send + Sync {
    /// Stable type name, e.g. `"related_transition"`.
    fn kind(&self) -> &'static str;

    /// Key used to break cycles in previews, together with the entity.
    ///
    /// Defaults to the kind. Effects that can appear several times on one
    /// entity with different targets include their parameters.
    fn identity(&self) -> String {
        self.kind().to_string()
    }

    /// Human-readable line for confirmation screens.
    fn describe(&self, entity: &Entity) -> String;

    fn conditions(&self) -> &[Condition] {
        &[]
    }

    fn pre_save(&self, _entity: &mut Entity, _ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        Ok(())
    }

    fn post_save(&self, _entity: &Entity, _ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        Ok(())
    }

    /// Whether the effect would do anything at all, beyond its own conditions.
    ///
    /// Used by previews only.
    fn would_apply(&self, _entity: &Entity, _ctx: &PreviewContext<'_>) -> bool {
        true
    }

    /// Nested effects this effect would cause, without executing anything.
    fn expand(&self, _entity: &Entity, _ctx: &PreviewContext<'_>) -> Vec<Expansion> {
        Vec::new()
    }
}

/// Whether all of an effect's own conditions hold.
pub(crate) fn effect_applies(effect: &dyn Effect, entity: &Entity, ctx: &Context<'_>) -> bool {
    effect
        .conditions()
        .iter()
        .all(|condition| condition.check(entity, ctx))
}
