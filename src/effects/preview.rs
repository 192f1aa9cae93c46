//! Read-only expansion of everything an effect list would cause.
//!
//! Used by confirmation screens to show "the following will also happen"
//! before a manual transition is confirmed. Nothing is executed and nothing
//! is persisted; nested effects are evaluated against simulated copies.

use super::effect::{effect_applies, Effect, EffectContext};
use crate::core::{Context, Entity, EntityRef};
use crate::registry::{Registry, Transition};
use crate::triggers::detect_changes;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Evaluation context for previews.
#[derive(Clone, Copy)]
pub struct PreviewContext<'a> {
    context: Context<'a>,
    registry: &'a Registry,
}

impl<'a> PreviewContext<'a> {
    pub fn new(context: Context<'a>, registry: &'a Registry) -> Self {
        Self { context, registry }
    }

    pub fn context(&self) -> &Context<'a> {
        &self.context
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    /// The transition `name` registered for the kind of `entity`.
    pub fn transition_for(&self, entity: &Entity, name: &str) -> Option<&'a Transition> {
        self.registry.machine(entity.kind())?.transition(name)
    }
}

/// One effect that would run, bound to the entity it would run on.
#[derive(Clone)]
pub struct PlannedEffect {
    pub entity: EntityRef,
    pub effect: Arc<dyn Effect>,
    pub description: String,
    /// 0 for the effects listed directly, +1 per nesting level
    pub depth: usize,
}

impl fmt::Debug for PlannedEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedEffect")
            .field("entity", &self.entity)
            .field("kind", &self.effect.kind())
            .field("description", &self.description)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Depth-first expansion of `effects` on `entity`.
///
/// An effect is listed when its own conditions hold, followed by everything
/// it would cause. Each listed effect's `pre_save` hook runs on a scratch
/// copy, so later effects are judged against the writes of earlier ones.
/// Each `(entity, effect identity)` pair is listed at most once: when a
/// self-referential effect graph leads back to a pair already listed, that
/// branch is treated as exhausted, not as an error.
pub fn all_effects(
    effects: &[Arc<dyn Effect>],
    entity: &Entity,
    ctx: &PreviewContext<'_>,
) -> Vec<PlannedEffect> {
    let mut visited = HashSet::new();
    let mut planned = Vec::new();
    expand_into(effects, entity, ctx, 0, &mut visited, &mut planned);
    planned
}

/// Everything applying `transition` to `entity` would cause, including the
/// triggers its own field writes would fire.
pub fn transition_effects(
    transition: &Transition,
    entity: &Entity,
    ctx: &PreviewContext<'_>,
) -> Vec<PlannedEffect> {
    let snapshot = entity.status().is_some().then_some(entity);
    let simulated = transition.simulate(entity);
    let mut visited = HashSet::new();
    let mut planned = Vec::new();
    expand_change(
        &transition.effects,
        snapshot,
        &simulated,
        ctx,
        0,
        &mut visited,
        &mut planned,
    );
    planned
}

/// Expand `effects` on `entity`, then the triggers the resulting writes fire
/// relative to `snapshot`.
fn expand_change(
    effects: &[Arc<dyn Effect>],
    snapshot: Option<&Entity>,
    entity: &Entity,
    ctx: &PreviewContext<'_>,
    depth: usize,
    visited: &mut HashSet<(EntityRef, String)>,
    planned: &mut Vec<PlannedEffect>,
) {
    let mut written = expand_into(effects, entity, ctx, depth, visited, planned);
    let Some(machine) = ctx.registry().machine(written.kind()) else {
        return;
    };
    for trigger in detect_changes(machine.triggers(), snapshot, &written, ctx.context()) {
        written = expand_into(&trigger.effects, &written, ctx, depth, visited, planned);
    }
}

/// Returns `entity` with the `pre_save` writes of every listed effect.
fn expand_into(
    effects: &[Arc<dyn Effect>],
    entity: &Entity,
    ctx: &PreviewContext<'_>,
    depth: usize,
    visited: &mut HashSet<(EntityRef, String)>,
    planned: &mut Vec<PlannedEffect>,
) -> Entity {
    let mut current = entity.clone();
    if depth > ctx.context().settings().max_cascade_depth {
        tracing::warn!(entity = %entity.reference(), depth, "preview stopped at cascade depth limit");
        return current;
    }

    for effect in effects {
        let key = (current.reference().clone(), effect.identity());
        if visited.contains(&key) {
            tracing::debug!(entity = %key.0, effect = %key.1, "preview already listed effect, skipping");
            continue;
        }
        if !effect_applies(effect.as_ref(), &current, ctx.context())
            || !effect.would_apply(&current, ctx)
        {
            continue;
        }

        visited.insert(key);
        planned.push(PlannedEffect {
            entity: current.reference().clone(),
            effect: Arc::clone(effect),
            description: effect.describe(&current),
            depth,
        });
        current = simulate_pre_save(effect.as_ref(), current, ctx);

        for expansion in effect.expand(&current, ctx) {
            expand_change(
                &expansion.effects,
                Some(&expansion.snapshot),
                &expansion.entity,
                ctx,
                depth + 1,
                visited,
                planned,
            );
        }
    }
    current
}

/// Run the `pre_save` hook on a copy. Intents are discarded; a failing hook
/// leaves the entity as it was.
fn simulate_pre_save(effect: &dyn Effect, entity: Entity, ctx: &PreviewContext<'_>) -> Entity {
    let mut written = entity.clone();
    let mut scratch = EffectContext::new(*ctx.context(), None);
    match effect.pre_save(&mut written, &mut scratch) {
        Ok(()) => written,
        Err(error) => {
            tracing::debug!(
                entity = %entity.reference(),
                effect = %effect.identity(),
                %error,
                "effect would fail, preview keeps the entity unchanged"
            );
            entity
        }
    }
}
