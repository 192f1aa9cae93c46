//! Applying transitions within one unit of work.

use super::error::FsmError;
use super::machine::{permission_label, state_label, StateMachine};
use super::store::{Store, Transaction};
use crate::config::Settings;
use crate::core::{Actor, AuditEntry, Context, Entity, EntityRef, Lookup};
use crate::effects::{effect_applies, CascadeMode, Effect, EffectContext, EffectError, Intent, PlannedEffect};
use crate::notify::{DiscardNotifier, Notification, Notifier};
use crate::registry::{MachineDefinition, Registry, Transition};
use crate::triggers::detect_changes;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What one committed engine call did.
#[derive(Clone, Debug)]
pub struct Outcome {
    /// The requested entity as persisted, including changes made by cascades.
    pub entity: Entity,
    /// Every entity written, ordered by reference.
    pub changed: Vec<EntityRef>,
    /// Audit entries in the order transitions were applied.
    pub audit: Vec<AuditEntry>,
    /// Handed to the notifier after commit.
    pub notifications: Vec<Notification>,
}

/// Result of one [`Engine::sweep`].
#[derive(Debug, Default)]
pub struct SweepReport {
    pub examined: usize,
    /// Entity and transition name for each automatic transition applied.
    pub applied: Vec<(EntityRef, String)>,
    /// Entities whose unit of work was discarded, with the reason.
    pub failed: Vec<(EntityRef, FsmError)>,
}

/// Applies transitions, runs their effects and fires triggers.
///
/// Every call is one unit of work: all entity writes and audit entries it
/// produces are handed to [`Store::commit`] together, or not at all when any
/// step fails. Notifications go out only after a successful commit.
///
/// # Example
///
/// ```rust
/// use lifecycle::builder::{MachineBuilder, RegistryBuilder, TransitionBuilder};
/// use lifecycle::core::{Actor, Entity, EntityRef, Permission, State};
/// use lifecycle::runtime::{Engine, MemoryStore};
/// use lifecycle::Settings;
///
/// let activity = MachineBuilder::new("activity")
///     .state(State::new("draft", "Draft").initial())
///     .state(State::new("submitted", "Submitted"))
///     .transition(
///         TransitionBuilder::new("submit")
///             .from("draft")
///             .to("submitted")
///             .permission(Permission::owner("owner")),
///     )
///     .build()
///     .unwrap();
///
/// let engine = Engine::new(
///     RegistryBuilder::new().register(activity).build().unwrap(),
///     Settings::default(),
/// );
///
/// let mut store = MemoryStore::new();
/// let owner = Actor::user(7);
/// engine.create(&mut store, Entity::new("activity", 1).with("owner", 7), Some(&owner)).unwrap();
///
/// let outcome = engine
///     .apply(&mut store, &EntityRef::new("activity", 1), "submit", Some(&owner))
///     .unwrap();
/// assert_eq!(outcome.entity.status().unwrap().as_str(), "submitted");
/// assert_eq!(store.audit().len(), 1);
/// ```
#[derive(Clone)]
pub struct Engine {
    registry: Arc<Registry>,
    settings: Settings,
    notifier: Arc<dyn Notifier>,
}

impl Engine {
    pub fn new(registry: Registry, settings: Settings) -> Self {
        Self {
            registry: Arc::new(registry),
            settings,
            notifier: Arc::new(DiscardNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    fn definition(&self, kind: &str) -> Result<&MachineDefinition, FsmError> {
        self.registry
            .machine(kind)
            .map(Arc::as_ref)
            .ok_or_else(|| FsmError::UnknownEntityType(kind.to_string()))
    }

    /// Bind the workflow of `entity` for inspection.
    pub fn machine<'a>(
        &'a self,
        entity: &'a Entity,
        lookup: &'a dyn Lookup,
    ) -> Result<StateMachine<'a>, FsmError> {
        let definition = self.definition(entity.kind())?;
        let context = Context::new(lookup, &self.settings, Utc::now());
        Ok(StateMachine::new(definition, &self.registry, entity, context))
    }

    /// Everything applying `transition` to `target` would cause. Read-only.
    pub fn preview(
        &self,
        lookup: &dyn Lookup,
        target: &EntityRef,
        transition: &str,
    ) -> Result<Vec<PlannedEffect>, FsmError> {
        let entity = lookup
            .get(target)
            .ok_or_else(|| FsmError::EntityNotFound(target.clone()))?;
        let machine = self.machine(&entity, lookup)?;
        machine.preview(transition)
    }

    /// Apply a manual or automatic transition on behalf of `actor`.
    ///
    /// Checks, in order: the current state is a source, every condition
    /// holds, the actor is permitted. Then runs the transition's effects and
    /// any triggers the change fires, and commits.
    pub fn apply(
        &self,
        store: &mut dyn Store,
        target: &EntityRef,
        transition: &str,
        actor: Option<&Actor>,
    ) -> Result<Outcome, FsmError> {
        let mut run = Run::new(self, store, actor);
        run.apply(target, transition, Origin::Request)?;
        let outcome = run.finish(target)?;
        info!(entity = %target, transition, "transition applied");
        Ok(outcome)
    }

    /// Persist a new entity in its initial state (or the registered state it
    /// already carries). Fires `Created` triggers; records no audit entry.
    pub fn create(
        &self,
        store: &mut dyn Store,
        mut entity: Entity,
        actor: Option<&Actor>,
    ) -> Result<Outcome, FsmError> {
        let definition = self.definition(entity.kind())?;
        let reference = entity.reference().clone();
        if store.get(&reference).is_some() {
            return Err(FsmError::EntityExists(reference));
        }

        let status = entity.status().cloned();
        match status {
            None => entity.set_status(definition.initial_state().id.clone()),
            Some(status) if !definition.has_state(&status) => {
                return Err(FsmError::UnknownState {
                    entity: reference,
                    state: status.to_string(),
                })
            }
            Some(_) => {}
        }

        let mut run = Run::new(self, store, actor);
        run.persist(definition, None, entity, None, None)?;
        let outcome = run.finish(&reference)?;
        info!(entity = %reference, "entity created");
        Ok(outcome)
    }

    /// Persist a new entity by applying a transition from the empty state.
    pub fn create_with(
        &self,
        store: &mut dyn Store,
        entity: Entity,
        transition: &str,
        actor: Option<&Actor>,
    ) -> Result<Outcome, FsmError> {
        let definition = self.definition(entity.kind())?;
        let reference = entity.reference().clone();
        if store.get(&reference).is_some() {
            return Err(FsmError::EntityExists(reference));
        }
        let transition = lookup_transition(definition, transition)?;

        let mut run = Run::new(self, store, actor);
        run.transition(definition, transition, entity, false, Origin::Request)?;
        let outcome = run.finish(&reference)?;
        info!(entity = %reference, transition = %transition.name, "entity created");
        Ok(outcome)
    }

    /// Persist field changes to an existing entity and fire its triggers.
    ///
    /// The status is not a field: changing it here is rejected.
    pub fn save(
        &self,
        store: &mut dyn Store,
        entity: Entity,
        actor: Option<&Actor>,
    ) -> Result<Outcome, FsmError> {
        let definition = self.definition(entity.kind())?;
        let reference = entity.reference().clone();
        let stored = store
            .get(&reference)
            .ok_or_else(|| FsmError::EntityNotFound(reference.clone()))?;
        if stored.status() != entity.status() {
            return Err(FsmError::DirectStatusChange { entity: reference });
        }

        let mut run = Run::new(self, store, actor);
        run.persist(definition, Some(stored), entity, None, None)?;
        let outcome = run.finish(&reference)?;
        debug!(entity = %reference, changed = outcome.changed.len(), "entity saved");
        Ok(outcome)
    }

    /// Apply the first eligible automatic transition to every entity of `kind`.
    ///
    /// Each entity is re-read and handled in its own unit of work, so a
    /// second sweep over unchanged data applies nothing. A failing entity is
    /// recorded in the report and the sweep moves on to the next one.
    pub fn sweep(&self, store: &mut dyn Store, kind: &str) -> Result<SweepReport, FsmError> {
        let definition = self.definition(kind)?;
        let mut report = SweepReport::default();
        if definition.automatic_transitions().next().is_none() {
            return Ok(report);
        }

        let candidates: Vec<EntityRef> = store
            .list(kind)
            .iter()
            .map(|entity| entity.reference().clone())
            .collect();

        for reference in candidates {
            report.examined += 1;
            let mut run = Run::new(self, &mut *store, None);
            let Some(name) = run.first_automatic(definition, &reference) else {
                continue;
            };
            let result = run
                .apply(&reference, &name, Origin::Sweep)
                .and_then(|_| run.finish(&reference));
            match result {
                Ok(_) => {
                    debug!(entity = %reference, transition = %name, "sweep applied transition");
                    report.applied.push((reference, name));
                }
                Err(error) => {
                    warn!(entity = %reference, transition = %name, %error, "sweep could not apply transition");
                    report.failed.push((reference, error));
                }
            }
        }

        info!(
            kind,
            examined = report.examined,
            applied = report.applied.len(),
            failed = report.failed.len(),
            "sweep finished"
        );
        Ok(report)
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("kinds", &self.registry.kinds().collect::<Vec<_>>())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

fn lookup_transition<'d>(
    definition: &'d MachineDefinition,
    name: &str,
) -> Result<&'d Transition, FsmError> {
    definition
        .transition(name)
        .ok_or_else(|| FsmError::TransitionNotFound {
            kind: definition.kind().to_string(),
            transition: name.to_string(),
        })
}

fn effect_failed(entity: &Entity, effect: &dyn Effect, source: EffectError) -> FsmError {
    warn!(
        entity = %entity.reference(),
        effect = %effect.identity(),
        error = %source,
        "effect failed, discarding unit of work"
    );
    FsmError::Effect {
        entity: entity.reference().clone(),
        effect: effect.identity(),
        source,
    }
}

/// Who asked for a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Origin {
    /// An actor, through the public API. Permission is checked.
    Request,
    /// An effect on another entity, within the same unit of work.
    Cascade(CascadeMode),
    Sweep,
}

/// State of one unit of work.
struct Run<'a> {
    engine: &'a Engine,
    tx: Transaction<'a>,
    actor: Option<&'a Actor>,
    now: DateTime<Utc>,
    /// Entities between loading and the end of their `post_save` hooks,
    /// innermost last. Its length is the current cascade depth.
    in_flight: Vec<EntityRef>,
    /// Transition intents waiting for their target to leave `in_flight`.
    deferred: Vec<Intent>,
    /// Each transition is applied to each entity at most once per unit of work.
    applied: HashSet<(EntityRef, String)>,
}

impl<'a> Run<'a> {
    fn new(engine: &'a Engine, store: &'a mut dyn Store, actor: Option<&'a Actor>) -> Self {
        Self {
            engine,
            tx: Transaction::new(store),
            actor,
            now: Utc::now(),
            in_flight: Vec::new(),
            deferred: Vec::new(),
            applied: HashSet::new(),
        }
    }

    fn context(&self) -> Context<'_> {
        Context::new(&self.tx, &self.engine.settings, self.now)
    }

    /// Load `target` and apply `name` to it. `None` when skipped.
    fn apply(
        &mut self,
        target: &EntityRef,
        name: &str,
        origin: Origin,
    ) -> Result<Option<Entity>, FsmError> {
        let engine = self.engine;
        let definition = engine.definition(&target.kind)?;
        let transition = lookup_transition(definition, name)?;
        let entity = self
            .tx
            .get(target)
            .ok_or_else(|| FsmError::EntityNotFound(target.clone()))?;
        self.transition(definition, transition, entity, true, origin)
    }

    fn transition(
        &mut self,
        definition: &'a MachineDefinition,
        transition: &'a Transition,
        entity: Entity,
        stored: bool,
        origin: Origin,
    ) -> Result<Option<Entity>, FsmError> {
        if !self.admit(definition, transition, &entity, origin)? {
            return Ok(None);
        }
        if !self
            .applied
            .insert((entity.reference().clone(), transition.name.clone()))
        {
            debug!(
                entity = %entity.reference(),
                transition = %transition.name,
                "transition already applied in this unit of work, skipping"
            );
            return Ok(None);
        }

        let actor = match origin {
            Origin::Request => self.actor.map(|actor| actor.id),
            Origin::Cascade(_) | Origin::Sweep => None,
        };
        let after = transition.simulate(&entity);
        let before = stored.then_some(entity);
        self.persist(definition, before, after, Some(transition), actor)
            .map(Some)
    }

    /// Whether `transition` may proceed on `entity`.
    ///
    /// `Ok(false)` only for `IfEligible` cascades; every other origin turns a
    /// rejection into an error.
    fn admit(
        &self,
        definition: &MachineDefinition,
        transition: &Transition,
        entity: &Entity,
        origin: Origin,
    ) -> Result<bool, FsmError> {
        if let Some(status) = entity.status() {
            if !definition.has_state(status) {
                return Err(FsmError::UnknownState {
                    entity: entity.reference().clone(),
                    state: status.to_string(),
                });
            }
        }

        let ctx = self.context();
        let rejection = if !transition.accepts_source(entity.status()) {
            Some(FsmError::InvalidTransition {
                entity: entity.reference().clone(),
                transition: transition.name.clone(),
                state: state_label(entity),
            })
        } else if let Some(condition) = transition.unmet_condition(entity, &ctx) {
            Some(FsmError::ConditionNotMet {
                entity: entity.reference().clone(),
                transition: transition.name.clone(),
                condition: condition.description().to_string(),
            })
        } else if origin == Origin::Request && !transition.permits(self.actor, entity, &ctx) {
            Some(FsmError::PermissionDenied {
                entity: entity.reference().clone(),
                transition: transition.name.clone(),
                permission: permission_label(transition),
            })
        } else {
            None
        };

        match rejection {
            None => Ok(true),
            Some(reason) if origin == Origin::Cascade(CascadeMode::IfEligible) => {
                debug!(%reason, "cascade skipped ineligible entity");
                Ok(false)
            }
            Some(reason) => Err(reason),
        }
    }

    /// Run hooks and triggers for `after`, stage it, then run whatever was
    /// deferred until it left `in_flight`.
    fn persist(
        &mut self,
        definition: &'a MachineDefinition,
        before: Option<Entity>,
        after: Entity,
        transition: Option<&'a Transition>,
        actor: Option<u64>,
    ) -> Result<Entity, FsmError> {
        let reference = after.reference().clone();
        let limit = self.engine.settings.max_cascade_depth;
        if self.in_flight.len() > limit {
            warn!(entity = %reference, limit, "cascade depth exceeded");
            return Err(FsmError::CascadeDepthExceeded {
                entity: reference,
                limit,
            });
        }

        self.in_flight.push(reference.clone());
        let result = self.persist_in_flight(definition, before, after, transition, actor);
        self.in_flight.pop();
        let persisted = result?;

        self.run_deferred()?;
        Ok(self.tx.get(&reference).unwrap_or(persisted))
    }

    fn persist_in_flight(
        &mut self,
        definition: &'a MachineDefinition,
        before: Option<Entity>,
        mut after: Entity,
        transition: Option<&'a Transition>,
        actor: Option<u64>,
    ) -> Result<Entity, FsmError> {
        let mut active = Vec::new();
        if let Some(transition) = transition {
            self.pre_save(&transition.effects, &mut after, &mut active)?;
        }

        let fired = detect_changes(definition.triggers(), before.as_ref(), &after, &self.context());
        for trigger in fired {
            debug!(entity = %after.reference(), watch = %trigger.watch, "trigger fired");
            self.pre_save(&trigger.effects, &mut after, &mut active)?;
        }

        self.tx.stage(after.clone());
        if let Some(transition) = transition {
            self.tx.record(AuditEntry::new(
                after.reference().clone(),
                transition.name.clone(),
                actor,
                before.and_then(|entity| entity.status().cloned()),
                transition.target.clone(),
                self.now,
            ));
        }

        for effect in active {
            let intents = {
                let mut ctx = EffectContext::new(self.context(), self.actor);
                effect
                    .post_save(&after, &mut ctx)
                    .map_err(|source| effect_failed(&after, effect.as_ref(), source))?;
                ctx.into_intents()
            };
            self.dispatch(intents)?;
        }
        Ok(after)
    }

    /// Run the `pre_save` hook of every effect whose conditions hold, in
    /// order. Conditions see the writes of the effects before them.
    fn pre_save(
        &mut self,
        effects: &'a [Arc<dyn Effect>],
        entity: &mut Entity,
        active: &mut Vec<&'a Arc<dyn Effect>>,
    ) -> Result<(), FsmError> {
        for effect in effects {
            if !effect_applies(effect.as_ref(), entity, &self.context()) {
                debug!(entity = %entity.reference(), effect = %effect.identity(), "effect conditions not met, skipping");
                continue;
            }

            let intents = {
                let mut ctx = EffectContext::new(self.context(), self.actor);
                effect
                    .pre_save(entity, &mut ctx)
                    .map_err(|source| effect_failed(entity, effect.as_ref(), source))?;
                ctx.into_intents()
            };
            active.push(effect);
            self.dispatch(intents)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, intents: Vec<Intent>) -> Result<(), FsmError> {
        for intent in intents {
            if self.targets_in_flight(&intent) {
                debug!(?intent, "target is mid-transition, deferring");
                self.deferred.push(intent);
                continue;
            }
            match intent {
                Intent::Notify(notification) => self.tx.notify(notification),
                Intent::Transition {
                    target,
                    transition,
                    mode,
                } => {
                    self.apply(&target, &transition, Origin::Cascade(mode))?;
                }
            }
        }
        Ok(())
    }

    fn targets_in_flight(&self, intent: &Intent) -> bool {
        match intent {
            Intent::Transition { target, .. } => self.in_flight.contains(target),
            Intent::Notify(_) => false,
        }
    }

    fn run_deferred(&mut self) -> Result<(), FsmError> {
        while let Some(position) = self
            .deferred
            .iter()
            .position(|intent| !self.targets_in_flight(intent))
        {
            let intent = self.deferred.remove(position);
            self.dispatch(vec![intent])?;
        }
        Ok(())
    }

    fn first_automatic(&self, definition: &MachineDefinition, reference: &EntityRef) -> Option<String> {
        let entity = self.tx.get(reference)?;
        let ctx = self.context();
        definition
            .automatic_transitions()
            .find(|transition| transition.is_eligible(&entity, &ctx))
            .map(|transition| transition.name.clone())
    }

    /// Commit, then hand notifications to the notifier.
    fn finish(self, primary: &EntityRef) -> Result<Outcome, FsmError> {
        let entity = self
            .tx
            .get(primary)
            .ok_or_else(|| FsmError::EntityNotFound(primary.clone()))?;
        let notifier = Arc::clone(&self.engine.notifier);

        let committed = self.tx.commit()?;
        for notification in &committed.notifications {
            notifier.send(notification);
        }
        Ok(Outcome {
            entity,
            changed: committed.entities,
            audit: committed.audit,
            notifications: committed.notifications,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, RegistryBuilder, TransitionBuilder};
    use crate::core::{Condition, Permission, State};
    use crate::effects::{HookEffect, RelatedTransitionEffect, Relation, SetField, TransitionEffect};
    use crate::runtime::MemoryStore;
    use crate::triggers::Trigger;

    // A chain of kinds where each level cascades into the next.
    fn chain(levels: u64) -> Registry {
        let mut builder = RegistryBuilder::new();
        for level in 0..levels {
            let mut transition = TransitionBuilder::new("close")
                .from("open")
                .to("closed")
                .automatic();
            if level + 1 < levels {
                transition = transition.effect(RelatedTransitionEffect::new(
                    Relation::children(&format!("level{}", level + 1), "parent"),
                    "close",
                ));
            }
            builder = builder.register(
                MachineBuilder::new(format!("level{level}"))
                    .state(State::new("open", "Open").initial())
                    .state(State::new("closed", "Closed"))
                    .transition(transition)
                    .build()
                    .unwrap(),
            );
        }
        builder.build().unwrap()
    }

    fn chain_store(levels: u64) -> MemoryStore {
        let mut store = MemoryStore::new();
        for level in 0..levels {
            store.insert(
                Entity::new(format!("level{level}"), 1)
                    .with("parent", 1)
                    .with_status("open"),
            );
        }
        store
    }

    #[test]
    fn cascades_beyond_the_limit_abort_everything() {
        let settings = Settings {
            max_cascade_depth: 2,
            ..Settings::default()
        };
        let engine = Engine::new(chain(5), settings);
        let mut store = chain_store(5);

        let error = engine
            .apply(&mut store, &EntityRef::new("level0", 1), "close", None)
            .unwrap_err();

        assert!(matches!(error, FsmError::CascadeDepthExceeded { limit: 2, .. }));
        assert!(store.audit().is_empty());
        let root = store.get(&EntityRef::new("level0", 1)).unwrap();
        assert_eq!(root.status().unwrap().as_str(), "open");
    }

    #[test]
    fn cascades_within_the_limit_commit_together() {
        let engine = Engine::new(chain(3), Settings::default());
        let mut store = chain_store(3);

        let outcome = engine
            .apply(&mut store, &EntityRef::new("level0", 1), "close", None)
            .unwrap();

        assert_eq!(outcome.changed.len(), 3);
        let applied: Vec<_> = outcome.audit.iter().map(|e| e.entity.kind.clone()).collect();
        assert_eq!(applied, ["level0", "level1", "level2"]);
    }

    fn ordered() -> Registry {
        let machine = MachineBuilder::new("task")
            .state(State::new("todo", "To do").initial())
            .state(State::new("done", "Done"))
            .transition(
                TransitionBuilder::new("finish")
                    .from("todo")
                    .to("done")
                    .permission(Permission::anyone())
                    .effect(SetField::new("a", 1))
                    .effect(
                        SetField::new("b", 2)
                            .when(Condition::new("a is set", |e, _| e.get_i64("a") == Some(1))),
                    )
                    .effect(SetField::new("c", 3).when(Condition::new("never", |_, _| false))),
            )
            .build()
            .unwrap();
        RegistryBuilder::new().register(machine).build().unwrap()
    }

    #[test]
    fn effects_see_earlier_writes_and_skip_on_unmet_conditions() {
        let engine = Engine::new(ordered(), Settings::default());
        let mut store = MemoryStore::new();
        store.insert(Entity::new("task", 1).with_status("todo"));

        let outcome = engine
            .apply(&mut store, &EntityRef::new("task", 1), "finish", None)
            .unwrap();

        assert_eq!(outcome.entity.get_i64("a"), Some(1));
        assert_eq!(outcome.entity.get_i64("b"), Some(2));
        assert!(outcome.entity.get("c").is_none());
    }

    #[test]
    fn save_rejects_status_changes() {
        let engine = Engine::new(ordered(), Settings::default());
        let mut store = MemoryStore::new();
        store.insert(Entity::new("task", 1).with_status("todo"));

        let error = engine
            .save(&mut store, Entity::new("task", 1).with_status("done"), None)
            .unwrap_err();
        assert!(matches!(error, FsmError::DirectStatusChange { .. }));
    }

    #[test]
    fn self_targeted_transitions_wait_until_the_entity_is_staged() {
        let machine = MachineBuilder::new("task")
            .state(State::new("todo", "To do").initial())
            .state(State::new("done", "Done"))
            .transition(
                TransitionBuilder::new("finish")
                    .from("todo")
                    .to("done")
                    .automatic()
                    .when("has progress 100", |e, _| e.get_i64("progress") == Some(100)),
            )
            .trigger(Trigger::field("progress").effect(TransitionEffect::new("finish")))
            .build()
            .unwrap();
        let engine = Engine::new(
            RegistryBuilder::new().register(machine).build().unwrap(),
            Settings::default(),
        );
        let mut store = MemoryStore::new();
        store.insert(Entity::new("task", 1).with_status("todo").with("progress", 10));

        let outcome = engine
            .save(&mut store, Entity::new("task", 1).with_status("todo").with("progress", 50), None)
            .unwrap();
        assert_eq!(outcome.entity.status().unwrap().as_str(), "todo");
        assert!(outcome.audit.is_empty());

        let outcome = engine
            .save(&mut store, Entity::new("task", 1).with_status("todo").with("progress", 100), None)
            .unwrap();
        assert_eq!(outcome.entity.status().unwrap().as_str(), "done");
        assert_eq!(outcome.entity.get_i64("progress"), Some(100));
        assert_eq!(outcome.audit.len(), 1);
    }

    #[test]
    fn failing_post_save_discards_staged_writes() {
        let machine = MachineBuilder::new("task")
            .state(State::new("todo", "To do").initial())
            .state(State::new("done", "Done"))
            .transition(
                TransitionBuilder::new("finish")
                    .from("todo")
                    .to("done")
                    .permission(Permission::anyone())
                    .effect(SetField::new("finished", true))
                    .effect(HookEffect::new("explode", "Fail after saving").post_save(|_, _| {
                        Err(EffectError::Failed("boom".to_string()))
                    })),
            )
            .build()
            .unwrap();
        let engine = Engine::new(
            RegistryBuilder::new().register(machine).build().unwrap(),
            Settings::default(),
        );
        let mut store = MemoryStore::new();
        store.insert(Entity::new("task", 1).with_status("todo"));

        let error = engine
            .apply(&mut store, &EntityRef::new("task", 1), "finish", None)
            .unwrap_err();

        assert!(matches!(error, FsmError::Effect { ref effect, .. } if effect == "hook:explode"));
        let task = store.get(&EntityRef::new("task", 1)).unwrap();
        assert_eq!(task.status().unwrap().as_str(), "todo");
        assert!(task.get("finished").is_none());
        assert!(store.audit().is_empty());
    }

    #[test]
    fn unknown_kinds_and_transitions_are_reported() {
        let engine = Engine::new(ordered(), Settings::default());
        let mut store = MemoryStore::new();
        store.insert(Entity::new("task", 1).with_status("todo"));

        assert!(matches!(
            engine.apply(&mut store, &EntityRef::new("task", 1), "launch", None),
            Err(FsmError::TransitionNotFound { .. })
        ));
        assert!(matches!(
            engine.apply(&mut store, &EntityRef::new("task", 2), "finish", None),
            Err(FsmError::EntityNotFound(_))
        ));
        assert!(matches!(
            engine.create(&mut store, Entity::new("funding", 1), None),
            Err(FsmError::UnknownEntityType(_))
        ));
        assert!(matches!(
            engine.create(&mut store, Entity::new("task", 1), None),
            Err(FsmError::EntityExists(_))
        ));
    }

    fn automatic_chain() -> Registry {
        let machine = MachineBuilder::new("ticket")
            .state(State::new("a", "A").initial())
            .state(State::new("b", "B"))
            .state(State::new("c", "C"))
            .state(State::new("d", "D"))
            .transition(TransitionBuilder::new("first").from("a").to("b").automatic())
            .transition(TransitionBuilder::new("second").from("a").to("c").automatic())
            .transition(
                TransitionBuilder::new("onward")
                    .from("b")
                    .to("d")
                    .automatic()
                    .effect(HookEffect::new("check_lock", "Refuse locked tickets").pre_save(
                        |ticket, _| {
                            if ticket.get_bool("locked") == Some(true) {
                                return Err(EffectError::Failed("ticket is locked".to_string()));
                            }
                            Ok(())
                        },
                    )),
            )
            .build()
            .unwrap();
        RegistryBuilder::new().register(machine).build().unwrap()
    }

    #[test]
    fn sweep_picks_the_first_registered_transition_and_does_not_chain() {
        let engine = Engine::new(automatic_chain(), Settings::default());
        let mut store = MemoryStore::new();
        store.insert(Entity::new("ticket", 1).with_status("a"));

        let report = engine.sweep(&mut store, "ticket").unwrap();
        assert_eq!(report.applied, [(EntityRef::new("ticket", 1), "first".to_string())]);
        let ticket = store.get(&EntityRef::new("ticket", 1)).unwrap();
        assert_eq!(ticket.status().unwrap().as_str(), "b");

        let report = engine.sweep(&mut store, "ticket").unwrap();
        assert_eq!(report.applied, [(EntityRef::new("ticket", 1), "onward".to_string())]);
        let ticket = store.get(&EntityRef::new("ticket", 1)).unwrap();
        assert_eq!(ticket.status().unwrap().as_str(), "d");
    }

    #[test]
    fn sweep_reports_failures_and_keeps_going() {
        let engine = Engine::new(automatic_chain(), Settings::default());
        let mut store = MemoryStore::new();
        store.insert(Entity::new("ticket", 1).with_status("b").with("locked", true));
        store.insert(Entity::new("ticket", 2).with_status("b"));

        let report = engine.sweep(&mut store, "ticket").unwrap();

        assert_eq!(report.examined, 2);
        assert_eq!(report.applied, [(EntityRef::new("ticket", 2), "onward".to_string())]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, EntityRef::new("ticket", 1));
        assert!(matches!(report.failed[0].1, FsmError::Effect { .. }));

        let locked = store.get(&EntityRef::new("ticket", 1)).unwrap();
        assert_eq!(locked.status().unwrap().as_str(), "b");
        assert_eq!(store.audit().len(), 1);
    }
}
