//! Effects shipped with the engine.

use super::effect::{CascadeMode, Effect, EffectContext, EffectError, Expansion};
use super::preview::PreviewContext;
use crate::core::{Condition, Context, Entity, EntityRef};
use crate::notify::Notification;
use serde_json::{json, Value};
use std::sync::Arc;

type ComputeFn = dyn Fn(&Entity, &Context<'_>) -> Value + Send + Sync;
type ResolveFn = dyn Fn(&Entity, &Context<'_>) -> Vec<Entity> + Send + Sync;
type RecipientsFn = dyn Fn(&Entity, &Context<'_>) -> Vec<u64> + Send + Sync;
type NotificationContextFn = dyn Fn(&Entity) -> Value + Send + Sync;
type PreHookFn = dyn Fn(&mut Entity, &mut EffectContext<'_>) -> Result<(), EffectError> + Send + Sync;
type PostHookFn = dyn Fn(&Entity, &mut EffectContext<'_>) -> Result<(), EffectError> + Send + Sync;

#[derive(Clone)]
enum Assignment {
    Static(Value),
    Computed {
        description: String,
        compute: Arc<ComputeFn>,
    },
}

/// Assigns a field before the entity is persisted.
#[derive(Clone)]
pub struct SetField {
    field: String,
    value: Assignment,
    conditions: Vec<Condition>,
}

impl SetField {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: Assignment::Static(value.into()),
            conditions: Vec::new(),
        }
    }

    /// Assign a value computed from the entity at pre-save time.
    pub fn computed<F>(field: impl Into<String>, description: impl Into<String>, compute: F) -> Self
    where
        F: Fn(&Entity, &Context<'_>) -> Value + Send + Sync + 'static,
    {
        Self {
            field: field.into(),
            value: Assignment::Computed {
                description: description.into(),
                compute: Arc::new(compute),
            },
            conditions: Vec::new(),
        }
    }

    /// Clear the field to null.
    pub fn clear(field: impl Into<String>) -> Self {
        Self::new(field, Value::Null)
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

impl Effect for SetField {
    fn kind(&self) -> &'static str {
        "set_field"
    }

    fn identity(&self) -> String {
        format!("set_field:{}", self.field)
    }

    fn describe(&self, _entity: &Entity) -> String {
        match &self.value {
            Assignment::Static(Value::Null) => format!("Clear {}", self.field),
            Assignment::Static(value) => format!("Set {} to {}", self.field, value),
            Assignment::Computed { description, .. } => {
                format!("Set {} to {}", self.field, description)
            }
        }
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn pre_save(&self, entity: &mut Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        let value = match &self.value {
            Assignment::Static(value) => value.clone(),
            Assignment::Computed { compute, .. } => compute(entity, ctx.context()),
        };
        entity.set(self.field.clone(), value);
        Ok(())
    }
}

/// Applies a transition to the same entity once it has been persisted.
///
/// Skipped when the transition is not eligible at that point. Typically
/// attached to triggers to re-evaluate automatic transitions after a change.
#[derive(Clone)]
pub struct TransitionEffect {
    transition: String,
    conditions: Vec<Condition>,
}

impl TransitionEffect {
    pub fn new(transition: impl Into<String>) -> Self {
        Self {
            transition: transition.into(),
            conditions: Vec::new(),
        }
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

impl Effect for TransitionEffect {
    fn kind(&self) -> &'static str {
        "transition"
    }

    fn identity(&self) -> String {
        format!("transition:{}", self.transition)
    }

    fn describe(&self, entity: &Entity) -> String {
        format!("Apply '{}' to {}", self.transition, entity.kind())
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn post_save(&self, entity: &Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        ctx.transition(
            entity.reference().clone(),
            self.transition.clone(),
            CascadeMode::IfEligible,
        );
        Ok(())
    }

    fn would_apply(&self, entity: &Entity, ctx: &PreviewContext<'_>) -> bool {
        ctx.transition_for(entity, &self.transition)
            .is_some_and(|t| t.is_eligible(entity, ctx.context()))
    }

    fn expand(&self, entity: &Entity, ctx: &PreviewContext<'_>) -> Vec<Expansion> {
        ctx.transition_for(entity, &self.transition)
            .filter(|t| t.is_eligible(entity, ctx.context()))
            .map(|t| Expansion {
                snapshot: entity.clone(),
                entity: t.simulate(entity),
                effects: t.effects.clone(),
            })
            .into_iter()
            .collect()
    }
}

/// How to find the entities related to another one.
#[derive(Clone)]
pub struct Relation {
    name: String,
    resolve: Arc<ResolveFn>,
}

impl Relation {
    pub fn new<F>(name: impl Into<String>, resolve: F) -> Self
    where
        F: Fn(&Entity, &Context<'_>) -> Vec<Entity> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            resolve: Arc::new(resolve),
        }
    }

    /// Entities of `kind` whose `field` points back at the entity.
    pub fn children(kind: impl Into<String>, field: impl Into<String>) -> Self {
        let kind = kind.into();
        let field = field.into();
        Self::new(format!("{kind}.{field}"), move |entity, ctx| {
            ctx.related(&kind, &field, entity.id())
        })
    }

    /// The entity of `kind` that `field` of the entity points at.
    pub fn parent(field: impl Into<String>, kind: impl Into<String>) -> Self {
        let field = field.into();
        let kind = kind.into();
        Self::new(field.clone(), move |entity, ctx| {
            entity
                .get_u64(&field)
                .and_then(|id| ctx.get(&EntityRef::new(kind.clone(), id)))
                .into_iter()
                .collect()
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolve(&self, entity: &Entity, ctx: &Context<'_>) -> Vec<Entity> {
        (self.resolve)(entity, ctx)
    }
}

/// Applies a transition to every related entity in the same unit of work.
///
/// # Example
///
/// ```rust
/// use lifecycle::effects::{Effect, Relation, RelatedTransitionEffect};
/// use lifecycle::core::Entity;
///
/// let fail_contributors =
///     RelatedTransitionEffect::new(Relation::children("contributor", "activity"), "fail");
///
/// assert_eq!(fail_contributors.identity(), "related_transition:contributor.activity:fail");
/// assert_eq!(
///     fail_contributors.describe(&Entity::new("activity", 1)),
///     "Apply 'fail' to related contributor.activity"
/// );
/// ```
#[derive(Clone)]
pub struct RelatedTransitionEffect {
    relation: Relation,
    transition: String,
    mode: CascadeMode,
    conditions: Vec<Condition>,
}

impl RelatedTransitionEffect {
    pub fn new(relation: Relation, transition: impl Into<String>) -> Self {
        Self {
            relation,
            transition: transition.into(),
            mode: CascadeMode::IfEligible,
            conditions: Vec::new(),
        }
    }

    /// Fail the whole unit of work when a related entity cannot be moved,
    /// instead of skipping it.
    pub fn required(mut self) -> Self {
        self.mode = CascadeMode::Required;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

impl Effect for RelatedTransitionEffect {
    fn kind(&self) -> &'static str {
        "related_transition"
    }

    fn identity(&self) -> String {
        format!("related_transition:{}:{}", self.relation.name, self.transition)
    }

    fn describe(&self, _entity: &Entity) -> String {
        format!(
            "Apply '{}' to related {}",
            self.transition, self.relation.name
        )
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn post_save(&self, entity: &Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        let related = self.relation.resolve(entity, ctx.context());
        for other in related {
            ctx.transition(other.reference().clone(), self.transition.clone(), self.mode);
        }
        Ok(())
    }

    fn would_apply(&self, entity: &Entity, ctx: &PreviewContext<'_>) -> bool {
        !self.expand(entity, ctx).is_empty()
    }

    fn expand(&self, entity: &Entity, ctx: &PreviewContext<'_>) -> Vec<Expansion> {
        self.relation
            .resolve(entity, ctx.context())
            .into_iter()
            .filter_map(|other| {
                let transition = ctx.transition_for(&other, &self.transition)?;
                transition
                    .is_eligible(&other, ctx.context())
                    .then(|| Expansion {
                        entity: transition.simulate(&other),
                        effects: transition.effects.clone(),
                        snapshot: other,
                    })
            })
            .collect()
    }
}

/// Hands a message off to the notifier after the entity is persisted.
#[derive(Clone)]
pub struct NotificationEffect {
    template: String,
    audience: String,
    recipients: Arc<RecipientsFn>,
    context: Option<Arc<NotificationContextFn>>,
    conditions: Vec<Condition>,
}

impl NotificationEffect {
    /// `audience` names the recipients for confirmation screens, e.g. "the owner".
    pub fn new<F>(template: impl Into<String>, audience: impl Into<String>, recipients: F) -> Self
    where
        F: Fn(&Entity, &Context<'_>) -> Vec<u64> + Send + Sync + 'static,
    {
        Self {
            template: template.into(),
            audience: audience.into(),
            recipients: Arc::new(recipients),
            context: None,
            conditions: Vec::new(),
        }
    }

    /// Send to the user whose id is stored in `field`.
    pub fn to_field(template: impl Into<String>, field: impl Into<String>) -> Self {
        let field = field.into();
        let audience = format!("the {field}");
        Self::new(template, audience, move |entity, _| {
            entity.get_u64(&field).into_iter().collect()
        })
    }

    pub fn with_context<F>(mut self, context: F) -> Self
    where
        F: Fn(&Entity) -> Value + Send + Sync + 'static,
    {
        self.context = Some(Arc::new(context));
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

impl Effect for NotificationEffect {
    fn kind(&self) -> &'static str {
        "notification"
    }

    fn identity(&self) -> String {
        format!("notification:{}", self.template)
    }

    fn describe(&self, _entity: &Entity) -> String {
        format!("Send '{}' to {}", self.template, self.audience)
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn post_save(&self, entity: &Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        let recipients = (self.recipients)(entity, ctx.context());
        if recipients.is_empty() {
            tracing::debug!(
                template = %self.template,
                entity = %entity.reference(),
                "notification has no recipients, skipping"
            );
            return Ok(());
        }
        let context = match &self.context {
            Some(build) => build(entity),
            None => json!({
                "kind": entity.kind(),
                "id": entity.id(),
                "status": entity.status(),
            }),
        };
        ctx.notify(Notification {
            subject: entity.reference().clone(),
            recipients,
            template: self.template.clone(),
            context,
        });
        Ok(())
    }
}

/// Closure-backed effect for domain-specific work.
///
/// # Example
///
/// ```rust
/// use lifecycle::effects::{Effect, EffectError, HookEffect};
///
/// let stamp = HookEffect::new("stamp_review", "Record the reviewer")
///     .pre_save(|activity, ctx| {
///         let reviewer = ctx.actor().ok_or_else(|| EffectError::Failed("no reviewer".into()))?;
///         activity.set("reviewed_by", reviewer.id);
///         Ok(())
///     });
///
/// assert_eq!(stamp.identity(), "hook:stamp_review");
/// ```
#[derive(Clone)]
pub struct HookEffect {
    name: String,
    description: String,
    pre: Option<Arc<PreHookFn>>,
    post: Option<Arc<PostHookFn>>,
    conditions: Vec<Condition>,
}

impl HookEffect {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            pre: None,
            post: None,
            conditions: Vec::new(),
        }
    }

    pub fn pre_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&mut Entity, &mut EffectContext<'_>) -> Result<(), EffectError> + Send + Sync + 'static,
    {
        self.pre = Some(Arc::new(hook));
        self
    }

    pub fn post_save<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Entity, &mut EffectContext<'_>) -> Result<(), EffectError> + Send + Sync + 'static,
    {
        self.post = Some(Arc::new(hook));
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }
}

impl Effect for HookEffect {
    fn kind(&self) -> &'static str {
        "hook"
    }

    fn identity(&self) -> String {
        format!("hook:{}", self.name)
    }

    fn describe(&self, _entity: &Entity) -> String {
        self.description.clone()
    }

    fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    fn pre_save(&self, entity: &mut Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        match &self.pre {
            Some(hook) => hook(entity, ctx),
            None => Ok(()),
        }
    }

    fn post_save(&self, entity: &Entity, ctx: &mut EffectContext<'_>) -> Result<(), EffectError> {
        match &self.post {
            Some(hook) => hook(entity, ctx),
            None => Ok(()),
        }
    }
}
