//! Field-change triggers.
//!
//! A trigger binds a watched attribute to conditions and effects,
//! independently of named transitions. The runtime snapshots an entity right
//! before a change is persisted, compares it with the changed entity and
//! fires every trigger whose watch matched and whose conditions hold, in
//! registration order. Fired effects follow the same pre/post hook protocol
//! as transition effects and commit in the same unit of work.

use crate::core::{Condition, Context, Entity};
use crate::effects::Effect;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// What a trigger watches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Watch {
    /// One named field changed value.
    Field(String),
    /// Any field changed value.
    AnyField,
    /// The entity was just created.
    Created,
}

impl fmt::Display for Watch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Field(name) => write!(f, "{name} changed"),
            Self::AnyField => f.write_str("any field changed"),
            Self::Created => f.write_str("created"),
        }
    }
}

/// # Example
///
/// ```rust
/// use lifecycle::triggers::{Trigger, Watch};
/// use lifecycle::effects::TransitionEffect;
///
/// let trigger = Trigger::field("deadline").effect(TransitionEffect::new("succeed"));
/// assert_eq!(trigger.watch, Watch::Field("deadline".into()));
/// ```
#[derive(Clone)]
pub struct Trigger {
    pub watch: Watch,
    pub conditions: Vec<Condition>,
    pub effects: Vec<Arc<dyn Effect>>,
}

impl Trigger {
    pub fn new(watch: Watch) -> Self {
        Self {
            watch,
            conditions: Vec::new(),
            effects: Vec::new(),
        }
    }

    pub fn field(name: impl Into<String>) -> Self {
        Self::new(Watch::Field(name.into()))
    }

    pub fn any_field() -> Self {
        Self::new(Watch::AnyField)
    }

    pub fn created() -> Self {
        Self::new(Watch::Created)
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn effect(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }

    /// Whether the watched attribute differs between the snapshot and the
    /// changed entity. A missing snapshot means the entity is being created.
    pub fn watches_change(&self, before: Option<&Entity>, after: &Entity) -> bool {
        match (&self.watch, before) {
            (Watch::Created, before) => before.is_none(),
            (_, None) => false,
            (Watch::Field(name), Some(before)) => field_changed(before, after, name),
            (Watch::AnyField, Some(before)) => {
                let mut names = before.fields().keys().chain(after.fields().keys());
                names.any(|name| field_changed(before, after, name))
            }
        }
    }

    fn conditions_hold(&self, entity: &Entity, ctx: &Context<'_>) -> bool {
        self.conditions.iter().all(|c| c.check(entity, ctx))
    }
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("watch", &self.watch)
            .field("conditions", &self.conditions)
            .field(
                "effects",
                &self.effects.iter().map(|e| e.kind()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A missing field and an explicit null compare equal.
fn field_changed(before: &Entity, after: &Entity, name: &str) -> bool {
    let old = before.get(name).unwrap_or(&Value::Null);
    let new = after.get(name).unwrap_or(&Value::Null);
    old != new
}

/// Triggers that fire for the change from `before` to `after`, in registration order.
pub fn detect_changes<'t>(
    triggers: &'t [Trigger],
    before: Option<&Entity>,
    after: &Entity,
    ctx: &Context<'_>,
) -> Vec<&'t Trigger> {
    triggers
        .iter()
        .filter(|trigger| trigger.watches_change(before, after))
        .filter(|trigger| trigger.conditions_hold(after, ctx))
        .collect()
}
