//! Builder for constructing transitions.

use crate::builder::error::BuildError;
use crate::core::{Condition, Context, Entity, Permission, Source, StateId};
use crate::effects::Effect;
use crate::registry::Transition;
use std::sync::Arc;

/// Builder for constructing transitions with a fluent API.
///
/// # Example
///
/// ```rust
/// use lifecycle::builder::TransitionBuilder;
/// use lifecycle::core::Permission;
///
/// let submit = TransitionBuilder::new("submit")
///     .from("draft")
///     .from("needs_work")
///     .to("submitted")
///     .when("has a title", |activity, _| !activity.is_blank("title"))
///     .permission(Permission::owner("owner"))
///     .build()
///     .unwrap();
///
/// assert_eq!(submit.sources.len(), 2);
/// assert!(!submit.automatic);
/// ```
pub struct TransitionBuilder {
    name: String,
    description: String,
    sources: Vec<Source>,
    target: Option<StateId>,
    automatic: bool,
    conditions: Vec<Condition>,
    permission: Option<Permission>,
    effects: Vec<Arc<dyn Effect>>,
}

impl TransitionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            sources: Vec::new(),
            target: None,
            automatic: false,
            conditions: Vec::new(),
            permission: None,
            effects: Vec::new(),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a source state (at least one required).
    pub fn from(mut self, state: impl Into<Source>) -> Self {
        let source = state.into();
        if !self.sources.contains(&source) {
            self.sources.push(source);
        }
        self
    }

    /// Allow the transition on entities that do not exist yet.
    pub fn from_empty(self) -> Self {
        self.from(Source::Empty)
    }

    /// Set the target state (required).
    pub fn to(mut self, state: impl Into<StateId>) -> Self {
        self.target = Some(state.into());
        self
    }

    pub fn automatic(mut self) -> Self {
        self.automatic = true;
        self
    }

    /// Add a pre-built condition.
    pub fn condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a condition from a closure.
    pub fn when<F>(self, description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Entity, &Context<'_>) -> bool + Send + Sync + 'static,
    {
        self.condition(Condition::new(description, predicate))
    }

    /// Required for manual transitions.
    pub fn permission(mut self, permission: Permission) -> Self {
        self.permission = Some(permission);
        self
    }

    pub fn effect(mut self, effect: impl Effect + 'static) -> Self {
        self.effects.push(Arc::new(effect));
        self
    }

    pub fn shared_effect(mut self, effect: Arc<dyn Effect>) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn build(self) -> Result<Transition, BuildError> {
        if self.name.is_empty() {
            return Err(BuildError::MissingName);
        }
        if self.sources.is_empty() {
            return Err(BuildError::MissingSources {
                transition: self.name,
            });
        }
        let Some(target) = self.target else {
            return Err(BuildError::MissingTarget {
                transition: self.name,
            });
        };
        if !self.automatic && self.permission.is_none() {
            return Err(BuildError::MissingPermission {
                transition: self.name,
            });
        }

        Ok(Transition {
            name: self.name,
            description: self.description,
            sources: self.sources,
            target,
            automatic: self.automatic,
            conditions: self.conditions,
            permission: self.permission,
            effects: self.effects,
        })
    }
}
