//! Condition and permission predicates.
//!
//! Both are pure boolean functions. Conditions gate transitions and effects
//! on the entity alone; permissions gate manual transitions on the actor.
//! They are evaluated repeatedly (for availability listings and again on
//! apply), so they must not have side effects.

use super::context::Context;
use super::entity::{Actor, Entity};
use std::fmt;
use std::sync::Arc;

type ConditionFn = dyn Fn(&Entity, &Context<'_>) -> bool + Send + Sync;
type PermissionFn = dyn Fn(Option<&Actor>, &Entity, &Context<'_>) -> bool + Send + Sync;

/// A described predicate over an entity.
///
/// The description is what gets reported when the condition blocks a
/// transition, so phrase it as the requirement: "has an end date in the past".
///
/// # Example
///
/// ```rust
/// use lifecycle::core::{Condition, Context, Entity, Lookup, EntityRef};
/// use lifecycle::Settings;
/// use chrono::Utc;
///
/// struct Nothing;
/// impl Lookup for Nothing {
///     fn get(&self, _: &EntityRef) -> Option<Entity> { None }
///     fn list(&self, _: &str) -> Vec<Entity> { Vec::new() }
/// }
///
/// let has_title = Condition::new("has a title", |entity, _| !entity.is_blank("title"));
///
/// let settings = Settings::default();
/// let ctx = Context::new(&Nothing, &settings, Utc::now());
///
/// assert!(has_title.check(&Entity::new("activity", 1).with("title", "Cleanup"), &ctx));
/// assert!(!has_title.check(&Entity::new("activity", 2), &ctx));
/// ```
#[derive(Clone)]
pub struct Condition {
    description: Arc<str>,
    predicate: Arc<ConditionFn>,
}

impl Condition {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&Entity, &Context<'_>) -> bool + Send + Sync + 'static,
    {
        Condition {
            description: description.into().into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn check(&self, entity: &Entity, ctx: &Context<'_>) -> bool {
        (self.predicate)(entity, ctx)
    }

    /// The negated condition, described as "not (...)".
    pub fn negate(self) -> Self {
        let description = format!("not ({})", self.description);
        Condition::new(description, move |entity, ctx| !self.check(entity, ctx))
    }
}

impl fmt::Debug for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Condition").field(&self.description).finish()
    }
}

/// The first condition in `conditions` that does not hold, if any.
pub fn first_unmet<'c>(
    conditions: &'c [Condition],
    entity: &Entity,
    ctx: &Context<'_>,
) -> Option<&'c Condition> {
    conditions.iter().find(|condition| !condition.check(entity, ctx))
}

/// A described predicate over `(actor, entity)`.
///
/// Composite permissions are built with [`Permission::or`], [`Permission::and`]
/// and [`Permission::negate`] rather than by wrapping closures by hand. The actor
/// is `None` for anonymous callers.
#[derive(Clone)]
pub struct Permission {
    description: Arc<str>,
    predicate: Arc<PermissionFn>,
}

impl Permission {
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(Option<&Actor>, &Entity, &Context<'_>) -> bool + Send + Sync + 'static,
    {
        Permission {
            description: description.into().into(),
            predicate: Arc::new(predicate),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn check(&self, actor: Option<&Actor>, entity: &Entity, ctx: &Context<'_>) -> bool {
        (self.predicate)(actor, entity, ctx)
    }

    /// Anyone, including anonymous callers.
    pub fn anyone() -> Self {
        Permission::new("anyone", |_, _, _| true)
    }

    /// Any authenticated actor.
    pub fn authenticated() -> Self {
        Permission::new("is authenticated", |actor, _, _| actor.is_some())
    }

    pub fn staff() -> Self {
        Permission::new("is staff", |actor, _, _| actor.is_some_and(|a| a.staff))
    }

    /// The actor's id is stored in `field` of the entity.
    pub fn owner(field: &str) -> Self {
        let field = field.to_string();
        Permission::new(format!("is {field}"), move |actor, entity, _| match actor {
            Some(actor) => entity.get_u64(&field) == Some(actor.id),
            None => false,
        })
    }

    pub fn role(role: &str) -> Self {
        let role = role.to_string();
        Permission::new(format!("has role {role}"), move |actor, _, _| {
            actor.is_some_and(|a| a.has_role(&role))
        })
    }

    pub fn or(self, other: Permission) -> Self {
        let description = format!("{} or {}", self.description, other.description);
        Permission::new(description, move |actor, entity, ctx| {
            self.check(actor, entity, ctx) || other.check(actor, entity, ctx)
        })
    }

    pub fn and(self, other: Permission) -> Self {
        let description = format!("{} and {}", self.description, other.description);
        Permission::new(description, move |actor, entity, ctx| {
            self.check(actor, entity, ctx) && other.check(actor, entity, ctx)
        })
    }

    pub fn negate(self) -> Self {
        let description = format!("not ({})", self.description);
        Permission::new(description, move |actor, entity, ctx| {
            !self.check(actor, entity, ctx)
        })
    }
}

impl fmt::Debug for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Permission").field(&self.description).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::core::context::Lookup;
    use crate::core::entity::EntityRef;
    use chrono::Utc;

    struct Empty;

    impl Lookup for Empty {
        fn get(&self, _: &EntityRef) -> Option<Entity> {
            None
        }

        fn list(&self, _: &str) -> Vec<Entity> {
            Vec::new()
        }
    }

    fn with_ctx<R>(f: impl FnOnce(&Context<'_>) -> R) -> R {
        let settings = Settings::default().with_feature("closing", true);
        let ctx = Context::new(&Empty, &settings, Utc::now());
        f(&ctx)
    }

    fn activity() -> Entity {
        Entity::new("activity", 1).with("owner", 10).with("title", "Cleanup")
    }

    #[test]
    fn condition_is_deterministic() {
        let condition = Condition::new("has a title", |e, _| !e.is_blank("title"));
        with_ctx(|ctx| {
            let first = condition.check(&activity(), ctx);
            let second = condition.check(&activity(), ctx);
            assert_eq!(first, second);
            assert!(first);
        });
    }

    #[test]
    fn negated_condition_flips_and_describes() {
        let condition = Condition::new("has a title", |e, _| !e.is_blank("title")).negate();
        assert_eq!(condition.description(), "not (has a title)");
        with_ctx(|ctx| assert!(!condition.check(&activity(), ctx)));
    }

    #[test]
    fn first_unmet_respects_declared_order() {
        let conditions = vec![
            Condition::new("always", |_, _| true),
            Condition::new("has a deadline", |e, _| !e.is_blank("deadline")),
            Condition::new("has a location", |e, _| !e.is_blank("location")),
        ];
        with_ctx(|ctx| {
            let unmet = first_unmet(&conditions, &activity(), ctx).unwrap();
            assert_eq!(unmet.description(), "has a deadline");
        });
    }

    #[test]
    fn conditions_can_read_settings() {
        let condition = Condition::new("closing enabled", |_, ctx| ctx.feature("closing"));
        with_ctx(|ctx| assert!(condition.check(&activity(), ctx)));
    }

    #[test]
    fn owner_permission_matches_actor_id() {
        let permission = Permission::owner("owner");
        with_ctx(|ctx| {
            assert!(permission.check(Some(&Actor::user(10)), &activity(), ctx));
            assert!(!permission.check(Some(&Actor::user(11)), &activity(), ctx));
            assert!(!permission.check(None, &activity(), ctx));
        });
    }

    #[test]
    fn combinators_compose() {
        let staff_or_owner = Permission::staff().or(Permission::owner("owner"));
        assert_eq!(staff_or_owner.description(), "is staff or is owner");

        let staff_and_owner = Permission::staff().and(Permission::owner("owner"));

        with_ctx(|ctx| {
            assert!(staff_or_owner.check(Some(&Actor::staff(99)), &activity(), ctx));
            assert!(staff_or_owner.check(Some(&Actor::user(10)), &activity(), ctx));
            assert!(!staff_or_owner.check(Some(&Actor::user(11)), &activity(), ctx));

            assert!(!staff_and_owner.check(Some(&Actor::staff(99)), &activity(), ctx));
            assert!(staff_and_owner.check(Some(&Actor::staff(10)), &activity(), ctx));

            assert!(Permission::staff()
                .negate()
                .check(Some(&Actor::user(1)), &activity(), ctx));
        });
    }

    #[test]
    fn anyone_and_authenticated() {
        with_ctx(|ctx| {
            assert!(Permission::anyone().check(None, &activity(), ctx));
            assert!(!Permission::authenticated().check(None, &activity(), ctx));
            assert!(Permission::authenticated().check(Some(&Actor::user(1)), &activity(), ctx));
            assert!(Permission::role("reviewer")
                .check(Some(&Actor::user(1).with_role("reviewer")), &activity(), ctx));
        });
    }
}
