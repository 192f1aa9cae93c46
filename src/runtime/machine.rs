//! A workflow definition bound to one entity.

use super::error::FsmError;
use crate::core::{Actor, Context, Entity, State};
use crate::effects::{transition_effects, PlannedEffect, PreviewContext};
use crate::registry::{MachineDefinition, Registry, Transition};
use stillwater::validation::Validation;
use stillwater::NonEmptyVec;
use thiserror::Error;

/// Why a transition cannot be applied right now.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Rejection {
    #[error("current state '{state}' is not a source")]
    InvalidSource { state: String },

    #[error("condition not met: {condition}")]
    ConditionNotMet { condition: String },

    #[error("requires {permission}")]
    PermissionDenied { permission: String },
}

/// Result of [`StateMachine::check`]: success, or every reason at once.
pub type Diagnosis = Validation<(), NonEmptyVec<Rejection>>;

/// Read-only view answering "what can happen to this entity now".
///
/// Obtained from [`Engine::machine`](super::Engine::machine).
pub struct StateMachine<'a> {
    definition: &'a MachineDefinition,
    registry: &'a Registry,
    entity: &'a Entity,
    context: Context<'a>,
}

impl<'a> StateMachine<'a> {
    pub(crate) fn new(
        definition: &'a MachineDefinition,
        registry: &'a Registry,
        entity: &'a Entity,
        context: Context<'a>,
    ) -> Self {
        Self {
            definition,
            registry,
            entity,
            context,
        }
    }

    pub fn definition(&self) -> &'a MachineDefinition {
        self.definition
    }

    pub fn entity(&self) -> &'a Entity {
        self.entity
    }

    /// `None` while the entity has no status yet.
    pub fn current_state(&self) -> Option<&'a State> {
        self.entity
            .status()
            .and_then(|status| self.definition.state(status.as_str()))
    }

    /// Manual transitions `actor` could apply right now, in registration order.
    pub fn available(&self, actor: Option<&Actor>) -> Vec<&'a Transition> {
        self.definition
            .transitions()
            .iter()
            .filter(|t| !t.automatic)
            .filter(|t| t.is_eligible(self.entity, &self.context))
            .filter(|t| t.permits(actor, self.entity, &self.context))
            .collect()
    }

    /// Automatic transitions eligible right now. The first one wins in a sweep.
    pub fn automatic(&self) -> Vec<&'a Transition> {
        self.definition
            .automatic_transitions()
            .filter(|t| t.is_eligible(self.entity, &self.context))
            .collect()
    }

    /// Every reason `actor` cannot apply `name`, accumulated rather than
    /// stopping at the first.
    pub fn check(&self, name: &str, actor: Option<&Actor>) -> Result<Diagnosis, FsmError> {
        let transition = self.transition(name)?;
        let mut checks: Vec<Diagnosis> = Vec::new();

        checks.push(if transition.accepts_source(self.entity.status()) {
            Validation::success(())
        } else {
            Validation::fail(Rejection::InvalidSource {
                state: state_label(self.entity),
            })
        });

        for condition in &transition.conditions {
            checks.push(if condition.check(self.entity, &self.context) {
                Validation::success(())
            } else {
                Validation::fail(Rejection::ConditionNotMet {
                    condition: condition.description().to_string(),
                })
            });
        }

        checks.push(if transition.permits(actor, self.entity, &self.context) {
            Validation::success(())
        } else {
            Validation::fail(Rejection::PermissionDenied {
                permission: permission_label(transition),
            })
        });

        Ok(Validation::all_vec(checks).map(|_| ()))
    }

    /// Everything applying `name` would cause, without executing anything.
    pub fn preview(&self, name: &str) -> Result<Vec<PlannedEffect>, FsmError> {
        let transition = self.transition(name)?;
        let ctx = PreviewContext::new(self.context, self.registry);
        Ok(transition_effects(transition, self.entity, &ctx))
    }

    fn transition(&self, name: &str) -> Result<&'a Transition, FsmError> {
        self.definition
            .transition(name)
            .ok_or_else(|| FsmError::TransitionNotFound {
                kind: self.definition.kind().to_string(),
                transition: name.to_string(),
            })
    }
}

pub(crate) fn state_label(entity: &Entity) -> String {
    entity
        .status()
        .map(ToString::to_string)
        .unwrap_or_else(|| crate::core::Source::Empty.to_string())
}

pub(crate) fn permission_label(transition: &Transition) -> String {
    transition
        .permission
        .as_ref()
        .map(|permission| permission.description().to_string())
        .unwrap_or_else(|| "no one".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MachineBuilder, TransitionBuilder};
    use crate::config::Settings;
    use crate::core::{Condition, EntityRef, Lookup, Permission};
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

    fn definition() -> MachineDefinition {
        MachineBuilder::new("activity")
            .state(State::new("draft", "Draft").initial())
            .state(State::new("submitted", "Submitted"))
            .state(State::new("open", "Open"))
            .state(State::new("expired", "Expired").terminal())
            .transition(
                TransitionBuilder::new("submit")
                    .from("draft")
                    .to("submitted")
                    .when("has a title", |e, _| !e.is_blank("title"))
                    .when("has a description", |e, _| !e.is_blank("description"))
                    .permission(Permission::owner("owner")),
            )
            .transition(
                TransitionBuilder::new("approve")
                    .from("submitted")
                    .to("open")
                    .permission(Permission::staff()),
            )
            .transition(
                TransitionBuilder::new("expire")
                    .from("open")
                    .to("expired")
                    .automatic()
                    .condition(Condition::new("has no contributors", |e, _| {
                        e.get_u64("contributors") == Some(0)
                    })),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn available_lists_only_permitted_manual_transitions() {
        let definition = definition();
        let registry = Registry::default();
        let settings = Settings::default();
        let entity = Entity::new("activity", 1)
            .with_status("draft")
            .with("owner", 7)
            .with("title", "Beach cleanup")
            .with("description", "Bring gloves");
        let machine = StateMachine::new(
            &definition,
            &registry,
            &entity,
            Context::new(&Empty, &settings, Utc::now()),
        );

        let names = |ts: Vec<&Transition>| ts.iter().map(|t| t.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(machine.available(Some(&Actor::user(7)))), ["submit"]);
        assert!(machine.available(Some(&Actor::user(8))).is_empty());
        assert!(machine.available(None).is_empty());
        assert_eq!(machine.current_state().unwrap().name, "Draft");
    }

    #[test]
    fn automatic_lists_eligible_automatic_transitions() {
        let definition = definition();
        let registry = Registry::default();
        let settings = Settings::default();
        let entity = Entity::new("activity", 1)
            .with_status("open")
            .with("contributors", 0);
        let machine = StateMachine::new(
            &definition,
            &registry,
            &entity,
            Context::new(&Empty, &settings, Utc::now()),
        );

        let automatic = machine.automatic();
        assert_eq!(automatic.len(), 1);
        assert_eq!(automatic[0].name, "expire");
        assert!(machine.available(Some(&Actor::staff(1))).is_empty());
    }

    #[test]
    fn check_accumulates_every_rejection() {
        let definition = definition();
        let registry = Registry::default();
        let settings = Settings::default();
        let entity = Entity::new("activity", 1).with_status("open").with("owner", 7);
        let machine = StateMachine::new(
            &definition,
            &registry,
            &entity,
            Context::new(&Empty, &settings, Utc::now()),
        );

        match machine.check("submit", Some(&Actor::user(8))).unwrap() {
            Validation::Failure(errors) => {
                assert_eq!(errors.len(), 4);
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, Rejection::InvalidSource { state } if state == "open")));
                assert!(errors
                    .iter()
                    .any(|e| matches!(e, Rejection::PermissionDenied { .. })));
            }
            Validation::Success(_) => panic!("Expected failures, got success"),
        }
    }

    #[test]
    fn check_succeeds_when_everything_holds() {
        let definition = definition();
        let registry = Registry::default();
        let settings = Settings::default();
        let entity = Entity::new("activity", 1).with_status("submitted");
        let machine = StateMachine::new(
            &definition,
            &registry,
            &entity,
            Context::new(&Empty, &settings, Utc::now()),
        );

        assert!(machine.check("approve", Some(&Actor::staff(1))).unwrap().is_success());
        assert!(machine.check("approve", Some(&Actor::user(1))).unwrap().is_failure());
        assert!(matches!(
            machine.check("launch", None),
            Err(FsmError::TransitionNotFound { .. })
        ));
    }
}
