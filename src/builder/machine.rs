//! Builder for per-kind workflow definitions.

use crate::builder::error::BuildError;
use crate::builder::transition::TransitionBuilder;
use crate::core::{Source, State};
use crate::registry::{MachineDefinition, Transition};
use crate::triggers::Trigger;

/// Builder for a [`MachineDefinition`].
///
/// A child kind starts from its parent's definition with
/// [`extend`](MachineBuilder::extend) and may add states, transitions and
/// triggers, or replace a parent transition with
/// [`override_transition`](MachineBuilder::override_transition). It can never
/// remove anything the parent registered.
///
/// # Example
///
/// ```rust
/// use lifecycle::builder::{MachineBuilder, TransitionBuilder};
/// use lifecycle::core::{Permission, State};
///
/// let base = MachineBuilder::new("activity")
///     .state(State::new("draft", "Draft").initial())
///     .state(State::new("open", "Open"))
///     .transition(
///         TransitionBuilder::new("publish")
///             .from("draft")
///             .to("open")
///             .permission(Permission::staff()),
///     )
///     .build()
///     .unwrap();
///
/// let deed = MachineBuilder::new("deed")
///     .extend(&base)
///     .state(State::new("expired", "Expired").terminal())
///     .transition(TransitionBuilder::new("expire").from("open").to("expired").automatic())
///     .build()
///     .unwrap();
///
/// assert_eq!(deed.states().len(), 3);
/// assert!(deed.transition("publish").is_some());
/// assert!(base.transition("expire").is_none());
/// ```
pub struct MachineBuilder {
    kind: String,
    states: Vec<State>,
    transitions: Vec<Transition>,
    triggers: Vec<Trigger>,
    // Builder errors are deferred to build() to keep the fluent chain.
    pending: Vec<PendingTransition>,
    errors: Vec<BuildError>,
}

enum PendingTransition {
    Add(TransitionBuilder),
    Override(TransitionBuilder),
}

impl MachineBuilder {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            states: Vec::new(),
            transitions: Vec::new(),
            triggers: Vec::new(),
            pending: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Start from everything `base` registered.
    pub fn extend(mut self, base: &MachineDefinition) -> Self {
        self.states.extend(base.states.iter().cloned());
        self.transitions.extend(base.transitions.iter().cloned());
        self.triggers.extend(base.triggers.iter().cloned());
        self
    }

    pub fn state(mut self, state: State) -> Self {
        if self.states.iter().any(|existing| existing.id == state.id) {
            self.errors.push(BuildError::DuplicateState {
                kind: self.kind.clone(),
                state: state.id.to_string(),
            });
        } else {
            self.states.push(state);
        }
        self
    }

    pub fn transition(mut self, builder: TransitionBuilder) -> Self {
        self.pending.push(PendingTransition::Add(builder));
        self
    }

    /// Replace a transition registered earlier (typically by the parent) in place.
    pub fn override_transition(mut self, builder: TransitionBuilder) -> Self {
        self.pending.push(PendingTransition::Override(builder));
        self
    }

    pub fn trigger(mut self, trigger: Trigger) -> Self {
        self.triggers.push(trigger);
        self
    }

    /// Build the definition.
    /// Returns the first configuration error found.
    pub fn build(mut self) -> Result<MachineDefinition, BuildError> {
        if self.kind.is_empty() {
            return Err(BuildError::EmptyKind);
        }
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let mut initial: Option<&State> = None;
        for state in &self.states {
            if !state.is_initial {
                continue;
            }
            if let Some(first) = initial {
                return Err(BuildError::MultipleInitialStates {
                    kind: self.kind,
                    first: first.id.to_string(),
                    second: state.id.to_string(),
                });
            }
            initial = Some(state);
        }
        if initial.is_none() {
            return Err(BuildError::MissingInitialState { kind: self.kind });
        }

        for pending in std::mem::take(&mut self.pending) {
            match pending {
                PendingTransition::Add(builder) => {
                    let transition = builder.build()?;
                    if self.transitions.iter().any(|t| t.name == transition.name) {
                        return Err(BuildError::DuplicateTransition {
                            kind: self.kind,
                            transition: transition.name,
                        });
                    }
                    self.transitions.push(transition);
                }
                PendingTransition::Override(builder) => {
                    let transition = builder.build()?;
                    let Some(slot) = self
                        .transitions
                        .iter_mut()
                        .find(|t| t.name == transition.name)
                    else {
                        return Err(BuildError::UnknownOverride {
                            kind: self.kind,
                            transition: transition.name,
                        });
                    };
                    *slot = transition;
                }
            }
        }

        for transition in &self.transitions {
            let referenced = transition
                .sources
                .iter()
                .filter_map(|source| match source {
                    Source::State(id) => Some(id),
                    Source::Empty => None,
                })
                .chain(std::iter::once(&transition.target));
            for id in referenced {
                if !self.states.iter().any(|state| &state.id == id) {
                    return Err(BuildError::UnknownState {
                        kind: self.kind,
                        transition: transition.name.clone(),
                        state: id.to_string(),
                    });
                }
            }
        }

        Ok(MachineDefinition {
            kind: self.kind,
            states: self.states,
            transitions: self.transitions,
            triggers: self.triggers,
        })
    }
}
