//! Immutable per-kind workflow definitions.

use super::transition::Transition;
use crate::core::{State, StateId};
use crate::triggers::Trigger;

/// States, transitions and triggers of one entity kind.
///
/// Built once by [`MachineBuilder`](crate::builder::MachineBuilder) and shared
/// read-only afterwards. Transitions and triggers keep registration order,
/// which decides tie-breaks between simultaneously eligible automatic
/// transitions.
#[derive(Clone, Debug)]
pub struct MachineDefinition {
    pub(crate) kind: String,
    pub(crate) states: Vec<State>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) triggers: Vec<Trigger>,
}

impl MachineDefinition {
    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn state(&self, id: &str) -> Option<&State> {
        self.states.iter().find(|state| state.id.as_str() == id)
    }

    pub fn has_state(&self, id: &StateId) -> bool {
        self.state(id.as_str()).is_some()
    }

    /// Validated at build time to exist exactly once.
    pub fn initial_state(&self) -> &State {
        self.states
            .iter()
            .find(|state| state.is_initial)
            .unwrap_or(&self.states[0])
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition(&self, name: &str) -> Option<&Transition> {
        self.transitions.iter().find(|t| t.name == name)
    }

    pub fn automatic_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.transitions.iter().filter(|t| t.automatic)
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }
}
