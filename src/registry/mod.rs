//! Read-only registries of workflow definitions.
//!
//! A [`Registry`] maps entity kinds to their [`MachineDefinition`]. It is
//! assembled once at process start through the builders in
//! [`crate::builder`] and never mutated afterwards. Every part of it is
//! iterable so tooling can reflect on the workflows.

mod document;
mod machine;
mod transition;

pub use document::{StateDoc, TransitionDoc, TriggerDoc, WorkflowDocument};
pub use machine::MachineDefinition;
pub use transition::Transition;

use crate::core::State;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone, Debug, Default)]
pub struct Registry {
    pub(crate) machines: BTreeMap<String, Arc<MachineDefinition>>,
}

impl Registry {
    pub fn machine(&self, kind: &str) -> Option<&Arc<MachineDefinition>> {
        self.machines.get(kind)
    }

    /// States registered for `kind`, keyed by state id.
    pub fn states_for(&self, kind: &str) -> Option<BTreeMap<&str, &State>> {
        self.machine(kind).map(|machine| {
            machine
                .states()
                .iter()
                .map(|state| (state.id.as_str(), state))
                .collect()
        })
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.machines.keys().map(String::as_str)
    }

    pub fn machines(&self) -> impl Iterator<Item = &Arc<MachineDefinition>> {
        self.machines.values()
    }
}
