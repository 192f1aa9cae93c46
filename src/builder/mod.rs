//! Builder API for assembling workflow registries.
//!
//! Every entity kind gets one registration function that composes a
//! [`MachineBuilder`] (optionally extending a parent kind) and returns an
//! immutable definition. The definitions are then collected into a
//! [`Registry`](crate::registry::Registry) with [`RegistryBuilder`].

pub mod error;
pub mod machine;
pub mod transition;

pub use error::BuildError;
pub use machine::MachineBuilder;
pub use transition::TransitionBuilder;

use crate::registry::{MachineDefinition, Registry};
use std::sync::Arc;

/// Collects per-kind definitions into a [`Registry`].
#[derive(Default)]
pub struct RegistryBuilder {
    machines: Vec<MachineDefinition>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, machine: MachineDefinition) -> Self {
        self.machines.push(machine);
        self
    }

    pub fn build(self) -> Result<Registry, BuildError> {
        let mut registry = Registry::default();
        for machine in self.machines {
            let kind = machine.kind().to_string();
            if registry.machines.contains_key(&kind) {
                return Err(BuildError::DuplicateKind { kind });
            }
            registry.machines.insert(kind, Arc::new(machine));
        }
        Ok(registry)
    }
}
