//! Errors raised while building workflow definitions.
//!
//! These are configuration errors: they surface at startup, when the
//! registry is assembled, never while serving requests.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BuildError {
    #[error("Entity kind must not be empty")]
    EmptyKind,

    #[error("State '{state}' is registered twice for '{kind}'")]
    DuplicateState { kind: String, state: String },

    #[error("'{kind}' declares more than one initial state: '{first}' and '{second}'")]
    MultipleInitialStates {
        kind: String,
        first: String,
        second: String,
    },

    #[error("'{kind}' has no initial state. Mark one state with .initial()")]
    MissingInitialState { kind: String },

    #[error("Transition name not specified. Call TransitionBuilder::new(name)")]
    MissingName,

    #[error("Transition '{transition}' has no source states. Call .from(state)")]
    MissingSources { transition: String },

    #[error("Transition '{transition}' has no target state. Call .to(state)")]
    MissingTarget { transition: String },

    #[error("Manual transition '{transition}' needs a permission. Call .permission(..) or .automatic()")]
    MissingPermission { transition: String },

    #[error("Transition '{transition}' of '{kind}' references unknown state '{state}'")]
    UnknownState {
        kind: String,
        transition: String,
        state: String,
    },

    #[error("Transition '{transition}' is registered twice for '{kind}'. Use .override_transition() to replace it")]
    DuplicateTransition { kind: String, transition: String },

    #[error("Cannot override '{transition}': '{kind}' has no such transition")]
    UnknownOverride { kind: String, transition: String },

    #[error("Entity kind '{kind}' is registered twice")]
    DuplicateKind { kind: String },
}
