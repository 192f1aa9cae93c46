//! Runtime errors.

use crate::core::EntityRef;
use crate::effects::EffectError;
use thiserror::Error;

/// Persistence adapter failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Write rejected for {entity}: {reason}")]
    Rejected { entity: EntityRef, reason: String },

    #[error("Storage backend failed: {0}")]
    Backend(String),
}

/// Everything that can go wrong while evaluating or applying transitions.
#[derive(Debug, Error)]
pub enum FsmError {
    #[error("Transition '{transition}' is not registered for '{kind}'")]
    TransitionNotFound { kind: String, transition: String },

    #[error("Cannot apply '{transition}' to {entity}: state '{state}' is not one of its sources")]
    InvalidTransition {
        entity: EntityRef,
        transition: String,
        state: String,
    },

    #[error("Cannot apply '{transition}' to {entity}: condition not met: {condition}")]
    ConditionNotMet {
        entity: EntityRef,
        transition: String,
        condition: String,
    },

    #[error("Not allowed to apply '{transition}' to {entity}: requires {permission}")]
    PermissionDenied {
        entity: EntityRef,
        transition: String,
        permission: String,
    },

    #[error("{0} does not exist")]
    EntityNotFound(EntityRef),

    #[error("{0} already exists")]
    EntityExists(EntityRef),

    #[error("No workflow is registered for '{0}'")]
    UnknownEntityType(String),

    #[error("{entity} is in unregistered state '{state}'")]
    UnknownState { entity: EntityRef, state: String },

    #[error("Status of {entity} cannot change by saving, apply a transition instead")]
    DirectStatusChange { entity: EntityRef },

    #[error("Cascade reached {entity} beyond the maximum depth of {limit}")]
    CascadeDepthExceeded { entity: EntityRef, limit: usize },

    #[error("Effect '{effect}' failed on {entity}: {source}")]
    Effect {
        entity: EntityRef,
        effect: String,
        #[source]
        source: EffectError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Caller-facing error classes, e.g. for mapping to HTTP status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorCategory {
    NotFound,
    /// The entity moved on concurrently; the request no longer applies.
    Conflict,
    /// The request is understood but a business rule rejects it.
    Validation,
    Forbidden,
    Internal,
}

impl FsmError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::TransitionNotFound { .. } | Self::EntityNotFound(_) | Self::UnknownEntityType(_) => {
                ErrorCategory::NotFound
            }
            Self::InvalidTransition { .. } | Self::EntityExists(_) => ErrorCategory::Conflict,
            Self::ConditionNotMet { .. } | Self::DirectStatusChange { .. } => ErrorCategory::Validation,
            Self::PermissionDenied { .. } => ErrorCategory::Forbidden,
            Self::UnknownState { .. }
            | Self::CascadeDepthExceeded { .. }
            | Self::Effect { .. }
            | Self::Store(_) => ErrorCategory::Internal,
        }
    }
}
