//! Effects: the side work attached to transitions and triggers.
//!
//! # Key Concepts
//!
//! - **Effect**: a shared definition with its own conditions, a `pre_save`
//!   hook (before the entity is persisted) and a `post_save` hook (after)
//! - **Intent**: what an effect asks the runtime to do on other entities;
//!   effects never reach into another entity's state machine directly
//! - **Preview**: depth-first expansion of the effects a change would cause,
//!   with a visited set so self-referential graphs terminate

mod builtin;
mod effect;
mod preview;

pub use builtin::{
    HookEffect, NotificationEffect, RelatedTransitionEffect, Relation, SetField, TransitionEffect,
};
pub use effect::{CascadeMode, Effect, EffectContext, EffectError, Expansion, Intent};
pub use preview::{all_effects, transition_effects, PlannedEffect, PreviewContext};

pub(crate) use effect::effect_applies;
