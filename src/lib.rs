//! Lifecycle: declarative workflows for platform entities
//!
//! Every activity, contribution or funding campaign moves through a finite
//! set of named states. Lifecycle describes those workflows as data (states,
//! guarded transitions, triggers and effects) and applies them through one
//! generic runtime.
//!
//! # Core Concepts
//!
//! - **State**: a named status an entity can hold
//! - **Transition**: a guarded move from a set of source states to a target,
//!   manual (requested by an actor, permission-checked) or automatic
//! - **Effect**: side work attached to a transition or trigger, such as
//!   setting a field, cascading a transition to related entities or
//!   scheduling a notification
//! - **Trigger**: effects fired when a watched field changes on save
//! - **Engine**: validates and applies transitions as one all-or-nothing
//!   unit of work, and records an audit entry for each
//!
//! # Example
//!
//! ```rust
//! use lifecycle::builder::{MachineBuilder, RegistryBuilder, TransitionBuilder};
//! use lifecycle::core::{Actor, Entity, EntityRef, Permission, State};
//! use lifecycle::effects::SetField;
//! use lifecycle::runtime::{Engine, FsmError, MemoryStore};
//! use lifecycle::Settings;
//!
//! let activity = MachineBuilder::new("activity")
//!     .state(State::new("draft", "Draft").initial())
//!     .state(State::new("submitted", "Submitted"))
//!     .transition(
//!         TransitionBuilder::new("submit")
//!             .from("draft")
//!             .to("submitted")
//!             .when("has a title", |activity, _| !activity.is_blank("title"))
//!             .permission(Permission::owner("owner"))
//!             .effect(SetField::new("reviewed", false)),
//!     )
//!     .build()
//!     .unwrap();
//!
//! let registry = RegistryBuilder::new().register(activity).build().unwrap();
//! let engine = Engine::new(registry, Settings::default());
//! let mut store = MemoryStore::new();
//! let owner = Actor::user(7);
//!
//! engine
//!     .create(&mut store, Entity::new("activity", 1).with("owner", 7), Some(&owner))
//!     .unwrap();
//!
//! let rejected = engine.apply(&mut store, &EntityRef::new("activity", 1), "submit", Some(&owner));
//! assert!(matches!(rejected, Err(FsmError::ConditionNotMet { .. })));
//! ```

pub mod builder;
pub mod config;
pub mod core;
pub mod effects;
pub mod notify;
pub mod registry;
pub mod runtime;
pub mod triggers;

// Re-export commonly used types
pub use config::Settings;
pub use core::{Actor, Condition, Entity, EntityRef, Permission, State, StateId};
pub use registry::{MachineDefinition, Registry, Transition};
pub use runtime::{Engine, FsmError, MemoryStore, Outcome, StateMachine};
