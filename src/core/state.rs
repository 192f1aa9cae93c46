//! Named states an entity can hold.
//!
//! States are plain values registered once per entity kind when the
//! registry is built. They are never mutated afterwards.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Identifier of a state, unique within one entity kind.
///
/// This is the value stored in the entity's status column.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateId(String);

impl StateId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl Borrow<str> for StateId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A registered state.
///
/// # Example
///
/// ```rust
/// use lifecycle::core::State;
///
/// let draft = State::new("draft", "Draft")
///     .describe("The activity is being prepared")
///     .initial();
/// let succeeded = State::new("succeeded", "Succeeded").terminal();
///
/// assert!(draft.is_initial);
/// assert!(!draft.is_terminal);
/// assert!(succeeded.is_terminal);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub id: StateId,
    /// Display name shown to end users
    pub name: String,
    pub description: String,
    pub is_initial: bool,
    pub is_terminal: bool,
}

impl State {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: StateId::new(id),
            name: name.into(),
            description: String::new(),
            is_initial: false,
            is_terminal: false,
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Mark this state as the one new entities start in.
    pub fn initial(mut self) -> Self {
        self.is_initial = true;
        self
    }

    /// Mark this state as an end point of the workflow.
    pub fn terminal(mut self) -> Self {
        self.is_terminal = true;
        self
    }
}

/// A transition source.
///
/// `Empty` is the sentinel for "the entity does not exist yet" and is only
/// meaningful for creation transitions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    Empty,
    State(StateId),
}

impl Source {
    /// Whether an entity whose current status is `status` matches this source.
    pub fn matches(&self, status: Option<&StateId>) -> bool {
        match (self, status) {
            (Self::Empty, None) => true,
            (Self::State(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("<empty>"),
            Self::State(id) => write!(f, "{id}"),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Self::State(StateId::new(value))
    }
}

impl From<StateId> for Source {
    fn from(value: StateId) -> Self {
        Self::State(value)
    }
}
