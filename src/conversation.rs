//! Conversation turns
//!
//! A conversation is an append-only list of turns owned by one page session.
//! On the wire each turn travels as `{ "role": ..., "parts": [text] }`; in
//! memory it is normalized to a single text field.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Speaker of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    #[serde(alias = "assistant")]
    Model,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message tagged with its speaker. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireTurn", from = "WireTurn")]
pub struct Turn {
    role: Role,
    text: String,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(Role::Model, text)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Wire shape of a turn, as sent by the pages and the chat endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireTurn {
    role: Role,
    #[serde(default)]
    parts: Vec<String>,
}

impl From<WireTurn> for Turn {
    fn from(wire: WireTurn) -> Self {
        Turn::new(wire.role, wire.parts.join("\n"))
    }
}

impl From<Turn> for WireTurn {
    fn from(turn: Turn) -> Self {
        WireTurn {
            role: turn.role,
            parts: vec![turn.text],
        }
    }
}

/// Ordered, append-only list of turns
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn at the end. The only mutation a conversation allows.
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn last_role(&self) -> Option<Role> {
        self.last().map(Turn::role)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
