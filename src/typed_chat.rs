//! Typed chat variant
//!
//! A two-state gate around the conversation: at most one outstanding request,
//! and turns strictly alternate. The user turn is appended as soon as a send
//! is accepted and stays there if the reply never comes.
//!
//! The chat call of a send runs as its own task, so a reply that arrives after
//! the HTTP caller went away is still recorded.

use crate::chat::ChatError;
use crate::conversation::{Conversation, Role, Turn};
use crate::runtime::ChatClient;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

/// Why a send was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SendRejected {
    #[error("message is empty")]
    EmptyInput,
    #[error("a reply is still pending")]
    AwaitingReply,
    #[error("waiting for EcoBot to answer the previous message")]
    OutOfTurn,
}

#[derive(Debug, Error)]
pub enum TypedChatError {
    #[error(transparent)]
    Rejected(#[from] SendRejected),
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error("chat request task failed: {0}")]
    Interrupted(String),
}

/// An accepted send: what to forward to the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSend {
    pub message: String,
    /// Conversation before the new user turn
    pub history: Vec<Turn>,
}

/// State of one typed chat page
#[derive(Debug, Default)]
pub struct TypedChat {
    conversation: Conversation,
    awaiting: bool,
}

impl TypedChat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn is_awaiting(&self) -> bool {
        self.awaiting
    }

    /// Whether a message would be accepted, ignoring the draft text
    pub fn accepts_message(&self) -> bool {
        !self.awaiting && matches!(self.conversation.last_role(), None | Some(Role::Model))
    }

    /// The send control is enabled iff this holds
    pub fn can_send(&self, input: &str) -> bool {
        self.check(input).is_ok()
    }

    fn check(&self, input: &str) -> Result<(), SendRejected> {
        if input.trim().is_empty() {
            return Err(SendRejected::EmptyInput);
        }
        if self.awaiting {
            return Err(SendRejected::AwaitingReply);
        }
        if self.conversation.last_role() == Some(Role::User) {
            return Err(SendRejected::OutOfTurn);
        }
        Ok(())
    }

    /// Accept `input`: append the user turn and mark the request outstanding
    pub fn begin_send(&mut self, input: &str) -> Result<PendingSend, SendRejected> {
        self.check(input)?;

        let history = self.conversation.turns().to_vec();
        self.conversation.push(Turn::user(input));
        self.awaiting = true;

        Ok(PendingSend {
            message: input.to_string(),
            history,
        })
    }

    pub fn complete(&mut self, reply: impl Into<String>) {
        self.conversation.push(Turn::model(reply));
        self.awaiting = false;
    }

    /// Give up on the outstanding request; the user turn is kept
    pub fn fail(&mut self) {
        self.awaiting = false;
    }
}

/// Send one message through `client`, holding the lock only while mutating.
///
/// Dropping the returned future does not cancel the request: the reply (or
/// the failure) is applied to `session` whenever it resolves.
pub async fn send_message<C>(
    session: Arc<Mutex<TypedChat>>,
    input: &str,
    client: Arc<C>,
) -> Result<String, TypedChatError>
where
    C: ChatClient + ?Sized + 'static,
{
    let pending = session.lock().await.begin_send(input)?;

    let caller_session = session.clone();
    let request = tokio::spawn(async move {
        let result = client.reply(&pending.message, &pending.history).await;
        let mut chat = session.lock().await;
        match &result {
            Ok(reply) => chat.complete(reply.clone()),
            Err(_) => chat.fail(),
        }
        result
    });

    match request.await {
        Ok(result) => result.map_err(TypedChatError::from),
        Err(e) => {
            // The task never reached complete/fail
            caller_session.lock().await.fail();
            Err(TypedChatError::Interrupted(e.to_string()))
        }
    }
}
