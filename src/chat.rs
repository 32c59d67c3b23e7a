//! Chat replies from the hosted model
//!
//! `ChatService` is the stateless core behind `POST /api/chat`: it wraps the
//! caller's message and history with the persona and fixed generation
//! settings, and returns the model's text. `HttpChatClient` speaks the same
//! contract to a remote endpoint.

mod remote;

pub use remote::HttpChatClient;

use crate::conversation::{Role, Turn};
use crate::llm::{LlmError, LlmMessage, LlmRequest, LlmService};
use crate::persona::Persona;
use crate::runtime::ChatClient;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub const TEMPERATURE: f32 = 0.7;
pub const MAX_OUTPUT_TOKENS: u32 = 8192;

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("model returned an empty reply")]
    EmptyReply,
    #[error("chat endpoint returned {status}: {message}")]
    Endpoint { status: u16, message: String },
    #[error("chat endpoint unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Stateless reply generator
pub struct ChatService {
    llm: Arc<dyn LlmService>,
    persona: Persona,
}

impl ChatService {
    pub fn new(llm: Arc<dyn LlmService>, persona: Persona) -> Self {
        Self { llm, persona }
    }

    pub fn model_id(&self) -> &str {
        self.llm.model_id()
    }

    /// History in order, then the new message, under the persona instruction
    pub fn build_request(&self, message: &str, history: &[Turn]) -> LlmRequest {
        let mut messages: Vec<LlmMessage> = history
            .iter()
            .map(|turn| match turn.role() {
                Role::User => LlmMessage::user(turn.text()),
                Role::Model => LlmMessage::assistant(turn.text()),
            })
            .collect();
        messages.push(LlmMessage::user(message));

        LlmRequest {
            system: Some(self.persona.text().to_string()),
            messages,
            temperature: Some(TEMPERATURE),
            max_tokens: Some(MAX_OUTPUT_TOKENS),
        }
    }

    pub async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        let request = self.build_request(message, history);
        let response = self.llm.complete(&request).await?;
        if response.text.trim().is_empty() {
            return Err(ChatError::EmptyReply);
        }
        Ok(response.text)
    }
}

#[async_trait]
impl ChatClient for ChatService {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        ChatService::reply(self, message, history).await
    }
}
