//! HTTP API for EcoBot
//!
//! The stateless chat endpoint, kiosk voice sessions streamed over SSE, typed
//! chat sessions, and the two pages with their assets.

mod assets;
mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
pub use types::*;

use crate::chat::ChatService;
use crate::runtime::SessionManager;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Backs `POST /api/chat`
    pub chat: Arc<ChatService>,
    pub sessions: Arc<SessionManager>,
}

impl AppState {
    pub fn new(chat: Arc<ChatService>, sessions: Arc<SessionManager>) -> Self {
        Self { chat, sessions }
    }
}
