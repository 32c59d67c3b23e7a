//! EcoBot - talking exhibit robot
//!
//! Serves the voice kiosk and typed chat pages, the stateless chat endpoint
//! in front of Gemini, and the per-visitor sessions that drive the kiosk.

mod api;
mod avatar;
mod chat;
mod conversation;
mod llm;
mod persona;
mod runtime;
mod typed_chat;
mod voice;

use api::{create_router, AppState};
use chat::{ChatService, HttpChatClient};
use llm::LlmConfig;
use persona::Persona;
use runtime::{ChatClient, SessionManager, VoiceConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sessions without a page or a request for this long are closed
const DEFAULT_SESSION_IDLE: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ecobot=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let port: u16 = std::env::var("ECOBOT_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8000);

    let session_idle = std::env::var("ECOBOT_SESSION_IDLE_SECS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .filter(|&secs| secs > 0)
        .map_or(DEFAULT_SESSION_IDLE, Duration::from_secs);

    // Model and persona
    let llm_config = LlmConfig::from_env();
    if !llm_config.has_credentials() {
        tracing::warn!("No Gemini credentials configured. Set GEMINI_API_KEY or LLM_GATEWAY.");
    }
    let llm = llm_config.build()?;
    let persona = Persona::from_env()?;
    let chat = Arc::new(ChatService::new(llm, persona));
    tracing::info!(model = %chat.model_id(), "Chat service initialized");

    // Sessions talk to a remote endpoint when one is configured
    let session_chat: Arc<dyn ChatClient> = match std::env::var("ECOBOT_CHAT_ENDPOINT")
        .ok()
        .filter(|url| !url.trim().is_empty())
    {
        Some(url) => {
            let client = HttpChatClient::new(url.trim())?;
            tracing::info!(url = %client.url(), "Sessions use remote chat endpoint");
            Arc::new(client)
        }
        None => chat.clone(),
    };

    let voice = VoiceConfig::from_env();
    tracing::info!(
        locale = %voice.locale,
        speech_rate = voice.speech_rate,
        frame_interval_ms = %voice.frame_interval.as_millis(),
        "Voice sessions configured"
    );

    let sessions = Arc::new(SessionManager::new(session_chat, voice));
    sessions.spawn_reaper(session_idle);
    tracing::info!(idle_secs = session_idle.as_secs(), "Session reaper started");

    let state = AppState::new(chat, sessions);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(compression);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("EcoBot server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
