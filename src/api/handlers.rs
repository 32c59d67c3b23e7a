//! HTTP request handlers

use super::assets::{get_page, serve_static};
use super::sse::sse_stream;
use super::types::{
    ChatRequest, ChatResponse, DeviceEvent, ErrorResponse, OkResponse, SessionCreated,
    TypedSendRequest, TypedSendResponse, TypedSnapshot,
};
use super::AppState;
use crate::avatar::frame_paths;
use crate::runtime::{SessionError, SseEvent};
use crate::typed_chat::{send_message, TypedChatError};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Body of every failed `/api/chat` call; the cause is only logged
const GENERIC_ERROR: &str = "Error";

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/", get(serve_kiosk))
        .route("/chat", get(serve_chat))
        // Static assets (embedded or filesystem fallback)
        .route("/assets/*path", get(serve_static))
        // Stateless chat endpoint
        .route("/api/chat", post(chat))
        // Kiosk voice sessions
        .route("/api/kiosk", post(open_kiosk))
        .route("/api/kiosk/:id/stream", get(stream_kiosk))
        .route("/api/kiosk/:id/events", post(kiosk_event))
        .route("/api/kiosk/:id/close", post(close_kiosk))
        // Typed chat sessions
        .route("/api/typed", post(open_typed))
        .route("/api/typed/:id", get(get_typed))
        .route("/api/typed/:id/send", post(send_typed))
        .route("/api/typed/:id/close", post(close_typed))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Pages
// ============================================================

fn serve_page(name: &str) -> Response {
    match get_page(name) {
        Some(content) => Html(content).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Html(format!("<h1>404 - {name} not found</h1>")),
        )
            .into_response(),
    }
}

async fn serve_kiosk() -> Response {
    serve_page("index.html")
}

async fn serve_chat() -> Response {
    serve_page("chat.html")
}

// ============================================================
// Chat Endpoint
// ============================================================

async fn chat(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = payload.map_err(|e| {
        tracing::warn!(error = %e.body_text(), "Rejected chat request");
        AppError::Internal(GENERIC_ERROR.to_string())
    })?;

    match state.chat.reply(&request.message, &request.history).await {
        Ok(reply) => Ok(Json(ChatResponse { reply })),
        Err(e) => {
            tracing::error!(
                error = %e,
                history_len = request.history.len(),
                "Chat request failed"
            );
            Err(AppError::Internal(GENERIC_ERROR.to_string()))
        }
    }
}

// ============================================================
// Kiosk Sessions
// ============================================================

async fn open_kiosk(State(state): State<AppState>) -> Json<SessionCreated> {
    let id = state.sessions.open_kiosk().await;
    tracing::info!(session = %id, "Opened kiosk session");
    Json(SessionCreated { id })
}

async fn stream_kiosk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let subscription = state.sessions.subscribe(&id).await?;

    let init_event = SseEvent::Init {
        snapshot: subscription.snapshot.clone(),
        frames: frame_paths(),
    };

    Ok(sse_stream(id, init_event, subscription))
}

async fn kiosk_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<DeviceEvent>, JsonRejection>,
) -> Result<Json<OkResponse>, AppError> {
    let Json(device_event) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let event = device_event.into_event(&mut rand::thread_rng());

    state.sessions.send_event(&id, event).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn close_kiosk(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    state.sessions.close_kiosk(&id).await?;
    Ok(Json(OkResponse { ok: true }))
}

// ============================================================
// Typed Chat Sessions
// ============================================================

async fn open_typed(State(state): State<AppState>) -> Json<SessionCreated> {
    let id = state.sessions.open_typed().await;
    Json(SessionCreated { id })
}

async fn get_typed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TypedSnapshot>, AppError> {
    let session = state.sessions.typed(&id).await?;
    let chat = session.lock().await;

    Ok(Json(TypedSnapshot {
        turns: chat.conversation().turns().to_vec(),
        awaiting: chat.is_awaiting(),
        accepts_message: chat.accepts_message(),
    }))
}

async fn send_typed(
    State(state): State<AppState>,
    Path(id): Path<String>,
    payload: Result<Json<TypedSendRequest>, JsonRejection>,
) -> Result<Json<TypedSendResponse>, AppError> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let session = state.sessions.typed(&id).await?;

    let client = state.sessions.chat_client().clone();

    let reply = send_message(session.clone(), &request.text, client)
        .await
        .map_err(|e| match e {
            TypedChatError::Rejected(reason) => AppError::Conflict(reason.to_string()),
            e @ (TypedChatError::Chat(_) | TypedChatError::Interrupted(_)) => {
                tracing::error!(session = %id, error = %e, "Typed chat request failed");
                AppError::Internal(GENERIC_ERROR.to_string())
            }
        })?;

    let turns = session.lock().await.conversation().turns().to_vec();
    Ok(Json(TypedSendResponse { reply, turns }))
}

async fn close_typed(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<OkResponse>, AppError> {
    state.sessions.close_typed(&id).await?;
    Ok(Json(OkResponse { ok: true }))
}

async fn get_version() -> &'static str {
    concat!("ecobot ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<SessionError> for AppError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotFound(_) => AppError::NotFound(e.to_string()),
            SessionError::Closed(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
