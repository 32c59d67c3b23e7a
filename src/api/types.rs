//! API request and response types

use crate::avatar::AvatarFrame;
use crate::conversation::Turn;
use crate::voice::Event;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Vec<Turn>,
}

/// Successful reply from `POST /api/chat`
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Response for session creation
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub id: String,
}

/// Response for actions with nothing to return
#[derive(Debug, Serialize)]
pub struct OkResponse {
    pub ok: bool,
}

/// User and device callbacks posted by the kiosk page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeviceEvent {
    Activate,
    Transcript { text: String },
    CaptureEnded,
    CaptureError { error: String },
    SpeechBoundary,
    SpeechEnded,
    SpeechError { error: String },
}

impl DeviceEvent {
    /// Session event for this callback. Word boundaries pick a random mouth frame.
    pub fn into_event<R: Rng + ?Sized>(self, rng: &mut R) -> Event {
        match self {
            DeviceEvent::Activate => Event::Activate,
            DeviceEvent::Transcript { text } => Event::Transcript { text },
            DeviceEvent::CaptureEnded => Event::CaptureEnded,
            DeviceEvent::CaptureError { error } => Event::CaptureError { message: error },
            DeviceEvent::SpeechBoundary => Event::SpeechBoundary {
                frame: AvatarFrame::random(rng),
            },
            DeviceEvent::SpeechEnded => Event::SpeechEnded,
            DeviceEvent::SpeechError { error } => Event::SpeechError { message: error },
        }
    }
}

/// Request to send a typed message
#[derive(Debug, Deserialize)]
pub struct TypedSendRequest {
    pub text: String,
}

/// Current state of a typed chat session
#[derive(Debug, Serialize)]
pub struct TypedSnapshot {
    pub turns: Vec<Turn>,
    pub awaiting: bool,
    /// Whether the send control may be enabled once the draft is non-blank
    pub accepts_message: bool,
}

/// Response for a typed send
#[derive(Debug, Serialize)]
pub struct TypedSendResponse {
    pub reply: String,
    pub turns: Vec<Turn>,
}
