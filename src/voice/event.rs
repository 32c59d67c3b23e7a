//! Events that drive the voice kiosk

use crate::avatar::AvatarFrame;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // Visitor
    Activate,

    // Speech capture callbacks
    Transcript { text: String },
    CaptureEnded,
    CaptureError { message: String },

    // Chat endpoint
    ReplyReceived { reply: String },
    RequestFailed { message: String },

    // Speech output callbacks and animation
    AnimationTick,
    SpeechBoundary { frame: AvatarFrame },
    SpeechEnded,
    SpeechError { message: String },
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Activate => "activate",
            Event::Transcript { .. } => "transcript",
            Event::CaptureEnded => "capture_ended",
            Event::CaptureError { .. } => "capture_error",
            Event::ReplyReceived { .. } => "reply_received",
            Event::RequestFailed { .. } => "request_failed",
            Event::AnimationTick => "animation_tick",
            Event::SpeechBoundary { .. } => "speech_boundary",
            Event::SpeechEnded => "speech_ended",
            Event::SpeechError { .. } => "speech_error",
        }
    }
}
