//! Effects produced by state transitions

use crate::avatar::AvatarFrame;
use crate::conversation::Turn;

/// Which collaborator failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureSource {
    Capture,
    Request,
    Output,
}

impl FailureSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureSource::Capture => "speech_capture",
            FailureSource::Request => "chat_request",
            FailureSource::Output => "speech_output",
        }
    }
}

/// Effects to be executed after a state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Open the microphone
    StartCapture,

    /// Close the microphone
    StopCapture,

    /// Ask the chat endpoint for a reply
    RequestReply { message: String, history: Vec<Turn> },

    /// Append a turn to the session's conversation
    AppendTurn(Turn),

    /// Speak the reply aloud
    Speak { text: String },

    /// Start the mouth animation ticker
    StartAnimation,

    /// Stop the mouth animation ticker
    StopAnimation,

    /// Publish the new state to connected pages
    NotifyState,

    /// Publish a new avatar frame
    NotifyFrame { frame: AvatarFrame },

    /// Log a failed interaction
    ReportFailure {
        source: FailureSource,
        message: String,
    },
}

impl Effect {
    pub fn report(source: FailureSource, message: impl Into<String>) -> Self {
        Effect::ReportFailure {
            source,
            message: message.into(),
        }
    }

    pub fn request_reply(message: impl Into<String>, history: &[Turn]) -> Self {
        Effect::RequestReply {
            message: message.into(),
            history: history.to_vec(),
        }
    }
}
