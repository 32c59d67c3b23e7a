//! Trait abstractions for runtime I/O
//!
//! These traits let the voice runtime run against fake devices and a mock
//! chat client in tests.

use super::DeviceCommand;
use crate::chat::ChatError;
use crate::conversation::Turn;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

/// Failure starting a speech device
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("not supported by this client")]
    Unsupported,
    #[error("no kiosk page connected")]
    Disconnected,
    #[error("{0}")]
    Failed(String),
}

/// Produces replies for a message plus prior history
#[async_trait]
pub trait ChatClient: Send + Sync {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError>;
}

/// Microphone capture. Results arrive later as session events.
pub trait SpeechCapture: Send + Sync {
    fn start(&self) -> Result<(), DeviceError>;
    fn stop(&self);
}

/// Speech synthesis. Completion arrives later as a session event.
pub trait SpeechOutput: Send + Sync {
    fn speak(&self, text: &str) -> Result<(), DeviceError>;
    fn cancel(&self);
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: ChatClient + ?Sized> ChatClient for Arc<T> {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        (**self).reply(message, history).await
    }
}

impl<T: SpeechCapture + ?Sized> SpeechCapture for Arc<T> {
    fn start(&self) -> Result<(), DeviceError> {
        (**self).start()
    }

    fn stop(&self) {
        (**self).stop();
    }
}

impl<T: SpeechOutput + ?Sized> SpeechOutput for Arc<T> {
    fn speak(&self, text: &str) -> Result<(), DeviceError> {
        (**self).speak(text)
    }

    fn cancel(&self) {
        (**self).cancel();
    }
}

// ============================================================================
// Production Adapter
// ============================================================================

/// Speech devices living in the connected kiosk page.
///
/// Commands go out on the session's command channel, which the SSE stream
/// forwards to the page; the page reports results back through
/// `POST /api/kiosk/:id/events`.
pub struct BrowserDevices {
    commands: broadcast::Sender<DeviceCommand>,
    locale: String,
    speech_rate: f32,
}

impl BrowserDevices {
    pub fn new(
        commands: broadcast::Sender<DeviceCommand>,
        locale: String,
        speech_rate: f32,
    ) -> Self {
        Self {
            commands,
            locale,
            speech_rate,
        }
    }

    fn send(&self, command: DeviceCommand) -> Result<(), DeviceError> {
        self.commands
            .send(command)
            .map(|_| ())
            .map_err(|_| DeviceError::Disconnected)
    }
}

impl SpeechCapture for BrowserDevices {
    fn start(&self) -> Result<(), DeviceError> {
        self.send(DeviceCommand::StartCapture {
            lang: self.locale.clone(),
        })
    }

    fn stop(&self) {
        let _ = self.send(DeviceCommand::StopCapture);
    }
}

impl SpeechOutput for BrowserDevices {
    fn speak(&self, text: &str) -> Result<(), DeviceError> {
        self.send(DeviceCommand::Speak {
            text: text.to_string(),
            lang: self.locale.clone(),
            rate: self.speech_rate,
        })
    }

    fn cancel(&self) {
        let _ = self.send(DeviceCommand::CancelSpeech);
    }
}
