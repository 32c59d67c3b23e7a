//! Interaction state types

use crate::avatar::{Accent, AvatarFrame, MouthAnimation, StateView};

/// Phase of the voice kiosk
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InteractionState {
    /// Waiting for a tap
    #[default]
    Idle,

    /// Microphone open, waiting for a final transcript
    Listening,

    /// Transcript sent to the chat endpoint, waiting for the reply
    Thinking {
        /// What the visitor said; becomes the user turn once a reply arrives
        message: String,
    },

    /// Reply being spoken
    Speaking { animation: MouthAnimation },
}

impl InteractionState {
    pub fn name(&self) -> &'static str {
        match self {
            InteractionState::Idle => "idle",
            InteractionState::Listening => "listening",
            InteractionState::Thinking { .. } => "thinking",
            InteractionState::Speaking { .. } => "speaking",
        }
    }

    /// Status pill text
    pub fn label(&self) -> &'static str {
        match self {
            InteractionState::Idle => "Presiona la pantalla",
            InteractionState::Listening => "Escuchando",
            InteractionState::Thinking { .. } => "Pensando",
            InteractionState::Speaking { .. } => "Hablando",
        }
    }

    pub fn accent(&self) -> Option<Accent> {
        match self {
            InteractionState::Listening => Some(Accent::Recording),
            InteractionState::Speaking { .. } => Some(Accent::Talking),
            _ => None,
        }
    }

    /// Static face except while speaking
    pub fn avatar(&self) -> AvatarFrame {
        match self {
            InteractionState::Speaking { animation } => animation.frame(),
            _ => AvatarFrame::REST,
        }
    }

    pub fn view(&self) -> StateView {
        StateView {
            state: self.name(),
            label: self.label(),
            image: self.avatar().image_path(),
            accent: self.accent(),
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, InteractionState::Idle)
    }
}
