//! Pure state transition function
//!
//! Idle -> Listening -> Thinking -> Speaking -> Idle, with every failure
//! falling back to Idle. No I/O happens here.

use super::{Effect, Event, FailureSource, InteractionState};
use crate::avatar::MouthAnimation;
use crate::conversation::{Conversation, Turn};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: InteractionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: InteractionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }
}

/// Events the current state does not accept. The state is left unchanged.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("EcoBot is busy; activation is only accepted while idle")]
    Busy,
    #[error("{event} does not apply while {state}")]
    Stale {
        state: &'static str,
        event: &'static str,
    },
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs. `conversation`
/// is read only to snapshot the history sent with a chat request.
pub fn transition(
    state: &InteractionState,
    conversation: &Conversation,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Activation
        // ============================================================
        (InteractionState::Idle, Event::Activate) => {
            Ok(TransitionResult::new(InteractionState::Listening)
                .with_effect(Effect::StartCapture)
                .with_effect(Effect::NotifyState))
        }

        (_, Event::Activate) => Err(TransitionError::Busy),

        // ============================================================
        // Listening
        // ============================================================
        (InteractionState::Listening, Event::Transcript { text }) if text.trim().is_empty() => {
            Ok(TransitionResult::new(InteractionState::Idle)
                .with_effect(Effect::StopCapture)
                .with_effect(Effect::NotifyState))
        }

        (InteractionState::Listening, Event::Transcript { text }) => {
            Ok(TransitionResult::new(InteractionState::Thinking {
                message: text.clone(),
            })
            .with_effect(Effect::StopCapture)
            .with_effect(Effect::request_reply(text, conversation.turns()))
            .with_effect(Effect::NotifyState))
        }

        (InteractionState::Listening, Event::CaptureEnded) => {
            Ok(TransitionResult::new(InteractionState::Idle).with_effect(Effect::NotifyState))
        }

        (InteractionState::Listening, Event::CaptureError { message }) => {
            Ok(TransitionResult::new(InteractionState::Idle)
                .with_effect(Effect::report(FailureSource::Capture, message))
                .with_effect(Effect::NotifyState))
        }

        // ============================================================
        // Thinking
        // ============================================================
        (InteractionState::Thinking { message }, Event::ReplyReceived { reply }) => {
            let animation = MouthAnimation::start();
            Ok(TransitionResult::new(InteractionState::Speaking { animation })
                .with_effect(Effect::AppendTurn(Turn::user(message.clone())))
                .with_effect(Effect::AppendTurn(Turn::model(reply.clone())))
                .with_effect(Effect::StartAnimation)
                .with_effect(Effect::Speak { text: reply })
                .with_effect(Effect::NotifyState))
        }

        (InteractionState::Thinking { .. }, Event::RequestFailed { message }) => {
            Ok(TransitionResult::new(InteractionState::Idle)
                .with_effect(Effect::report(FailureSource::Request, message))
                .with_effect(Effect::NotifyState))
        }

        // ============================================================
        // Speaking
        // ============================================================
        (InteractionState::Speaking { animation }, Event::AnimationTick) => {
            let animation = animation.advance();
            Ok(TransitionResult::new(InteractionState::Speaking { animation })
                .with_effect(Effect::NotifyFrame {
                    frame: animation.frame(),
                }))
        }

        (InteractionState::Speaking { animation }, Event::SpeechBoundary { frame }) => {
            let animation = animation.jump_to(frame);
            Ok(TransitionResult::new(InteractionState::Speaking { animation })
                .with_effect(Effect::NotifyFrame {
                    frame: animation.frame(),
                }))
        }

        (InteractionState::Speaking { .. }, Event::SpeechEnded) => {
            Ok(TransitionResult::new(InteractionState::Idle)
                .with_effect(Effect::StopAnimation)
                .with_effect(Effect::NotifyState))
        }

        (InteractionState::Speaking { .. }, Event::SpeechError { message }) => {
            Ok(TransitionResult::new(InteractionState::Idle)
                .with_effect(Effect::StopAnimation)
                .with_effect(Effect::report(FailureSource::Output, message))
                .with_effect(Effect::NotifyState))
        }

        // ============================================================
        // Late or out-of-order callbacks
        // ============================================================
        (state, event) => Err(TransitionError::Stale {
            state: state.name(),
            event: event.name(),
        }),
    }
}
