//! Voice session executor

use super::traits::{ChatClient, SpeechCapture, SpeechOutput};
use super::{KioskSnapshot, SseEvent};
use crate::conversation::{Conversation, Turn};
use crate::voice::{transition, Effect, Event, InteractionState, TransitionError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Runs one kiosk session: owns its state and conversation, applies events
/// one at a time, and performs the resulting effects.
///
/// The runtime keeps only a weak handle to its own event channel, so it stops
/// once every external sender is dropped and in-flight work has finished.
pub struct VoiceRuntime<C, O, L>
where
    C: SpeechCapture + 'static,
    O: SpeechOutput + 'static,
    L: ChatClient + ?Sized + 'static,
{
    session_id: String,
    state: InteractionState,
    conversation: Conversation,
    capture: C,
    output: O,
    chat: Arc<L>,
    frame_interval: Duration,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::WeakSender<Event>,
    broadcast_tx: broadcast::Sender<SseEvent>,
    snapshot_tx: watch::Sender<KioskSnapshot>,
    /// Token to stop the running mouth animation
    animation_cancel: Option<CancellationToken>,
}

impl<C, O, L> VoiceRuntime<C, O, L>
where
    C: SpeechCapture + 'static,
    O: SpeechOutput + 'static,
    L: ChatClient + ?Sized + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: impl Into<String>,
        capture: C,
        output: O,
        chat: Arc<L>,
        frame_interval: Duration,
        event_rx: mpsc::Receiver<Event>,
        event_tx: &mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SseEvent>,
        snapshot_tx: watch::Sender<KioskSnapshot>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            state: InteractionState::Idle,
            conversation: Conversation::new(),
            capture,
            output,
            chat,
            frame_interval,
            event_rx,
            event_tx: event_tx.downgrade(),
            broadcast_tx,
            snapshot_tx,
            animation_cancel: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session = %self.session_id, "Starting voice session");
        self.publish_snapshot();

        while let Some(event) = self.event_rx.recv().await {
            self.process_event(event);
        }

        self.stop_animation();
        self.capture.stop();
        self.output.cancel();
        tracing::info!(
            session = %self.session_id,
            turns = self.conversation.len(),
            "Voice session stopped"
        );
    }

    fn process_event(&mut self, event: Event) {
        // Device failures raised while executing effects are queued here
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            let event_name = current_event.name();
            let result = match transition(&self.state, &self.conversation, current_event) {
                Ok(r) => r,
                Err(e @ TransitionError::Busy) => {
                    tracing::debug!(session = %self.session_id, error = %e, "Ignoring activation");
                    continue;
                }
                Err(e @ TransitionError::Stale { .. }) => {
                    tracing::debug!(session = %self.session_id, error = %e, "Ignoring stale event");
                    continue;
                }
            };

            let old_state = std::mem::replace(&mut self.state, result.new_state);
            if old_state.name() != self.state.name() {
                tracing::debug!(
                    session = %self.session_id,
                    from = old_state.name(),
                    to = self.state.name(),
                    event = event_name,
                    "State transition"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect) {
                    events_to_process.push(generated_event);
                }
            }
        }
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<Event> {
        match effect {
            Effect::StartCapture => self.capture.start().err().map(|e| Event::CaptureError {
                message: e.to_string(),
            }),

            Effect::StopCapture => {
                self.capture.stop();
                None
            }

            Effect::RequestReply { message, history } => self.request_reply(message, history),

            Effect::AppendTurn(turn) => {
                self.conversation.push(turn);
                None
            }

            Effect::Speak { text } => self.output.speak(&text).err().map(|e| Event::SpeechError {
                message: e.to_string(),
            }),

            Effect::StartAnimation => {
                self.start_animation();
                None
            }

            Effect::StopAnimation => {
                self.stop_animation();
                None
            }

            Effect::NotifyState => {
                self.publish_snapshot();
                let _ = self.broadcast_tx.send(SseEvent::StateChange {
                    view: self.state.view(),
                });
                None
            }

            Effect::NotifyFrame { frame } => {
                let _ = self.broadcast_tx.send(SseEvent::Frame {
                    image: frame.image_path(),
                });
                None
            }

            Effect::ReportFailure { source, message } => {
                tracing::warn!(
                    session = %self.session_id,
                    source = source.as_str(),
                    error = %message,
                    "Voice interaction failed"
                );
                None
            }
        }
    }

    /// Spawn the chat call; its outcome comes back as an event
    fn request_reply(&self, message: String, history: Vec<Turn>) -> Option<Event> {
        let Some(event_tx) = self.event_tx.upgrade() else {
            return Some(Event::RequestFailed {
                message: "session closed".to_string(),
            });
        };
        let chat = self.chat.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            tracing::debug!(session = %session_id, history_len = history.len(), "Requesting reply");
            let event = match chat.reply(&message, &history).await {
                Ok(reply) => Event::ReplyReceived { reply },
                Err(e) => Event::RequestFailed {
                    message: e.to_string(),
                },
            };
            let _ = event_tx.send(event).await;
        });
        None
    }

    fn start_animation(&mut self) {
        self.stop_animation();

        let token = CancellationToken::new();
        let child = token.clone();
        let event_tx = self.event_tx.clone();
        let period = self.frame_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                tokio::select! {
                    () = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(tx) = event_tx.upgrade() else { break };
                        let sent = tx.try_send(Event::AnimationTick);
                        if let Err(mpsc::error::TrySendError::Closed(_)) = sent {
                            break;
                        }
                    }
                }
            }
        });

        self.animation_cancel = Some(token);
    }

    fn stop_animation(&mut self) {
        if let Some(token) = self.animation_cancel.take() {
            token.cancel();
        }
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(KioskSnapshot {
            view: self.state.view(),
            turns: self.conversation.turns().to_vec(),
        });
    }
}
