//! Mock implementations for testing
//!
//! These mocks drive a `VoiceRuntime` without a browser or a model.

use super::traits::*;
use super::{KioskSnapshot, SseEvent};
use crate::chat::ChatError;
use crate::conversation::Turn;
use crate::voice::Event;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify, Semaphore};

// ============================================================================
// Mock Chat Client
// ============================================================================

/// Chat client that returns queued replies
pub struct MockChatClient {
    replies: Mutex<VecDeque<Result<String, String>>>,
    requests: Mutex<Vec<(String, Vec<Turn>)>>,
    /// When set, each reply waits for a permit from `release`
    gate: Option<Semaphore>,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            gate: None,
            request_started: Arc::new(Notify::new()),
        }
    }

    /// A client whose replies are held until `release` is called
    pub fn held() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    pub fn queue_reply(&self, reply: &str) {
        self.replies.lock().unwrap().push_back(Ok(reply.to_string()));
    }

    pub fn queue_failure(&self, message: &str) {
        self.replies
            .lock()
            .unwrap()
            .push_back(Err(message.to_string()));
    }

    /// Let one held reply through
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn recorded_requests(&self) -> Vec<(String, Vec<Turn>)> {
        self.requests.lock().unwrap().clone()
    }
}

impl Default for MockChatClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn reply(&self, message: &str, history: &[Turn]) -> Result<String, ChatError> {
        self.requests
            .lock()
            .unwrap()
            .push((message.to_string(), history.to_vec()));
        self.request_started.notify_one();

        if let Some(gate) = &self.gate {
            gate.acquire().await.unwrap().forget();
        }

        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(message)) => Err(ChatError::Endpoint {
                status: 500,
                message,
            }),
            None => Err(ChatError::Endpoint {
                status: 500,
                message: "No mock reply queued".to_string(),
            }),
        }
    }
}

// ============================================================================
// Fake Devices
// ============================================================================

/// What the fake devices were asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceCall {
    StartCapture,
    StopCapture,
    Speak(String),
    CancelSpeech,
}

/// Capture and output in one fake, recording every call
#[derive(Default)]
pub struct FakeDevices {
    calls: Mutex<Vec<DeviceCall>>,
    capture_error: Mutex<Option<DeviceError>>,
    speech_error: Mutex<Option<DeviceError>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `start` fail with `error`
    pub fn fail_capture(&self, error: DeviceError) {
        *self.capture_error.lock().unwrap() = Some(error);
    }

    /// Make every `speak` fail with `error`
    pub fn fail_speech(&self, error: DeviceError) {
        *self.speech_error.lock().unwrap() = Some(error);
    }

    pub fn calls(&self) -> Vec<DeviceCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                DeviceCall::Speak(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: DeviceCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl SpeechCapture for FakeDevices {
    fn start(&self) -> Result<(), DeviceError> {
        self.record(DeviceCall::StartCapture);
        match self.capture_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn stop(&self) {
        self.record(DeviceCall::StopCapture);
    }
}

impl SpeechOutput for FakeDevices {
    fn speak(&self, text: &str) -> Result<(), DeviceError> {
        self.record(DeviceCall::Speak(text.to_string()));
        match self.speech_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn cancel(&self) {
        self.record(DeviceCall::CancelSpeech);
    }
}

// ============================================================================
// Test Harness
// ============================================================================

/// A running `VoiceRuntime` over fakes
pub struct TestSession {
    pub devices: Arc<FakeDevices>,
    pub chat: Arc<MockChatClient>,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<SseEvent>,
    pub snapshot_rx: watch::Receiver<KioskSnapshot>,
}

impl TestSession {
    pub fn start(chat: MockChatClient) -> Self {
        Self::start_with(chat, FakeDevices::new(), Duration::from_secs(3600))
    }

    pub fn start_with(
        chat: MockChatClient,
        devices: FakeDevices,
        frame_interval: Duration,
    ) -> Self {
        let devices = Arc::new(devices);
        let chat = Arc::new(chat);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(256);
        let (snapshot_tx, snapshot_rx) = watch::channel(KioskSnapshot::default());

        let runtime = super::VoiceRuntime::new(
            "test-session",
            devices.clone(),
            devices.clone(),
            chat.clone(),
            frame_interval,
            event_rx,
            &event_tx,
            broadcast_tx,
            snapshot_tx,
        );
        tokio::spawn(async move { runtime.run().await });

        Self {
            devices,
            chat,
            event_tx,
            broadcast_rx,
            snapshot_rx,
        }
    }

    pub async fn send(&self, event: Event) {
        self.event_tx.send(event).await.unwrap();
    }

    /// Wait for the session to announce `state`, then return the latest snapshot
    pub async fn wait_for(&mut self, state: &str) -> KioskSnapshot {
        let rx = &mut self.broadcast_rx;
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await {
                    Ok(SseEvent::StateChange { view }) if view.state == state => break,
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => panic!("session closed"),
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {state}"));
        self.snapshot_rx.borrow().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::voice::Event;

    fn transcript(text: &str) -> Event {
        Event::Transcript {
            text: text.to_string(),
        }
    }

    /// Activate, speak `text`, and wait for the reply to be spoken
    async fn complete_round(session: &mut TestSession, text: &str) -> KioskSnapshot {
        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(transcript(text)).await;
        let snapshot = session.wait_for("speaking").await;
        session.send(Event::SpeechEnded).await;
        session.wait_for("idle").await;
        snapshot
    }

    #[tokio::test]
    async fn test_mock_chat_client() {
        let client = MockChatClient::new();
        client.queue_reply("uno");
        client.queue_failure("dos");

        assert_eq!(client.reply("a", &[]).await.unwrap(), "uno");
        assert!(client.reply("b", &[]).await.is_err());
        assert!(client.reply("c", &[]).await.is_err());
        assert_eq!(client.recorded_requests().len(), 3);
    }

    #[tokio::test]
    async fn test_hola_scenario() {
        let chat = MockChatClient::new();
        chat.queue_reply("¡Hola! Soy EcoBot.");
        let mut session = TestSession::start(chat);

        let speaking = complete_round(&mut session, "Hola").await;

        assert_eq!(
            session.chat.recorded_requests(),
            vec![("Hola".to_string(), vec![])]
        );
        assert_eq!(
            speaking.turns,
            vec![Turn::user("Hola"), Turn::model("¡Hola! Soy EcoBot.")]
        );
        assert_eq!(
            session.devices.calls(),
            vec![
                DeviceCall::StartCapture,
                DeviceCall::StopCapture,
                DeviceCall::Speak("¡Hola! Soy EcoBot.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_second_round_sends_history() {
        let chat = MockChatClient::new();
        chat.queue_reply("¡Hola! Soy EcoBot.");
        chat.queue_reply("El compost es abono orgánico.");
        let mut session = TestSession::start(chat);

        complete_round(&mut session, "Hola").await;
        let speaking = complete_round(&mut session, "¿Qué es el compost?").await;

        let requests = session.chat.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[1].1,
            vec![Turn::user("Hola"), Turn::model("¡Hola! Soy EcoBot.")]
        );
        assert_eq!(speaking.turns.len(), 4);
    }

    #[tokio::test]
    async fn test_request_failure_appends_nothing() {
        let chat = MockChatClient::new();
        chat.queue_failure("HTTP 500");
        let mut session = TestSession::start(chat);

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(transcript("Hola")).await;

        session.wait_for("thinking").await;
        let idle = session.wait_for("idle").await;

        assert!(idle.turns.is_empty());
        assert!(session.devices.spoken().is_empty());
    }

    #[tokio::test]
    async fn test_activation_ignored_while_busy() {
        let mut session = TestSession::start(MockChatClient::held());
        session.chat.queue_reply("Hola");

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(Event::Activate).await;
        session.send(transcript("Hola")).await;
        session.wait_for("thinking").await;

        tokio::time::timeout(Duration::from_secs(2), session.chat.request_started.notified())
            .await
            .unwrap();
        session.send(Event::Activate).await;
        session.send(transcript("otra vez")).await;

        session.chat.release();
        session.wait_for("speaking").await;

        assert_eq!(session.chat.recorded_requests().len(), 1);
        let starts = session
            .devices
            .calls()
            .into_iter()
            .filter(|c| *c == DeviceCall::StartCapture)
            .count();
        assert_eq!(starts, 1);
    }

    #[tokio::test]
    async fn test_unsupported_capture_returns_to_idle() {
        let devices = FakeDevices::new();
        devices.fail_capture(DeviceError::Unsupported);
        let mut session =
            TestSession::start_with(MockChatClient::new(), devices, Duration::from_secs(3600));

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        let idle = session.wait_for("idle").await;

        assert!(idle.turns.is_empty());
        assert_eq!(session.devices.calls(), vec![DeviceCall::StartCapture]);
    }

    #[tokio::test]
    async fn test_speech_error_keeps_turns() {
        let chat = MockChatClient::new();
        chat.queue_reply("¡Hola!");
        let mut session = TestSession::start(chat);

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(transcript("Hola")).await;
        session.wait_for("speaking").await;
        session
            .send(Event::SpeechError {
                message: "interrupted".to_string(),
            })
            .await;

        let idle = session.wait_for("idle").await;
        assert_eq!(idle.turns.len(), 2);
    }

    #[tokio::test]
    async fn test_disconnected_speaker_returns_to_idle() {
        let chat = MockChatClient::new();
        chat.queue_reply("¡Hola!");
        let devices = FakeDevices::new();
        devices.fail_speech(DeviceError::Disconnected);
        let mut session = TestSession::start_with(chat, devices, Duration::from_secs(3600));

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(transcript("Hola")).await;
        session.wait_for("speaking").await;

        let idle = session.wait_for("idle").await;
        assert_eq!(idle.turns.len(), 2);
        assert_eq!(session.devices.spoken(), vec!["¡Hola!".to_string()]);
    }

    #[tokio::test]
    async fn test_ticks_emit_frames_until_speech_ends() {
        let chat = MockChatClient::new();
        chat.queue_reply("¡Hola!");
        let mut session =
            TestSession::start_with(chat, FakeDevices::new(), Duration::from_millis(5));

        session.send(Event::Activate).await;
        session.wait_for("listening").await;
        session.send(transcript("Hola")).await;
        session.wait_for("speaking").await;

        let mut frames = vec![];
        while frames.len() < 3 {
            let event = tokio::time::timeout(Duration::from_secs(2), session.broadcast_rx.recv())
                .await
                .unwrap()
                .unwrap();
            if let SseEvent::Frame { image } = event {
                frames.push(image);
            }
        }
        assert_eq!(frames[0], "/assets/frames/2.svg");
        assert_eq!(frames[1], "/assets/frames/3.svg");

        session.send(Event::SpeechEnded).await;
        let idle = session.wait_for("idle").await;
        assert_eq!(idle.view.image, "/assets/frames/0.svg");
    }

    #[tokio::test]
    async fn test_shutdown_releases_devices() {
        let session = TestSession::start(MockChatClient::new());
        let devices = session.devices.clone();
        session.send(Event::Activate).await;

        drop(session);
        tokio::time::timeout(Duration::from_secs(2), async {
            while !devices.calls().contains(&DeviceCall::CancelSpeech) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }
}
