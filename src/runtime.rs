//! Runtime for kiosk voice sessions and typed chat sessions
//!
//! Every kiosk session is one `VoiceRuntime` task. The page talks to it over
//! SSE (state, frames, device commands) and reports device callbacks back as
//! events. Typed chat sessions are plain locked state.
//!
//! Pages normally close their sessions on `pagehide`; sessions whose page
//! vanished without saying so are reaped once they have been idle long enough.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::VoiceRuntime;
pub use traits::*;

use crate::avatar::StateView;
use crate::conversation::Turn;
use crate::typed_chat::TypedChat;
use crate::voice::{Event, InteractionState};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, Mutex, RwLock};

/// Type alias for production runtime with concrete implementations
pub type ProductionRuntime =
    VoiceRuntime<Arc<BrowserDevices>, Arc<BrowserDevices>, dyn ChatClient>;

const DEFAULT_LOCALE: &str = "es-CO";
const DEFAULT_SPEECH_RATE: f32 = 1.2;
const DEFAULT_FRAME_INTERVAL_MS: u64 = 25;

const UPDATE_CAPACITY: usize = 128;
/// Commands get their own channel so frame bursts can never push them out
const COMMAND_CAPACITY: usize = 16;
/// How often the reaper looks for abandoned sessions
const REAP_INTERVAL: Duration = Duration::from_secs(30);

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum SseEvent {
    Init {
        snapshot: KioskSnapshot,
        /// Every frame image, for preloading
        frames: Vec<String>,
    },
    StateChange {
        view: StateView,
    },
    Frame {
        image: String,
    },
    Command(DeviceCommand),
}

/// Instructions for the speech devices in the kiosk page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum DeviceCommand {
    StartCapture { lang: String },
    StopCapture,
    Speak { text: String, lang: String, rate: f32 },
    CancelSpeech,
}

/// What a newly connected page needs to render the session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KioskSnapshot {
    pub view: StateView,
    pub turns: Vec<Turn>,
}

impl Default for KioskSnapshot {
    fn default() -> Self {
        Self {
            view: InteractionState::Idle.view(),
            turns: vec![],
        }
    }
}

/// Speech and animation settings for kiosk sessions
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceConfig {
    pub locale: String,
    pub speech_rate: f32,
    pub frame_interval: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            locale: DEFAULT_LOCALE.to_string(),
            speech_rate: DEFAULT_SPEECH_RATE,
            frame_interval: Duration::from_millis(DEFAULT_FRAME_INTERVAL_MS),
        }
    }
}

impl VoiceConfig {
    /// Read `ECOBOT_LOCALE`, `ECOBOT_SPEECH_RATE` and `ECOBOT_FRAME_INTERVAL_MS`.
    /// Invalid values are logged and replaced by the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(locale) = lookup("ECOBOT_LOCALE").filter(|l| !l.trim().is_empty()) {
            config.locale = locale.trim().to_string();
        }

        if let Some(raw) = lookup("ECOBOT_SPEECH_RATE") {
            match raw.trim().parse::<f32>() {
                Ok(rate) if rate > 0.0 && rate.is_finite() => config.speech_rate = rate,
                _ => tracing::warn!(value = %raw, "Invalid ECOBOT_SPEECH_RATE, using default"),
            }
        }

        if let Some(raw) = lookup("ECOBOT_FRAME_INTERVAL_MS") {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.frame_interval = Duration::from_millis(ms),
                _ => {
                    tracing::warn!(value = %raw, "Invalid ECOBOT_FRAME_INTERVAL_MS, using default");
                }
            }
        }

        config
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("session {0} has stopped")]
    Closed(String),
}

/// Handle to interact with a running kiosk session
#[derive(Clone)]
pub struct KioskHandle {
    pub event_tx: mpsc::Sender<Event>,
    /// State changes and frames
    pub broadcast_tx: broadcast::Sender<SseEvent>,
    /// Instructions for the page's speech devices
    pub command_tx: broadcast::Sender<DeviceCommand>,
    snapshot_rx: watch::Receiver<KioskSnapshot>,
}

impl KioskHandle {
    pub fn snapshot(&self) -> KioskSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Whether any page is currently streaming this session
    fn has_subscribers(&self) -> bool {
        self.broadcast_tx.receiver_count() > 0 || self.command_tx.receiver_count() > 0
    }
}

/// One connected page's view of a kiosk session
pub struct KioskSubscription {
    pub snapshot: KioskSnapshot,
    pub updates: broadcast::Receiver<SseEvent>,
    pub commands: broadcast::Receiver<DeviceCommand>,
}

struct KioskEntry {
    handle: KioskHandle,
    /// When the reaper first saw the session without subscribers
    idle_since: Option<Instant>,
}

struct TypedEntry {
    chat: Arc<Mutex<TypedChat>>,
    last_used: Instant,
}

/// Manager for all live sessions
pub struct SessionManager {
    chat: Arc<dyn ChatClient>,
    voice: VoiceConfig,
    kiosks: RwLock<HashMap<String, KioskEntry>>,
    typed: RwLock<HashMap<String, TypedEntry>>,
}

impl SessionManager {
    pub fn new(chat: Arc<dyn ChatClient>, voice: VoiceConfig) -> Self {
        Self {
            chat,
            voice,
            kiosks: RwLock::new(HashMap::new()),
            typed: RwLock::new(HashMap::new()),
        }
    }

    /// Client used by kiosk and typed sessions
    pub fn chat_client(&self) -> &Arc<dyn ChatClient> {
        &self.chat
    }

    // ========================================================================
    // Kiosk sessions
    // ========================================================================

    /// Start a voice session and return its id
    pub async fn open_kiosk(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(UPDATE_CAPACITY);
        let (command_tx, _) = broadcast::channel(COMMAND_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(KioskSnapshot::default());

        let devices = Arc::new(BrowserDevices::new(
            command_tx.clone(),
            self.voice.locale.clone(),
            self.voice.speech_rate,
        ));

        let runtime: ProductionRuntime = VoiceRuntime::new(
            id.clone(),
            devices.clone(),
            devices,
            self.chat.clone(),
            self.voice.frame_interval,
            event_rx,
            &event_tx,
            broadcast_tx.clone(),
            snapshot_tx,
        );

        let session_id = id.clone();
        tokio::spawn(async move {
            runtime.run().await;
            tracing::info!(session = %session_id, "Kiosk runtime finished");
        });

        let handle = KioskHandle {
            event_tx,
            broadcast_tx,
            command_tx,
            snapshot_rx,
        };
        self.kiosks.write().await.insert(
            id.clone(),
            KioskEntry {
                handle,
                idle_since: None,
            },
        );

        id
    }

    async fn kiosk(&self, id: &str) -> Result<KioskHandle, SessionError> {
        self.kiosks
            .read()
            .await
            .get(id)
            .map(|entry| entry.handle.clone())
            .ok_or_else(|| SessionError::NotFound(id.to_string()))
    }

    /// Send an event to a kiosk session
    pub async fn send_event(&self, id: &str, event: Event) -> Result<(), SessionError> {
        let handle = self.kiosk(id).await?;
        handle
            .event_tx
            .send(event)
            .await
            .map_err(|_| SessionError::Closed(id.to_string()))
    }

    /// Subscribe to session updates and device commands, along with the
    /// current snapshot
    pub async fn subscribe(&self, id: &str) -> Result<KioskSubscription, SessionError> {
        let handle = self.kiosk(id).await?;
        Ok(KioskSubscription {
            updates: handle.broadcast_tx.subscribe(),
            commands: handle.command_tx.subscribe(),
            snapshot: handle.snapshot(),
        })
    }

    /// Drop a kiosk session; its runtime stops once in-flight work drains
    pub async fn close_kiosk(&self, id: &str) -> Result<(), SessionError> {
        if self.kiosks.write().await.remove(id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        tracing::info!(session = %id, "Closed kiosk session");
        Ok(())
    }

    // ========================================================================
    // Typed chat sessions
    // ========================================================================

    pub async fn open_typed(&self) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        self.typed.write().await.insert(
            id.clone(),
            TypedEntry {
                chat: Arc::new(Mutex::new(TypedChat::new())),
                last_used: Instant::now(),
            },
        );
        tracing::info!(session = %id, "Opened typed chat session");
        id
    }

    /// Look up a typed session and mark it as used
    pub async fn typed(&self, id: &str) -> Result<Arc<Mutex<TypedChat>>, SessionError> {
        let mut sessions = self.typed.write().await;
        let entry = sessions
            .get_mut(id)
            .ok_or_else(|| SessionError::NotFound(id.to_string()))?;
        entry.last_used = Instant::now();
        Ok(entry.chat.clone())
    }

    pub async fn close_typed(&self, id: &str) -> Result<(), SessionError> {
        if self.typed.write().await.remove(id).is_none() {
            return Err(SessionError::NotFound(id.to_string()));
        }
        tracing::info!(session = %id, "Closed typed chat session");
        Ok(())
    }

    // ========================================================================
    // Reaping
    // ========================================================================

    /// Close sessions nobody has touched for `max_idle`.
    ///
    /// A kiosk counts as idle from the first sweep that finds no page
    /// streaming it. A typed session is idle once no request is using it and
    /// its last lookup is older than `max_idle`. Returns how many were closed.
    pub async fn reap_idle(&self, max_idle: Duration) -> usize {
        let now = Instant::now();
        let mut reaped = Vec::new();

        self.kiosks.write().await.retain(|id, entry| {
            if entry.handle.has_subscribers() {
                entry.idle_since = None;
                return true;
            }
            let since = *entry.idle_since.get_or_insert(now);
            if now.duration_since(since) < max_idle {
                return true;
            }
            reaped.push(("kiosk", id.clone()));
            false
        });

        self.typed.write().await.retain(|id, entry| {
            let in_use = Arc::strong_count(&entry.chat) > 1;
            if in_use || now.duration_since(entry.last_used) < max_idle {
                return true;
            }
            reaped.push(("typed", id.clone()));
            false
        });

        for (kind, id) in &reaped {
            tracing::info!(session = %id, kind = *kind, "Reaped idle session");
        }
        reaped.len()
    }

    /// Periodically reap sessions idle for longer than `max_idle`.
    /// The task ends when the manager is dropped.
    pub fn spawn_reaper(self: &Arc<Self>, max_idle: Duration) {
        let sessions = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(REAP_INTERVAL);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(sessions) = sessions.upgrade() else {
                    break;
                };
                sessions.reap_idle(max_idle).await;
            }
        });
    }
}
