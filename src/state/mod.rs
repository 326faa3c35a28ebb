mod membership;
mod registry;
mod round;
mod view;

pub use registry::{RoundTimer, SessionRegistry};

use crate::broadcast::Broadcaster;
use crate::config::GameConfig;
use crate::protocol::ServerMessage;
use crate::types::*;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state
///
/// Every intent handler and every round-expiry task holds the `registry`
/// lock for its full duration, so session events are applied strictly one
/// at a time.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Mutex<SessionRegistry>>,
    pub broadcaster: Broadcaster,
    pub config: Arc<GameConfig>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default())
    }

    pub fn with_config(config: GameConfig) -> Self {
        Self {
            registry: Arc::new(Mutex::new(SessionRegistry::new())),
            broadcaster: Broadcaster::new(),
            config: Arc::new(config),
        }
    }

    /// Snapshot of a session (for tests and diagnostics)
    pub async fn get_session(&self, session_id: &str) -> Option<Session> {
        self.registry.lock().await.get(session_id).cloned()
    }

    /// Session the connection currently belongs to
    pub async fn session_of(&self, connection_id: &str) -> Option<SessionId> {
        self.registry.lock().await.session_of(connection_id).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Narration to every member of a session
    fn narrate(&self, session: &Session, text: impl Into<String>) {
        self.broadcaster
            .send_to_all(&session.join_order, &ServerMessage::system(text));
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
