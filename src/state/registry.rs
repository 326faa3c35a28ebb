use super::AppState;
use crate::error::{bounded_text, SessionError, SessionResult};
use crate::types::*;
use rand::Rng;
use std::collections::HashMap;
use tokio::task::JoinHandle;

/// Safe character set for session codes (excludes 0/O, 1/I/L to avoid confusion)
const CODE_CHARS: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 6;

/// Generate a random session code
fn generate_session_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LENGTH)
        .map(|_| CODE_CHARS[rng.random_range(0..CODE_CHARS.len())] as char)
        .collect()
}

/// Pending expiry task of a running round
#[derive(Debug)]
pub struct RoundTimer {
    /// Registry-wide unique token of the round this timer belongs to
    pub token: u64,
    handle: JoinHandle<()>,
}

impl RoundTimer {
    pub fn new(token: u64, handle: JoinHandle<()>) -> Self {
        Self { token, handle }
    }

    fn cancel(self) {
        self.handle.abort();
    }
}

/// Owns every live session, the connection -> session index and the
/// pending round timers keyed by session id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, Session>,
    members: HashMap<ConnectionId, SessionId>,
    timers: HashMap<SessionId, RoundTimer>,
    next_token: u64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.get(session_id)
    }

    pub fn get_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(session_id)
    }

    pub fn session_of(&self, connection_id: &str) -> Option<&SessionId> {
        self.members.get(connection_id)
    }

    /// Create a session holding only `creator`, who becomes its Game Master.
    ///
    /// A supplied id is used verbatim and fails with `DuplicateId` if taken;
    /// generated ids are retried until they miss every live session.
    pub fn create(&mut self, id: Option<SessionId>, creator: Player) -> SessionResult<SessionId> {
        let id = match id {
            Some(id) => {
                if self.sessions.contains_key(&id) {
                    return Err(SessionError::DuplicateId);
                }
                id
            }
            None => loop {
                let code = generate_session_code();
                if !self.sessions.contains_key(&code) {
                    break code;
                }
            },
        };

        self.members.insert(creator.id.clone(), id.clone());
        self.sessions
            .insert(id.clone(), Session::new(id.clone(), creator));
        Ok(id)
    }

    /// Remove a session, its membership entries and any pending timer
    pub fn delete(&mut self, session_id: &str) -> Option<Session> {
        self.cancel_timer(session_id);
        let session = self.sessions.remove(session_id)?;
        self.members.retain(|_, sid| sid != session_id);
        Some(session)
    }

    pub(super) fn index_member(&mut self, connection_id: &str, session_id: &str) {
        self.members
            .insert(connection_id.to_string(), session_id.to_string());
    }

    pub(super) fn unindex_member(&mut self, connection_id: &str) -> Option<SessionId> {
        self.members.remove(connection_id)
    }

    /// Fresh token for a round about to start
    pub fn next_round_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }

    /// Install the expiry timer for a session, aborting any previous one
    pub fn arm_timer(&mut self, session_id: &str, timer: RoundTimer) {
        if let Some(old) = self.timers.insert(session_id.to_string(), timer) {
            old.cancel();
        }
    }

    /// Abort the pending timer of a session. Returns whether one existed.
    pub fn cancel_timer(&mut self, session_id: &str) -> bool {
        match self.timers.remove(session_id) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Called by a firing timer: detaches it if it is still the current
    /// timer for the session. A `false` return means the timer is stale.
    pub fn take_timer(&mut self, session_id: &str, token: u64) -> bool {
        match self.timers.get(session_id) {
            Some(timer) if timer.token == token => {
                self.timers.remove(session_id);
                true
            }
            _ => false,
        }
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.len()
    }
}

impl AppState {
    /// Create a session with the requesting connection as its Game Master.
    ///
    /// A connection that already belongs to a session leaves it first, but
    /// only once the new request has been validated.
    pub async fn create_session(
        &self,
        connection_id: &str,
        name: &str,
        session_id: Option<String>,
    ) -> SessionResult<SessionId> {
        let name = bounded_text(name, "Name", self.config.max_name_chars)?;
        let requested = match session_id.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => Some(bounded_text(
                raw,
                "Session ID",
                self.config.max_session_id_chars,
            )?),
            _ => None,
        };

        let mut registry = self.registry.lock().await;
        if let Some(ref id) = requested {
            if registry.contains(id) {
                return Err(SessionError::DuplicateId);
            }
        }

        self.remove_member(&mut registry, connection_id);

        let id = registry.create(requested, Player::new(connection_id.to_string(), name))?;
        tracing::info!("Session {} created by {}", id, connection_id);

        if let Some(session) = registry.get(&id) {
            self.publish(session);
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn player(id: &str) -> Player {
        Player::new(id.to_string(), id.to_uppercase())
    }

    #[test]
    fn test_create_with_generated_id() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(None, player("a")).unwrap();

        assert_eq!(id.len(), CODE_LENGTH);
        assert!(id.bytes().all(|b| CODE_CHARS.contains(&b)));

        let session = registry.get(&id).unwrap();
        assert_eq!(session.gm, "a");
        assert_eq!(session.join_order, vec!["a".to_string()]);
        assert_eq!(session.round_state, RoundState::Idle);
        assert_eq!(registry.session_of("a"), Some(&id));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        let mut registry = SessionRegistry::new();
        for i in 0..200 {
            registry.create(None, player(&format!("p{}", i))).unwrap();
        }
        assert_eq!(registry.len(), 200);
    }

    #[test]
    fn test_supplied_id_collision_is_duplicate() {
        let mut registry = SessionRegistry::new();
        registry.create(Some("quiz".to_string()), player("a")).unwrap();

        let result = registry.create(Some("quiz".to_string()), player("b"));
        assert_eq!(result, Err(SessionError::DuplicateId));
        assert!(registry.session_of("b").is_none());
    }

    #[test]
    fn test_delete_drops_session_and_members() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(None, player("a")).unwrap();

        assert!(registry.delete(&id).is_some());
        assert!(registry.get(&id).is_none());
        assert!(registry.session_of("a").is_none());
        assert!(registry.delete(&id).is_none());
    }

    #[tokio::test]
    async fn test_delete_aborts_pending_timer() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(None, player("a")).unwrap();

        let token = registry.next_round_token();
        let handle = tokio::spawn(tokio::time::sleep(Duration::from_secs(3600)));
        let abort = handle.abort_handle();
        registry.arm_timer(&id, RoundTimer::new(token, handle));
        assert_eq!(registry.pending_timers(), 1);

        registry.delete(&id);
        assert_eq!(registry.pending_timers(), 0);

        for _ in 0..10 {
            if abort.is_finished() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(abort.is_finished());
    }

    #[tokio::test]
    async fn test_take_timer_rejects_stale_token() {
        let mut registry = SessionRegistry::new();
        let id = registry.create(None, player("a")).unwrap();

        let old = registry.next_round_token();
        let new = registry.next_round_token();
        assert!(new > old);

        let handle = tokio::spawn(async {});
        registry.arm_timer(&id, RoundTimer::new(new, handle));

        assert!(!registry.take_timer(&id, old));
        assert!(registry.take_timer(&id, new));
        assert!(!registry.take_timer(&id, new));
    }

    #[tokio::test]
    async fn test_create_session_validates_before_leaving() {
        let state = AppState::new();
        let first = state
            .create_session("a", "Alice", Some("room".to_string()))
            .await
            .unwrap();
        state
            .create_session("b", "Bob", Some("other".to_string()))
            .await
            .unwrap();

        // Duplicate id: Alice stays where she is
        let result = state
            .create_session("a", "Alice", Some("other".to_string()))
            .await;
        assert_eq!(result, Err(SessionError::DuplicateId));
        assert_eq!(state.session_of("a").await, Some(first.clone()));

        // Blank name rejected
        let result = state.create_session("c", "   ", None).await;
        assert!(matches!(result, Err(SessionError::InvalidInput(_))));

        // Blank id means auto-generate
        let id = state
            .create_session("c", "Carol", Some("  ".to_string()))
            .await
            .unwrap();
        assert_eq!(id.len(), CODE_LENGTH);
    }

    #[tokio::test]
    async fn test_create_session_moves_creator() {
        let state = AppState::new();
        let first = state.create_session("a", "Alice", None).await.unwrap();
        let second = state.create_session("a", "Alice", None).await.unwrap();

        // Sole member left, so the first session is gone
        assert!(state.get_session(&first).await.is_none());
        assert_eq!(state.session_of("a").await, Some(second));
        assert_eq!(state.session_count().await, 1);
    }
}
