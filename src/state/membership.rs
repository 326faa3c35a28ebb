//! Joining and leaving sessions, GM reassignment on departure.

use super::{AppState, SessionRegistry};
use crate::error::{bounded_text, SessionError, SessionResult};
use crate::types::*;

impl Session {
    /// Append a player in arrival order. No joins while a round runs.
    pub fn add_player(&mut self, player: Player) -> SessionResult<()> {
        if self.in_progress() {
            return Err(SessionError::SessionInProgress);
        }
        if !self.players.contains_key(&player.id) {
            self.join_order.push(player.id.clone());
        }
        self.players.insert(player.id.clone(), player);
        Ok(())
    }

    pub fn remove_player(&mut self, id: &str) -> Option<Player> {
        let player = self.players.remove(id)?;
        self.join_order.retain(|p| p != id);
        Some(player)
    }

    /// If `departed` held the GM role, hand it to the earliest remaining
    /// player in join order. Returns the new GM when a handoff happened.
    pub fn reassign_gm(&mut self, departed: &str) -> Option<ConnectionId> {
        if self.gm != departed {
            return None;
        }
        let next = self.join_order.first()?.clone();
        self.gm = next.clone();
        Some(next)
    }
}

impl AppState {
    /// Join an existing session that is not mid-round
    pub async fn join_session(
        &self,
        connection_id: &str,
        session_id: &str,
        name: &str,
    ) -> SessionResult<()> {
        let name = bounded_text(name, "Name", self.config.max_name_chars)?;
        let session_id = session_id.trim();

        let mut registry = self.registry.lock().await;
        let session = registry
            .get(session_id)
            .ok_or(SessionError::SessionNotFound)?;

        if session.players.contains_key(connection_id) {
            self.publish(session);
            return Ok(());
        }
        if session.in_progress() {
            return Err(SessionError::SessionInProgress);
        }

        self.remove_member(&mut registry, connection_id);

        let session = registry
            .get_mut(session_id)
            .ok_or(SessionError::SessionNotFound)?;
        session.add_player(Player::new(connection_id.to_string(), name.clone()))?;
        tracing::info!(
            "{} ({}) joined session {} ({} players)",
            name,
            connection_id,
            session_id,
            session.player_count()
        );

        self.narrate(session, format!("{} joined the session", name));
        self.publish(session);
        registry.index_member(connection_id, session_id);
        Ok(())
    }

    /// Explicit leave. Returns the session that was left, `None` if the
    /// connection was not in one (not an error).
    pub async fn leave_session(&self, connection_id: &str) -> Option<SessionId> {
        let mut registry = self.registry.lock().await;
        self.remove_member(&mut registry, connection_id)
    }

    /// Transport-level disconnect; same removal path as an explicit leave
    pub async fn disconnect(&self, connection_id: &str) {
        let mut registry = self.registry.lock().await;
        if let Some(session_id) = self.remove_member(&mut registry, connection_id) {
            tracing::info!(
                "Connection {} dropped out of session {}",
                connection_id,
                session_id
            );
        }
    }

    /// Single removal routine shared by leave, disconnect and session moves.
    /// Idempotent: unknown connections are ignored.
    pub(super) fn remove_member(
        &self,
        registry: &mut SessionRegistry,
        connection_id: &str,
    ) -> Option<SessionId> {
        let session_id = registry.unindex_member(connection_id)?;
        let session = registry.get_mut(&session_id)?;
        let player = session.remove_player(connection_id)?;

        tracing::info!(
            "{} ({}) left session {}",
            player.name,
            connection_id,
            session_id
        );
        self.narrate(session, format!("{} left the session", player.name));

        if session.player_count() == 0 {
            registry.delete(&session_id);
            tracing::info!("Session {} is empty, deleted", session_id);
            return Some(session_id);
        }

        if let Some(new_gm) = session.reassign_gm(connection_id) {
            let gm_name = session.display_name(&new_gm);
            self.narrate(session, format!("{} is now the Game Master", gm_name));
        }

        if session.in_progress() && session.player_count() < 2 {
            self.end_round(registry, &session_id, EndReason::StoppedNotEnoughPlayers);
        } else {
            self.publish(session);
        }

        Some(session_id)
    }
}
