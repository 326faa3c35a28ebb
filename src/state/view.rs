//! Client-visible projection of a session

use super::AppState;
use crate::error::{SessionError, SessionResult};
use crate::protocol::{PlayerView, ServerMessage, SessionView};
use crate::types::*;

impl Session {
    /// Derive the view sent to members. The question is only shown while a
    /// round runs; neither form of the answer is ever included.
    pub fn project(&self) -> SessionView {
        let in_progress = self.in_progress();
        SessionView {
            session_id: self.id.clone(),
            players: self
                .ordered_players()
                .map(|p| PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    score: p.score,
                    attempts_left: p.attempts_left,
                    is_gm: p.id == self.gm,
                })
                .collect(),
            gm: self.gm.clone(),
            in_progress,
            question: if in_progress {
                self.question.clone()
            } else {
                None
            },
            winner: self.winner.clone(),
            deadline: if in_progress {
                self.deadline.map(|d| d.to_rfc3339())
            } else {
                None
            },
        }
    }
}

impl AppState {
    /// Push the current view to every member of the session
    pub(crate) fn publish(&self, session: &Session) {
        let msg = ServerMessage::SessionState(session.project());
        self.broadcaster.send_to_all(&session.join_order, &msg);
    }

    /// Re-publish the view of the requester's session
    pub async fn republish(&self, connection_id: &str) -> SessionResult<()> {
        let registry = self.registry.lock().await;
        let session = registry
            .session_of(connection_id)
            .and_then(|id| registry.get(id))
            .ok_or(SessionError::NotInSession)?;
        self.publish(session);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use chrono::Utc;

    fn session() -> Session {
        let mut session = Session::new("S1".to_string(), Player::new("a".into(), "Alice".into()));
        session
            .add_player(Player::new("b".into(), "Bob".into()))
            .unwrap();
        session
            .add_player(Player::new("c".into(), "Carol".into()))
            .unwrap();
        session
    }

    #[test]
    fn test_idle_view_hides_question() {
        let config = GameConfig::default();
        let mut session = session();
        session
            .set_question("a", "Capital of France", "Paris", &config)
            .unwrap();

        let view = session.project();
        assert_eq!(view.session_id, "S1");
        assert!(!view.in_progress);
        assert!(view.question.is_none());
        assert!(view.deadline.is_none());

        let names: Vec<_> = view.players.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
        assert!(view.players[0].is_gm);
        assert!(!view.players[1].is_gm);
    }

    #[test]
    fn test_running_view_shows_question_not_answer() {
        let config = GameConfig::default();
        let mut session = session();
        session
            .set_question("a", "Capital of France", "Paris", &config)
            .unwrap();
        session.begin_round("a", &config, Utc::now()).unwrap();

        let view = session.project();
        assert!(view.in_progress);
        assert_eq!(view.question.as_deref(), Some("Capital of France"));
        assert!(view.deadline.is_some());
        assert!(view.players.iter().all(|p| p.attempts_left == 3));

        let json = serde_json::to_string(&ServerMessage::SessionState(view)).unwrap();
        assert!(!json.contains("Paris"));
        assert!(!json.contains("paris"));
    }

    #[tokio::test]
    async fn test_republish_requires_membership() {
        let state = AppState::new();
        assert_eq!(state.republish("x").await, Err(SessionError::NotInSession));

        let mut rx = state.broadcaster.register("a");
        state.create_session("a", "Alice", None).await.unwrap();
        while rx.try_recv().is_ok() {}

        state.republish("a").await.unwrap();
        assert!(matches!(rx.try_recv(), Ok(ServerMessage::SessionState(_))));
    }
}
