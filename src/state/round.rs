use super::{AppState, RoundTimer, SessionRegistry};
use crate::config::GameConfig;
use crate::error::{bounded_text, SessionError, SessionResult};
use crate::normalize::normalize;
use crate::protocol::{ServerMessage, WinnerInfo};
use crate::types::*;
use chrono::{DateTime, Utc};

/// What a single accepted guess did to the round
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuessOutcome {
    /// First correct guess of the round; the round must end now
    Won,
    /// Correct, but the round already has a winner
    AlreadyDecided,
    /// Arrived after a won round had already closed; nothing changes
    TooLate,
    Incorrect { attempts_left: u32 },
}

/// Result of closing a round
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
    pub reason: EndReason,
    pub winner: Option<WinnerInfo>,
    pub answer: String,
    pub previous_gm: ConnectionId,
    pub gm: ConnectionId,
}

impl Session {
    /// Store the question and answer for the next round (GM only, idle only)
    pub fn set_question(
        &mut self,
        requester: &str,
        question: &str,
        answer: &str,
        config: &GameConfig,
    ) -> SessionResult<()> {
        if self.in_progress() {
            return Err(SessionError::SessionInProgress);
        }
        if !self.is_gm(requester) {
            return Err(SessionError::NotAuthorized(
                "Only the Game Master can set the question".to_string(),
            ));
        }
        let question = bounded_text(question, "Question", config.max_question_chars)?;
        let answer = bounded_text(answer, "Answer", config.max_answer_chars)?;

        self.answer_canonical = Some(normalize(&answer));
        self.answer_original = Some(answer);
        self.question = Some(question);
        self.won_by_guess = false;
        Ok(())
    }

    /// Idle -> InProgress
    pub fn begin_round(
        &mut self,
        requester: &str,
        config: &GameConfig,
        now: DateTime<Utc>,
    ) -> SessionResult<()> {
        if self.in_progress() {
            return Err(SessionError::SessionInProgress);
        }
        if !self.is_gm(requester) {
            return Err(SessionError::NotAuthorized(
                "Only the Game Master can start the game".to_string(),
            ));
        }
        if self.player_count() < 2 {
            return Err(SessionError::NotEnoughPlayers);
        }
        if self.question.is_none() || self.answer_canonical.is_none() {
            return Err(SessionError::QuestionNotSet);
        }
        let deadline = round_deadline(now, config.round_seconds)?;

        for player in self.players.values_mut() {
            player.attempts_left = config.max_attempts;
        }
        self.winner = None;
        self.won_by_guess = false;
        self.round_no += 1;
        self.round_state = RoundState::InProgress;
        self.deadline = Some(deadline);
        Ok(())
    }

    /// Evaluate one guess. The attempt is consumed before comparing.
    pub fn apply_guess(
        &mut self,
        player_id: &str,
        text: &str,
        config: &GameConfig,
    ) -> SessionResult<GuessOutcome> {
        if !self.in_progress() {
            if self.won_by_guess && self.players.contains_key(player_id) {
                return Ok(GuessOutcome::TooLate);
            }
            return Err(SessionError::NoRoundInProgress);
        }
        if self.is_gm(player_id) {
            return Err(SessionError::NotAuthorized(
                "The Game Master cannot guess".to_string(),
            ));
        }
        let attempts = self
            .players
            .get(player_id)
            .map(|p| p.attempts_left)
            .ok_or(SessionError::NotInSession)?;
        if attempts == 0 {
            return Err(SessionError::NoAttemptsLeft);
        }
        let text = bounded_text(text, "Guess", config.max_guess_chars)?;

        let attempts_left = match self.players.get_mut(player_id) {
            Some(player) => {
                player.attempts_left = player.attempts_left.saturating_sub(1);
                player.attempts_left
            }
            None => return Err(SessionError::NotInSession),
        };

        if self.answer_canonical.as_deref() != Some(normalize(&text).as_str()) {
            return Ok(GuessOutcome::Incorrect { attempts_left });
        }

        // First decider wins
        if self.winner.is_some() {
            return Ok(GuessOutcome::AlreadyDecided);
        }
        self.winner = Some(player_id.to_string());
        Ok(GuessOutcome::Won)
    }

    /// InProgress -> Idle: award, reveal, rotate GM, reset round fields
    pub fn finish_round(&mut self, reason: EndReason, config: &GameConfig) -> RoundSummary {
        self.round_state = RoundState::Idle;
        self.deadline = None;
        self.won_by_guess = reason == EndReason::CorrectGuess;

        let winner = match self.winner.clone() {
            Some(id) => self.players.get_mut(&id).map(|p| {
                p.score += config.win_points;
                WinnerInfo {
                    id: p.id.clone(),
                    name: p.name.clone(),
                }
            }),
            None => None,
        };

        let answer = self.answer_original.take().unwrap_or_default();
        self.question = None;
        self.answer_canonical = None;

        let previous_gm = self.gm.clone();
        if let Some(next) = self.next_gm_after(&previous_gm) {
            self.gm = next;
        }

        for player in self.players.values_mut() {
            player.attempts_left = 0;
        }

        RoundSummary {
            reason,
            winner,
            answer,
            previous_gm,
            gm: self.gm.clone(),
        }
    }

    /// Player after `outgoing` in join order, wrapping; first player if
    /// `outgoing` is gone.
    fn next_gm_after(&self, outgoing: &str) -> Option<ConnectionId> {
        match self.join_order.iter().position(|id| id == outgoing) {
            Some(i) => self.join_order.get((i + 1) % self.join_order.len()).cloned(),
            None => self.join_order.first().cloned(),
        }
    }
}

/// `now + round_seconds`, or `InvalidInput` when that is not representable
fn round_deadline(now: DateTime<Utc>, round_seconds: u64) -> SessionResult<DateTime<Utc>> {
    i64::try_from(round_seconds)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .and_then(|d| now.checked_add_signed(d))
        .ok_or_else(|| SessionError::InvalidInput("Round duration is out of range".to_string()))
}

impl AppState {
    pub async fn set_question(
        &self,
        connection_id: &str,
        question: &str,
        answer: &str,
    ) -> SessionResult<()> {
        let mut registry = self.registry.lock().await;
        let session_id = registry
            .session_of(connection_id)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        let session = registry
            .get_mut(&session_id)
            .ok_or(SessionError::SessionNotFound)?;

        session.set_question(connection_id, question, answer, &self.config)?;
        tracing::info!("Question set in session {}", session_id);

        self.broadcaster.send_to(
            connection_id,
            ServerMessage::system("Question set. Start the game when everyone is ready."),
        );
        self.publish(session);
        Ok(())
    }

    /// Start a round and arm its expiry timer
    pub async fn start_game(&self, connection_id: &str) -> SessionResult<()> {
        let mut registry = self.registry.lock().await;
        let session_id = registry
            .session_of(connection_id)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        let session = registry
            .get_mut(&session_id)
            .ok_or(SessionError::SessionNotFound)?;

        session.begin_round(connection_id, &self.config, Utc::now())?;
        tracing::info!(
            "Round {} started in session {} ({} players)",
            session.round_no,
            session_id,
            session.player_count()
        );

        let started = ServerMessage::GameStarted {
            question: session.question.clone().unwrap_or_default(),
            duration: self.config.round_seconds,
            deadline: session
                .deadline
                .map(|d| d.to_rfc3339())
                .unwrap_or_default(),
        };
        self.broadcaster.send_to_all(&session.join_order, &started);
        self.publish(session);

        self.arm_expiry(&mut registry, &session_id);
        Ok(())
    }

    /// Evaluate a guess from a player in a running round
    pub async fn submit_guess(&self, connection_id: &str, text: &str) -> SessionResult<()> {
        let mut registry = self.registry.lock().await;
        let session_id = registry
            .session_of(connection_id)
            .cloned()
            .ok_or(SessionError::NotInSession)?;
        let session = registry
            .get_mut(&session_id)
            .ok_or(SessionError::SessionNotFound)?;

        let outcome = session.apply_guess(connection_id, text, &self.config)?;
        if outcome == GuessOutcome::TooLate {
            tracing::debug!(
                "Late guess from {} in session {} after the round was won",
                connection_id,
                session_id
            );
            return Ok(());
        }
        let name = session.display_name(connection_id);
        self.narrate(session, format!("{} guessed: {}", name, text.trim()));

        match outcome {
            GuessOutcome::Won => {
                tracing::info!("{} won the round in session {}", name, session_id);
                self.end_round(&mut registry, &session_id, EndReason::CorrectGuess);
            }
            GuessOutcome::AlreadyDecided | GuessOutcome::TooLate => {
                self.publish(session);
            }
            GuessOutcome::Incorrect { attempts_left } => {
                let note = match attempts_left {
                    0 => "You have no attempts left".to_string(),
                    1 => "Incorrect, 1 attempt left".to_string(),
                    n => format!("Incorrect, {} attempts left", n),
                };
                self.broadcaster
                    .send_to(connection_id, ServerMessage::system(note));
                self.publish(session);
            }
        }
        Ok(())
    }

    /// The one round-end transition, shared by the expiry timer, a winning
    /// guess and a departure that leaves fewer than two players.
    pub(super) fn end_round(
        &self,
        registry: &mut SessionRegistry,
        session_id: &str,
        reason: EndReason,
    ) {
        registry.cancel_timer(session_id);
        let Some(session) = registry.get_mut(session_id) else {
            return;
        };
        if !session.in_progress() {
            return;
        }

        let summary = session.finish_round(reason, &self.config);
        tracing::info!(
            "Round {} in session {} ended: {:?}, winner {:?}",
            session.round_no,
            session_id,
            summary.reason,
            summary.winner.as_ref().map(|w| &w.id)
        );

        let ended = ServerMessage::GameEnded {
            reason: summary.reason,
            winner: summary.winner,
            answer: summary.answer,
        };
        self.broadcaster.send_to_all(&session.join_order, &ended);

        if summary.gm != summary.previous_gm {
            let gm_name = session.display_name(&summary.gm);
            self.narrate(session, format!("{} is now the Game Master", gm_name));
        }
        self.publish(session);
    }

    /// Spawn the task that ends the current round at its deadline
    fn arm_expiry(&self, registry: &mut SessionRegistry, session_id: &str) {
        let token = registry.next_round_token();
        let state = self.clone();
        let sid = session_id.to_string();
        let duration = self.config.round_duration();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            state.expire_round(&sid, token).await;
        });
        registry.arm_timer(session_id, RoundTimer::new(token, handle));
    }

    async fn expire_round(&self, session_id: &str, token: u64) {
        let mut registry = self.registry.lock().await;
        // The timer may have been replaced or cancelled while waiting for the lock
        if !registry.take_timer(session_id, token) {
            tracing::debug!("Ignoring stale round timer for session {}", session_id);
            return;
        }
        tracing::info!("Round time expired in session {}", session_id);
        self.end_round(&mut registry, session_id, EndReason::TimeExpired);
    }
}
