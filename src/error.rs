//! Errors surfaced to the client that issued an intent.
//!
//! None of these are fatal; the handler layer turns them into an
//! `error_message` for the originator only.

/// Result type for session operations
pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Session ID already in use")]
    DuplicateId,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Game already in progress")]
    SessionInProgress,

    #[error("{0}")]
    NotAuthorized(String),

    #[error("{0}")]
    InvalidInput(String),

    #[error("You have no attempts left")]
    NoAttemptsLeft,

    #[error("You are not in a session")]
    NotInSession,

    #[error("At least 2 players are needed to start")]
    NotEnoughPlayers,

    #[error("Set a question and answer first")]
    QuestionNotSet,

    #[error("No round in progress")]
    NoRoundInProgress,
}

impl SessionError {
    /// Stable machine-readable code sent alongside the message
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::DuplicateId => "DUPLICATE_ID",
            SessionError::SessionNotFound => "SESSION_NOT_FOUND",
            SessionError::SessionInProgress => "SESSION_IN_PROGRESS",
            SessionError::NotAuthorized(_) => "NOT_AUTHORIZED",
            SessionError::InvalidInput(_) => "INVALID_INPUT",
            SessionError::NoAttemptsLeft => "NO_ATTEMPTS_LEFT",
            SessionError::NotInSession => "NOT_IN_SESSION",
            SessionError::NotEnoughPlayers => "NOT_ENOUGH_PLAYERS",
            SessionError::QuestionNotSet => "QUESTION_NOT_SET",
            SessionError::NoRoundInProgress => "NO_ROUND_IN_PROGRESS",
        }
    }
}

/// Trim `raw` and check it is non-empty and at most `max_chars` characters.
pub fn bounded_text(raw: &str, field: &str, max_chars: usize) -> SessionResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SessionError::InvalidInput(format!("{} cannot be empty", field)));
    }
    if trimmed.chars().count() > max_chars {
        return Err(SessionError::InvalidInput(format!(
            "{} is too long (max {} characters)",
            field, max_chars
        )));
    }
    Ok(trimmed.to_string())
}
