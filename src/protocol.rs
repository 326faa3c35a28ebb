use crate::types::*;
use serde::{Deserialize, Serialize};

/// Intents sent by a client over the socket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    CreateSession {
        name: String,
        #[serde(default)]
        session_id: Option<SessionId>,
    },
    JoinSession {
        session_id: SessionId,
        name: String,
    },
    LeaveSession,
    /// GM only, while no round is running
    SetQuestion {
        question: String,
        answer: String,
    },
    StartGame,
    Guess {
        guess_text: String,
    },
    /// Force a re-publish of the current session view
    GetSessionState,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    /// Sent once right after the socket upgrade
    Connected {
        connection_id: ConnectionId,
        server_now: String,
    },
    SessionCreated {
        session_id: SessionId,
        gm: ConnectionId,
    },
    LeftSession {
        session_id: SessionId,
    },
    SessionState(SessionView),
    SystemMessage {
        text: String,
    },
    /// Rejection of the most recent intent, originator only
    ErrorMessage {
        code: String,
        text: String,
    },
    GameStarted {
        question: String,
        duration: u64,
        deadline: String,
    },
    GameEnded {
        reason: EndReason,
        winner: Option<WinnerInfo>,
        answer: String,
    },
}

impl ServerMessage {
    pub fn system(text: impl Into<String>) -> Self {
        ServerMessage::SystemMessage { text: text.into() }
    }
}

impl From<crate::error::SessionError> for ServerMessage {
    fn from(e: crate::error::SessionError) -> Self {
        ServerMessage::ErrorMessage {
            code: e.code().to_string(),
            text: e.to_string(),
        }
    }
}

/// Client-visible projection of a session. Never carries the answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: SessionId,
    pub players: Vec<PlayerView>,
    pub gm: ConnectionId,
    pub in_progress: bool,
    pub question: Option<String>,
    pub winner: Option<ConnectionId>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub deadline: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: ConnectionId,
    pub name: String,
    pub score: u32,
    pub attempts_left: u32,
    #[serde(rename = "isGM")]
    pub is_gm: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WinnerInfo {
    pub id: ConnectionId,
    pub name: String,
}
