use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque ID types
pub type SessionId = String;
pub type ConnectionId = String;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoundState {
    Idle,
    InProgress,
}

/// Why a round stopped
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    CorrectGuess,
    TimeExpired,
    StoppedNotEnoughPlayers,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Player {
    pub id: ConnectionId,
    pub name: String,
    pub score: u32,
    pub attempts_left: u32,
}

impl Player {
    pub fn new(id: ConnectionId, name: String) -> Self {
        Self {
            id,
            name,
            score: 0,
            attempts_left: 0,
        }
    }
}

/// A room with at most one active round.
///
/// `players` is keyed by connection id; `join_order` is the authoritative
/// ordering used for GM selection and rotation.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: SessionId,
    pub players: HashMap<ConnectionId, Player>,
    pub join_order: Vec<ConnectionId>,
    pub gm: ConnectionId,
    pub question: Option<String>,
    pub answer_original: Option<String>,
    pub answer_canonical: Option<String>,
    pub round_state: RoundState,
    pub deadline: Option<DateTime<Utc>>,
    pub winner: Option<ConnectionId>,
    /// Last round was closed by a correct guess and no new question is set
    /// yet. Guesses that raced the winner land here and are absorbed.
    pub won_by_guess: bool,
    pub round_no: u32,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// New idle session whose creator is the only player and the Game Master
    pub fn new(id: SessionId, creator: Player) -> Self {
        let gm = creator.id.clone();
        let mut players = HashMap::new();
        players.insert(creator.id.clone(), creator);

        Self {
            id,
            players,
            join_order: vec![gm.clone()],
            gm,
            question: None,
            answer_original: None,
            answer_canonical: None,
            round_state: RoundState::Idle,
            deadline: None,
            winner: None,
            won_by_guess: false,
            round_no: 0,
            created_at: Utc::now(),
        }
    }

    pub fn in_progress(&self) -> bool {
        self.round_state == RoundState::InProgress
    }

    pub fn is_gm(&self, id: &str) -> bool {
        self.gm == id
    }

    pub fn player_count(&self) -> usize {
        self.join_order.len()
    }

    pub fn player(&self, id: &str) -> Option<&Player> {
        self.players.get(id)
    }

    pub fn display_name(&self, id: &str) -> String {
        self.players
            .get(id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    /// Players in join order
    pub fn ordered_players(&self) -> impl Iterator<Item = &Player> {
        self.join_order.iter().filter_map(|id| self.players.get(id))
    }
}
