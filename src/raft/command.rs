use serde::{Deserialize, Serialize};

use super::RaftError;
use crate::game::{GameError, GameSession, Outcome};

/// State-machine transitions carried by the replicated log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    PlayCards {
        game_id: String,
        username: String,
        cards: Vec<u8>,
    },
    PassTurn {
        game_id: String,
        username: String,
    },
    QuitGame {
        game_id: String,
        username: String,
    },
}

impl Command {
    pub fn game_id(&self) -> &str {
        match self {
            Command::PlayCards { game_id, .. }
            | Command::PassTurn { game_id, .. }
            | Command::QuitGame { game_id, .. } => game_id,
        }
    }

    pub fn username(&self) -> &str {
        match self {
            Command::PlayCards { username, .. }
            | Command::PassTurn { username, .. }
            | Command::QuitGame { username, .. } => username,
        }
    }

    /// Wire tag sent next to the payload. Informational only.
    pub fn tag(&self) -> &'static str {
        match self {
            Command::PlayCards { .. } => "play_card",
            Command::PassTurn { .. } => "pass_turn",
            Command::QuitGame { .. } => "quit_game",
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, RaftError> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| RaftError::SerializationError(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, RaftError> {
        let (command, _): (Command, usize) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| RaftError::SerializationError(e.to_string()))?;
        Ok(command)
    }

    pub fn apply_to(&self, session: &mut GameSession) -> Result<Outcome, GameError> {
        match self {
            Command::PlayCards {
                username, cards, ..
            } => session.play_cards(username, cards),
            Command::PassTurn { username, .. } => session.pass_turn(username),
            Command::QuitGame { username, .. } => session.quit_game(username),
        }
    }
}
