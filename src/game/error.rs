use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Not your turn.")]
    NotYourTurn,

    #[error("You don't have those cards.")]
    MissingCards,

    #[error("Play must be a legal pattern that beats the previous cards.")]
    IllegalPattern,

    #[error("Game not found")]
    InvalidGameId(String),

    #[error("Player {0} is not in this game")]
    PlayerNotInGame(String),

    #[error("Game is already over")]
    GameOver,

    #[error("A game needs 2 to 4 players, got {0}")]
    InvalidPlayerCount(usize),
}
