mod error;
mod matchmaking;
mod pattern;
mod session;
mod table;

pub mod countdown;

pub use self::error::GameError;
pub use self::matchmaking::{MatchPoll, MatchQueue};
pub use self::pattern::{classify, Pattern, PatternKind};
pub use self::session::{
    GameSession, GameView, Outcome, PlayerView, Viewer, DECK_SIZE, MAX_PLAYERS, MIN_PLAYERS,
};
pub use self::table::{GameTable, SharedSession};

pub(crate) use self::session::now_millis;
