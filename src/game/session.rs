use std::collections::{BTreeMap, BTreeSet};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::pattern::{classify, Pattern};
use super::GameError;

/// Ranks run 1..=RANKS, each dealt COPIES times.
pub const RANKS: u8 = 10;
pub const COPIES: usize = 4;
pub const DECK_SIZE: usize = RANKS as usize * COPIES;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 4;

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Result of a successful transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub message: String,
    /// Set only by the transition that made the session terminal.
    pub winner: Option<String>,
}

impl Outcome {
    fn message(message: String) -> Self {
        Self {
            message,
            winner: None,
        }
    }

    fn won(message: String, winner: &str) -> Self {
        Self {
            message,
            winner: Some(winner.to_string()),
        }
    }
}

/// Who is looking at a session. Players only ever see their own cards; the
/// server-to-server view reveals the hand of whoever holds the turn.
#[derive(Debug, Clone, Copy)]
pub enum Viewer<'a> {
    Player(&'a str),
    TurnHolder,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerView {
    pub username: String,
    pub card_count: usize,
    pub cards: Vec<u8>,
    pub win_rate: f64,
    pub is_connected: bool,
    pub is_current_turn: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GameView {
    pub game_id: String,
    pub current_turn: String,
    pub last_played: Vec<u8>,
    pub players: Vec<PlayerView>,
    pub countdown_seconds: u64,
    pub game_over: bool,
    pub winner: Option<String>,
}

/// One match: hands, turn order, the table and the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSession {
    game_id: String,
    players: Vec<String>,
    hands: BTreeMap<String, Vec<u8>>,
    turn_index: usize,
    last_played: Vec<u8>,
    last_played_by: Option<String>,
    quit_players: BTreeSet<String>,
    winner: Option<String>,
    turn_started_at_ms: u64,
    cards_played: usize,
}

impl GameSession {
    /// Creates a session and deals a shuffled 40-card deck as evenly as
    /// possible, earlier seats taking the remainder.
    pub fn new(game_id: impl Into<String>, players: Vec<String>) -> Result<Self, GameError> {
        check_player_count(&players)?;

        let mut deck: Vec<u8> = (1..=RANKS)
            .flat_map(|rank| std::iter::repeat(rank).take(COPIES))
            .collect();
        deck.shuffle(&mut rand::rng());

        let base = DECK_SIZE / players.len();
        let extras = DECK_SIZE % players.len();
        let mut hands = Vec::with_capacity(players.len());
        let mut offset = 0;
        for seat in 0..players.len() {
            let take = base + usize::from(seat < extras);
            hands.push(deck[offset..offset + take].to_vec());
            offset += take;
        }

        Self::with_hands(game_id, players, hands)
    }

    /// Creates a session with predetermined hands, in seat order. Cards not
    /// present in any hand count as already played.
    pub fn with_hands(
        game_id: impl Into<String>,
        players: Vec<String>,
        hands: Vec<Vec<u8>>,
    ) -> Result<Self, GameError> {
        check_player_count(&players)?;
        if hands.len() != players.len() {
            return Err(GameError::InvalidPlayerCount(hands.len()));
        }

        let dealt: usize = hands.iter().map(Vec::len).sum();
        let hands = players
            .iter()
            .cloned()
            .zip(hands.into_iter().map(|mut hand| {
                hand.sort_unstable();
                hand
            }))
            .collect();

        Ok(Self {
            game_id: game_id.into(),
            players,
            hands,
            turn_index: 0,
            last_played: Vec::new(),
            last_played_by: None,
            quit_players: BTreeSet::new(),
            winner: None,
            turn_started_at_ms: now_millis(),
            cards_played: DECK_SIZE.saturating_sub(dealt),
        })
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    pub fn players(&self) -> &[String] {
        &self.players
    }

    pub fn hand(&self, player: &str) -> Option<&[u8]> {
        self.hands.get(player).map(Vec::as_slice)
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn current_player(&self) -> &str {
        &self.players[self.turn_index]
    }

    pub fn last_played(&self) -> &[u8] {
        &self.last_played
    }

    pub fn last_played_by(&self) -> Option<&str> {
        self.last_played_by.as_deref()
    }

    pub fn last_pattern(&self) -> Option<Pattern> {
        classify(&self.last_played)
    }

    pub fn quit_players(&self) -> &BTreeSet<String> {
        &self.quit_players
    }

    pub fn winner(&self) -> Option<&str> {
        self.winner.as_deref()
    }

    pub fn is_over(&self) -> bool {
        self.winner.is_some()
    }

    pub fn cards_played(&self) -> usize {
        self.cards_played
    }

    pub fn turn_started_at_ms(&self) -> u64 {
        self.turn_started_at_ms
    }

    pub fn set_turn_started_at_ms(&mut self, at_ms: u64) {
        self.turn_started_at_ms = at_ms;
    }

    pub fn contains(&self, player: &str) -> bool {
        self.players.iter().any(|p| p == player)
    }

    /// `max(0, turn_seconds - seconds since the turn started)`.
    pub fn seconds_remaining(&self, turn_seconds: u64, now_ms: u64) -> u64 {
        let elapsed = now_ms.saturating_sub(self.turn_started_at_ms) / 1000;
        turn_seconds.saturating_sub(elapsed)
    }

    pub fn play_cards(&mut self, player: &str, cards: &[u8]) -> Result<Outcome, GameError> {
        self.ensure_member(player)?;
        self.ensure_running()?;
        if player != self.current_player() {
            return Err(GameError::NotYourTurn);
        }

        let hand = self.hands.get(player).map(Vec::as_slice).unwrap_or_default();
        if !holds_all(hand, cards) {
            return Err(GameError::MissingCards);
        }

        let pattern = classify(cards).ok_or(GameError::IllegalPattern)?;
        if !self.opens_round(player) {
            let legal = self
                .last_pattern()
                .map_or(true, |previous| pattern.beats(&previous));
            if !legal {
                return Err(GameError::IllegalPattern);
            }
        }

        if let Some(hand) = self.hands.get_mut(player) {
            for card in cards {
                if let Some(pos) = hand.iter().position(|c| c == card) {
                    hand.remove(pos);
                }
            }
        }
        self.cards_played += cards.len();

        let mut played = cards.to_vec();
        played.sort_unstable();
        self.last_played = played;
        self.last_played_by = Some(player.to_string());

        if self.hand(player).is_some_and(<[u8]>::is_empty) {
            self.winner = Some(player.to_string());
            return Ok(Outcome::won(format!("{player} won the game!"), player));
        }

        if let Some(next) = self.next_active_after(self.turn_index) {
            self.turn_index = next;
        }
        self.reset_timer();
        Ok(Outcome::message("Cards played successfully".to_string()))
    }

    pub fn pass_turn(&mut self, player: &str) -> Result<Outcome, GameError> {
        self.ensure_member(player)?;
        self.ensure_running()?;
        if player != self.current_player() {
            return Err(GameError::NotYourTurn);
        }

        // Unreachable through quit_game, which declares the last active
        // player the winner, but a synced state may still carry it.
        let Some(next) = self.next_active_after(self.turn_index) else {
            self.winner = Some(player.to_string());
            return Ok(Outcome::won(
                format!("{player} passed the turn. {player} won the game!"),
                player,
            ));
        };

        self.turn_index = next;
        self.reset_timer();

        let next_player = self.players[next].clone();
        if self.last_played_by.as_deref() == Some(next_player.as_str()) {
            self.clear_table();
            return Ok(Outcome::message(format!(
                "{player} passed the turn. {next_player} starts a new round."
            )));
        }

        Ok(Outcome::message(format!("{player} passed the turn.")))
    }

    pub fn quit_game(&mut self, player: &str) -> Result<Outcome, GameError> {
        self.ensure_member(player)?;
        self.ensure_running()?;
        if self.quit_players.contains(player) {
            return Ok(Outcome::message(format!("{player} already quit the game.")));
        }

        self.quit_players.insert(player.to_string());
        if self.last_played_by.as_deref() == Some(player) {
            self.clear_table();
        }

        let remaining: Vec<&String> = self.active_players().collect();
        if let [last] = remaining.as_slice() {
            let last = (*last).clone();
            self.winner = Some(last.clone());
            return Ok(Outcome::won(
                format!("{player} quit the game. {last} won the game!"),
                &last,
            ));
        }

        if self.current_player() == player {
            if let Some(next) = self.next_active_after(self.turn_index) {
                self.turn_index = next;
            }
            self.reset_timer();
        }

        Ok(Outcome::message(format!("{player} quit the game.")))
    }

    pub fn view(&self, viewer: Viewer<'_>, turn_seconds: u64, now_ms: u64) -> GameView {
        let current = self.current_player();
        let players = self
            .players
            .iter()
            .map(|name| {
                let hand = self.hand(name).unwrap_or_default();
                let visible = match viewer {
                    Viewer::Player(me) => me == name,
                    Viewer::TurnHolder => name == current,
                };
                PlayerView {
                    username: name.clone(),
                    card_count: hand.len(),
                    cards: if visible { hand.to_vec() } else { Vec::new() },
                    win_rate: 0.0,
                    is_connected: !self.quit_players.contains(name),
                    is_current_turn: name == current,
                }
            })
            .collect();

        GameView {
            game_id: self.game_id.clone(),
            current_turn: current.to_string(),
            last_played: self.last_played.clone(),
            players,
            countdown_seconds: if self.is_over() {
                0
            } else {
                self.seconds_remaining(turn_seconds, now_ms)
            },
            game_over: self.is_over(),
            winner: self.winner.clone(),
        }
    }

    fn active_players(&self) -> impl Iterator<Item = &String> {
        self.players
            .iter()
            .filter(|p| !self.quit_players.contains(*p))
    }

    /// Next seat after `from` held by a player who has not quit, never
    /// `from` itself.
    fn next_active_after(&self, from: usize) -> Option<usize> {
        let n = self.players.len();
        (1..n)
            .map(|step| (from + step) % n)
            .find(|&idx| !self.quit_players.contains(&self.players[idx]))
    }

    /// A player opens a round when the table is empty or everybody else
    /// passed on their last play.
    fn opens_round(&self, player: &str) -> bool {
        self.last_played.is_empty() || self.last_played_by.as_deref() == Some(player)
    }

    fn clear_table(&mut self) {
        self.last_played.clear();
        self.last_played_by = None;
    }

    fn reset_timer(&mut self) {
        self.turn_started_at_ms = now_millis();
    }

    fn ensure_member(&self, player: &str) -> Result<(), GameError> {
        if self.contains(player) {
            Ok(())
        } else {
            Err(GameError::PlayerNotInGame(player.to_string()))
        }
    }

    fn ensure_running(&self) -> Result<(), GameError> {
        if self.is_over() {
            Err(GameError::GameOver)
        } else {
            Ok(())
        }
    }
}

fn check_player_count(players: &[String]) -> Result<(), GameError> {
    let distinct: BTreeSet<&String> = players.iter().collect();
    if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&players.len()) || distinct.len() != players.len() {
        return Err(GameError::InvalidPlayerCount(players.len()));
    }
    Ok(())
}

/// Multiset containment of `cards` in `hand`.
fn holds_all(hand: &[u8], cards: &[u8]) -> bool {
    let mut wanted: BTreeMap<u8, usize> = BTreeMap::new();
    for &card in cards {
        *wanted.entry(card).or_insert(0) += 1;
    }
    wanted
        .iter()
        .all(|(card, &n)| hand.iter().filter(|c| *c == card).count() >= n)
}
