use std::collections::HashMap;

use super::session::{MAX_PLAYERS, MIN_PLAYERS};
use super::GameError;

/// What a `StartMatch` poll resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchPoll {
    /// Still queued; `queued` of `needed` seats are taken.
    Waiting { queued: usize, needed: usize },
    /// The queue filled with this poll. The caller must create the session
    /// and hand its id to the other players through [`MatchQueue::assign`].
    Filled(Vec<String>),
    /// A session was created earlier on another player's poll.
    Ready { game_id: String },
}

/// Per player-count waiting lists plus game ids not yet collected by the
/// players they were created for.
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: HashMap<usize, Vec<String>>,
    assigned: HashMap<String, String>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poll(&mut self, username: &str, num_players: usize) -> Result<MatchPoll, GameError> {
        if let Some(game_id) = self.assigned.remove(username) {
            return Ok(MatchPoll::Ready { game_id });
        }
        if !(MIN_PLAYERS..=MAX_PLAYERS).contains(&num_players) {
            return Err(GameError::InvalidPlayerCount(num_players));
        }

        // A player waits in one queue at a time.
        for (size, queue) in self.waiting.iter_mut() {
            if *size != num_players {
                queue.retain(|u| u != username);
            }
        }

        let queue = self.waiting.entry(num_players).or_default();
        if !queue.iter().any(|u| u == username) {
            queue.push(username.to_string());
        }

        if queue.len() >= num_players {
            let players: Vec<String> = queue.drain(..num_players).collect();
            return Ok(MatchPoll::Filled(players));
        }

        Ok(MatchPoll::Waiting {
            queued: queue.len(),
            needed: num_players,
        })
    }

    /// Records `game_id` for every player except the one who filled the queue.
    pub fn assign(&mut self, game_id: &str, players: &[String], filled_by: &str) {
        for player in players.iter().filter(|p| *p != filled_by) {
            self.assigned.insert(player.clone(), game_id.to_string());
        }
    }

    /// Takes a pending assignment for `username` if it matches `game_id`.
    pub fn claim(&mut self, username: &str, game_id: &str) -> bool {
        if self.assigned.get(username).map(String::as_str) == Some(game_id) {
            self.assigned.remove(username);
            true
        } else {
            false
        }
    }

    pub fn remove_user(&mut self, username: &str) {
        for queue in self.waiting.values_mut() {
            queue.retain(|u| u != username);
        }
        self.assigned.remove(username);
    }

    pub fn waiting(&self, num_players: usize) -> usize {
        self.waiting.get(&num_players).map_or(0, Vec::len)
    }
}
