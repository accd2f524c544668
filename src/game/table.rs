use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use super::countdown::CountdownHandle;
use super::{GameError, GameSession};

/// A session behind its own lock; transitions hold it for the whole
/// read-modify-write.
pub type SharedSession = Arc<Mutex<GameSession>>;

/// `game_id -> session`, plus the countdown task attached to each session on
/// the leader.
#[derive(Default)]
pub struct GameTable {
    sessions: RwLock<HashMap<String, SharedSession>>,
    countdowns: Mutex<HashMap<String, CountdownHandle>>,
}

impl GameTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, session: GameSession) -> SharedSession {
        let id = session.game_id().to_string();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.write().await.insert(id, Arc::clone(&shared));
        shared
    }

    pub async fn get(&self, game_id: &str) -> Result<SharedSession, GameError> {
        self.sessions
            .read()
            .await
            .get(game_id)
            .cloned()
            .ok_or_else(|| GameError::InvalidGameId(game_id.to_string()))
    }

    pub async fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Every session, serialized as one JSON array.
    pub async fn to_json(&self) -> Result<String, serde_json::Error> {
        let shared: Vec<SharedSession> = self.sessions.read().await.values().cloned().collect();
        let mut sessions = Vec::with_capacity(shared.len());
        for session in shared {
            sessions.push(session.lock().await.clone());
        }
        sessions.sort_by(|a, b| a.game_id().cmp(b.game_id()));
        serde_json::to_string(&sessions)
    }

    /// Rebuilds the table from a [`GameTable::to_json`] payload, dropping
    /// whatever was there before.
    pub async fn replace_from_json(&self, json: &str) -> Result<usize, serde_json::Error> {
        let sessions: Vec<GameSession> = serde_json::from_str(json)?;
        let rebuilt: HashMap<String, SharedSession> = sessions
            .into_iter()
            .map(|s| (s.game_id().to_string(), Arc::new(Mutex::new(s))))
            .collect();
        let count = rebuilt.len();
        *self.sessions.write().await = rebuilt;
        Ok(count)
    }

    /// Attaches a countdown to `game_id`, cancelling any previous one.
    pub async fn attach_countdown(&self, game_id: &str, handle: CountdownHandle) {
        if let Some(previous) = self
            .countdowns
            .lock()
            .await
            .insert(game_id.to_string(), handle)
        {
            previous.cancel();
        }
    }

    pub async fn has_running_countdown(&self, game_id: &str) -> bool {
        self.countdowns
            .lock()
            .await
            .get(game_id)
            .is_some_and(|h| !h.is_finished())
    }

    pub async fn cancel_countdown(&self, game_id: &str) {
        if let Some(handle) = self.countdowns.lock().await.remove(game_id) {
            handle.cancel();
        }
    }

    pub async fn cancel_all_countdowns(&self) {
        for (_, handle) in self.countdowns.lock().await.drain() {
            handle.cancel();
        }
    }
}
