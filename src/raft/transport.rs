use async_trait::async_trait;

use super::{Command, LogEntry, VoteReply, VoteRequest};
use crate::network::NetworkError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Success,
    Waiting,
    Error,
}

impl ReplyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReplyStatus::Success => "success",
            ReplyStatus::Waiting => "waiting",
            ReplyStatus::Error => "error",
        }
    }

    pub fn parse(status: &str) -> Self {
        match status {
            "success" => ReplyStatus::Success,
            "waiting" => ReplyStatus::Waiting,
            _ => ReplyStatus::Error,
        }
    }
}

/// The `{status, message}` pair every client-facing call answers with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: ReplyStatus,
    pub message: String,
}

impl Reply {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Success,
            message: message.into(),
        }
    }

    pub fn waiting(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Waiting,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ReplyStatus::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }
}

/// A write a follower hands to the leader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Forward {
    Command(Command),
    StartMatch { username: String, num_players: u32 },
    AcceptMatch { username: String, game_id: String },
}

/// Calls one replica makes on another. Every call is bounded by the
/// transport's timeout and fails instead of retrying.
#[async_trait]
pub trait Peers: Send + Sync {
    async fn heartbeat(&self, peer: &str) -> Result<(), NetworkError>;

    async fn request_vote(&self, peer: &str, request: &VoteRequest)
        -> Result<VoteReply, NetworkError>;

    async fn announce_leader(&self, peer: &str, leader: &str) -> Result<(), NetworkError>;

    async fn append_log(&self, peer: &str, entry: &LogEntry) -> Result<(), NetworkError>;

    async fn update_replica_list(&self, peer: &str, roster: &[String])
        -> Result<(), NetworkError>;

    /// Registers `replica` with `leader`, returning the roster the newcomer
    /// should adopt.
    async fn register_replica(&self, leader: &str, replica: &str)
        -> Result<Vec<String>, NetworkError>;

    async fn sync_all_games(&self, leader: &str) -> Result<String, NetworkError>;

    async fn sync_database(&self, leader: &str) -> Result<Vec<u8>, NetworkError>;

    async fn forward(&self, leader: &str, write: &Forward) -> Result<Reply, NetworkError>;
}
