use thiserror::Error;

use crate::game::GameError;

#[derive(Error, Debug)]
pub enum RaftError {
    #[error("Not the leader")]
    NotLeader,

    #[error("Leader unavailable")]
    LeaderUnavailable,

    #[error("Replication failed for entry {index}: {acks} of {needed} acknowledgements")]
    ReplicationFailed { index: u64, acks: usize, needed: usize },

    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error(transparent)]
    Game(#[from] GameError),
}
