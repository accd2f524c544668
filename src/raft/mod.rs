mod command;
mod config;
mod error;
mod log;
mod node;
mod roster;
mod state;
mod transport;

pub use self::command::Command;
pub use self::config::RaftConfig;
pub use self::error::RaftError;
pub use self::log::{CommandLog, LogEntry};
pub use self::node::{RaftNode, VoteReply, VoteRequest};
pub use self::roster::Roster;
pub use self::state::{NodeRole, NodeState};
pub use self::transport::{Forward, Peers, Reply, ReplyStatus};

/// Acknowledgements needed to commit with `replica_count` followers: a
/// majority of the followers plus the leader itself.
pub fn quorum(replica_count: usize) -> usize {
    (replica_count + 1) / 2 + 1
}
