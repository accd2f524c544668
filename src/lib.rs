pub mod config;
pub mod game;
pub mod raft;
pub mod replica;
pub mod storage;

// gRPC façade, client and peer transport
pub mod network;

// Public exports
pub use config::NodeConfig;
pub use game::{GameError, GameSession};
pub use replica::{Origin, Replica};
pub use storage::AccountStore;
