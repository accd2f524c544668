mod error;

pub mod client;
pub mod monitor;
pub mod server;

pub use self::error::NetworkError;

pub mod proto {
    tonic::include_proto!("cardgame");
}

pub use client::{GameClient, GrpcPeers};
pub use monitor::HeartbeatMonitor;
pub use server::CardGameServer;

/// Metadata key marking a write a follower already forwarded once.
pub const FORWARDED_HEADER: &str = "x-deckraft-forwarded";
