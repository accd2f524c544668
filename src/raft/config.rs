use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RaftConfig {
    pub address: String,
    pub heartbeat_interval: Duration,
    /// Upper bound for any single peer RPC, connect included.
    pub rpc_timeout: Duration,
    /// A follower that loses its leader waits a random delay up to this
    /// bound before standing for election.
    pub election_jitter: Duration,
}

impl RaftConfig {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            heartbeat_interval: Duration::from_millis(3000),
            rpc_timeout: Duration::from_millis(1000),
            election_jitter: Duration::from_millis(3000),
        }
    }
}
