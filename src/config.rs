use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::raft::RaftConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Socket address the gRPC server binds to.
    pub listen_address: String,
    /// Address other replicas and clients use to reach this node. Defaults to
    /// `listen_address` when empty.
    pub advertise_address: String,
    pub is_leader: bool,
    pub leader_address: Option<String>,
    pub replicas: Vec<String>,
    pub data_dir: PathBuf,
    pub heartbeat_interval_ms: u64,
    pub rpc_timeout_ms: u64,
    pub turn_seconds: u64,
    pub countdown_tick_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            listen_address: "127.0.0.1:50051".to_string(),
            advertise_address: String::new(),
            is_leader: false,
            leader_address: None,
            replicas: vec![],
            data_dir: PathBuf::from("data"),
            heartbeat_interval_ms: 3000,
            rpc_timeout_ms: 1000,
            turn_seconds: 20,
            countdown_tick_ms: 1000,
        }
    }
}

impl NodeConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn address(&self) -> &str {
        if self.advertise_address.is_empty() {
            &self.listen_address
        } else {
            &self.advertise_address
        }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.rpc_timeout_ms)
    }

    pub fn countdown_tick(&self) -> Duration {
        Duration::from_millis(self.countdown_tick_ms)
    }

    pub fn raft_config(&self) -> RaftConfig {
        RaftConfig {
            address: self.address().to_string(),
            heartbeat_interval: self.heartbeat_interval(),
            rpc_timeout: self.rpc_timeout(),
            election_jitter: self.heartbeat_interval(),
        }
    }
}
