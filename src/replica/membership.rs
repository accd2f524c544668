//! Roster maintenance, full-state sync and the heartbeat tick.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use rand::Rng;
use tokio::task::JoinSet;

use super::Replica;
use crate::network::NetworkError;
use crate::raft::RaftError;
use crate::storage::StorageError;

impl Replica {
    /// Leader-only. Adds `replica` to the roster and, if it was new, pushes
    /// the roster to everyone else. Returns the roster the newcomer adopts.
    pub async fn register_replica(&self, replica: &str) -> Result<Vec<String>, RaftError> {
        if !self.is_leader().await {
            return Err(RaftError::NotLeader);
        }

        let (added, others) = {
            let mut roster = self.roster.lock().await;
            let added = roster.add(replica);
            (added, roster.without(replica))
        };

        if added {
            info!("Registered replica {replica}");
            let members = self.roster().await;
            self.push_roster(&others, &members).await;
        }
        Ok(others)
    }

    pub async fn update_replica_list(&self, members: &[String]) {
        self.roster.lock().await.replace(members);
        debug!("Roster replaced: {:?}", self.roster().await);
    }

    /// Sends the whole roster to every member of it.
    pub async fn broadcast_roster(&self) {
        let members = self.roster().await;
        self.push_roster(&members, &members).await;
    }

    async fn push_roster(&self, targets: &[String], members: &[String]) {
        let mut calls = JoinSet::new();
        for target in targets {
            let peers = Arc::clone(&self.peers);
            let target = target.clone();
            let members = members.to_vec();
            calls.spawn(async move {
                if let Err(e) = peers.update_replica_list(&target, &members).await {
                    warn!("UpdateReplicaList to {target} failed: {e}");
                }
            });
        }
        while calls.join_next().await.is_some() {}
    }

    /// Leader-only. The whole game table as JSON.
    pub async fn sync_all_games(&self) -> Result<String, RaftError> {
        if !self.is_leader().await {
            return Err(RaftError::NotLeader);
        }
        self.games
            .to_json()
            .await
            .map_err(|e| RaftError::SerializationError(e.to_string()))
    }

    /// Leader-only. The raw bytes of the account store.
    pub async fn database_snapshot(&self) -> Result<Vec<u8>, RaftError> {
        if !self.is_leader().await {
            return Err(RaftError::NotLeader);
        }
        self.accounts
            .snapshot()
            .await
            .map_err(|e| RaftError::SerializationError(e.to_string()))
    }

    /// Replaces the local game table with the leader's.
    pub async fn pull_games(&self, leader: &str) -> Result<usize, RaftError> {
        let json = self
            .peers
            .sync_all_games(leader)
            .await
            .map_err(|e| unreachable_peer(leader, e))?;
        self.games
            .replace_from_json(&json)
            .await
            .map_err(|e| RaftError::SerializationError(e.to_string()))
    }

    /// Startup handshake of a follower: register, copy the leader's account
    /// store once, then pull every game.
    pub async fn bootstrap(&self) -> Result<(), RaftError> {
        let Some(leader) = self.leader_address().await else {
            return Err(RaftError::LeaderUnavailable);
        };

        let roster = self
            .peers
            .register_replica(&leader, self.address())
            .await
            .map_err(|e| unreachable_peer(&leader, e))?;
        self.update_replica_list(&roster).await;
        info!("Registered with leader {leader}, {} other replicas", roster.len());

        let snapshot = self
            .peers
            .sync_database(&leader)
            .await
            .map_err(|e| unreachable_peer(&leader, e))?;
        let accounts = self
            .accounts
            .restore(&snapshot)
            .await
            .map_err(|e: StorageError| RaftError::SerializationError(e.to_string()))?;
        info!("Restored {accounts} accounts from {leader}");

        let games = self.pull_games(&leader).await?;
        info!("Pulled {games} games from {leader}");
        self.registered.store(true, Ordering::Release);
        Ok(())
    }

    /// One pass of the heartbeat monitor.
    ///
    /// The leader pings every replica and evicts the silent ones. A follower
    /// pings its leader and refreshes its games (bootstrapping first if it
    /// never managed to), or after a random delay runs an election when the
    /// leader stays silent.
    pub async fn heartbeat_tick(self: &Arc<Self>) {
        let (leader, is_leader) = self.who_is_leader().await;

        if is_leader {
            self.check_replicas().await;
            return;
        }

        let Some(leader) = leader else {
            info!("No known leader");
            self.initiate_election().await;
            return;
        };

        match self.peers.heartbeat(&leader).await {
            Ok(()) if !self.is_registered() => {
                if let Err(e) = self.bootstrap().await {
                    warn!("Bootstrap from {leader} failed, retrying next tick: {e}");
                }
            }
            Ok(()) => {
                if let Err(e) = self.pull_games(&leader).await {
                    debug!("Game sync from {leader} failed: {e}");
                }
            }
            Err(e) => {
                warn!("Leader {leader} unreachable: {e}");
                tokio::time::sleep(self.election_delay()).await;

                let (current, is_leader) = self.who_is_leader().await;
                if is_leader || current.as_deref() != Some(leader.as_str()) {
                    debug!("Leader changed while waiting, skipping election");
                    return;
                }
                self.initiate_election().await;
            }
        }
    }

    async fn check_replicas(&self) {
        let replicas = self.roster().await;
        let mut calls = JoinSet::new();
        for replica in replicas {
            let peers = Arc::clone(&self.peers);
            calls.spawn(async move {
                let alive = peers.heartbeat(&replica).await;
                (replica, alive)
            });
        }

        let mut evicted = Vec::new();
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((replica, Err(e))) => {
                    warn!("Evicting unreachable replica {replica}: {e}");
                    evicted.push(replica);
                }
                Err(e) => error!("Heartbeat task failed: {e}"),
            }
        }

        if evicted.is_empty() {
            return;
        }
        {
            let mut roster = self.roster.lock().await;
            for replica in &evicted {
                roster.remove(replica);
            }
        }
        self.broadcast_roster().await;
    }

    fn election_delay(&self) -> Duration {
        let jitter = self.raft.election_jitter.as_millis() as u64;
        if jitter == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::rng().random_range(0..jitter))
    }
}

fn unreachable_peer(peer: &str, e: NetworkError) -> RaftError {
    RaftError::PeerUnreachable(format!("{peer}: {e}"))
}
