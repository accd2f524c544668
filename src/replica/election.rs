use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinSet;

use super::Replica;
use crate::raft::{quorum, VoteReply};

impl Replica {
    pub async fn handle_request_vote(&self, term: u64, candidate_id: &str) -> VoteReply {
        let (reply, was_leader) = {
            let mut node = self.node.lock().await;
            let was_leader = node.is_leader();
            (node.handle_request_vote(term, candidate_id), was_leader)
        };

        if was_leader && reply.vote_granted {
            info!("Stepping down: voted for {candidate_id} in term {term}");
            self.games.cancel_all_countdowns().await;
        }
        reply
    }

    /// Runs one candidacy: asks every known replica for a vote and takes over
    /// on a quorum. Returns whether this node became leader.
    pub async fn initiate_election(self: &Arc<Self>) -> bool {
        let request = self.node.lock().await.start_election();
        let replicas = self.roster().await;
        let needed = quorum(replicas.len());
        info!(
            "Starting election for term {} ({} replicas, {needed} votes needed)",
            request.term,
            replicas.len()
        );

        let mut calls = JoinSet::new();
        for replica in replicas {
            let peers = Arc::clone(&self.peers);
            let request = request.clone();
            calls.spawn(async move {
                let reply = peers.request_vote(&replica, &request).await;
                (replica, reply)
            });
        }

        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((replica, Ok(reply))) => {
                    debug!(
                        "Vote from {replica} for term {}: {}",
                        request.term, reply.vote_granted
                    );
                    self.node.lock().await.record_vote(&replica, reply);
                }
                Ok((replica, Err(e))) => debug!("RequestVote to {replica} failed: {e}"),
                Err(e) => warn!("RequestVote task failed: {e}"),
            }
        }

        let won = {
            let mut node = self.node.lock().await;
            if node.is_candidate_for(request.term) && node.votes() >= needed {
                node.become_leader();
                true
            } else {
                debug!(
                    "Election for term {} lost with {} votes",
                    request.term,
                    node.votes()
                );
                node.abandon_election();
                false
            }
        };

        if won {
            self.take_over(request.term).await;
        }
        won
    }

    /// Announces the new leadership, pushes the roster and restarts the turn
    /// timers of every live session.
    async fn take_over(self: &Arc<Self>, term: u64) {
        info!("{} is now the leader for term {term}", self.address());

        let replicas = self.roster().await;
        let mut calls = JoinSet::new();
        for replica in replicas {
            let peers = Arc::clone(&self.peers);
            let leader = self.address().to_string();
            calls.spawn(async move {
                if let Err(e) = peers.announce_leader(&replica, &leader).await {
                    debug!("AnnounceLeader to {replica} failed: {e}");
                }
            });
        }
        while calls.join_next().await.is_some() {}

        self.broadcast_roster().await;

        for game_id in self.games.ids().await {
            if self.games.has_running_countdown(&game_id).await {
                continue;
            }
            let Ok(session) = self.games.get(&game_id).await else {
                continue;
            };
            if session.lock().await.is_over() {
                continue;
            }
            self.start_countdown(&game_id, session).await;
        }
    }

    /// Handles AnnounceLeader. The new leader leaves the roster, since the
    /// roster only lists the replicas a leader talks to.
    pub async fn accept_leader(&self, leader: &str) {
        let demoted = self.node.lock().await.accept_leader(leader);
        self.roster.lock().await.remove(leader);
        info!("Accepted {leader} as leader");

        if demoted {
            info!("Stepping down in favour of {leader}");
            self.games.cancel_all_countdowns().await;
        }
    }
}
