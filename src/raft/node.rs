use std::collections::HashSet;

// Use external log crate, not our own log module
use ::log::{debug, info};

use super::{NodeRole, NodeState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteRequest {
    pub term: u64,
    pub candidate_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteReply {
    pub term: u64,
    pub vote_granted: bool,
}

/// Term, ballot and role of one node.
///
/// Votes are granted on term alone: there is no log-completeness check, so a
/// lagging candidate can win.
pub struct RaftNode {
    address: String,
    state: NodeState,
    votes_received: HashSet<String>,
}

impl RaftNode {
    pub fn new(address: &str, is_leader: bool, leader_address: Option<String>) -> Self {
        let (role, leader_address) = if is_leader {
            (NodeRole::Leader, Some(address.to_string()))
        } else {
            (NodeRole::Follower, leader_address)
        };

        Self {
            address: address.to_string(),
            state: NodeState {
                current_term: 0,
                voted_for: None,
                role,
                leader_address,
            },
            votes_received: HashSet::new(),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    pub fn role(&self) -> NodeRole {
        self.state.role
    }

    pub fn is_leader(&self) -> bool {
        matches!(self.state.role, NodeRole::Leader)
    }

    pub fn current_term(&self) -> u64 {
        self.state.current_term
    }

    pub fn leader_address(&self) -> Option<&str> {
        self.state.leader_address.as_deref()
    }

    /// Grants iff `term >= currentTerm` and no other candidate already holds
    /// this node's vote for that term. Granting demotes this node, and a
    /// leader that steps down forgets itself as leader so its next heartbeat
    /// tick looks for a new one.
    pub fn handle_request_vote(&mut self, term: u64, candidate_id: &str) -> VoteReply {
        if term < self.state.current_term {
            debug!(
                "Rejecting vote for {candidate_id}: term {term} < {}",
                self.state.current_term
            );
            return VoteReply {
                term: self.state.current_term,
                vote_granted: false,
            };
        }

        if term > self.state.current_term {
            self.state.current_term = term;
            self.state.voted_for = None;
        }

        let vote_granted = match self.state.voted_for.as_deref() {
            None => true,
            Some(existing) => existing == candidate_id,
        };

        if vote_granted {
            if self.state.leader_address.as_deref() == Some(self.address.as_str()) {
                self.state.leader_address = None;
            }
            self.state.voted_for = Some(candidate_id.to_string());
            self.state.role = NodeRole::Follower;
            self.votes_received.clear();
            info!("Voted for {candidate_id} in term {term}");
        }

        VoteReply {
            term: self.state.current_term,
            vote_granted,
        }
    }

    /// Becomes a candidate for the next term, voting for itself.
    pub fn start_election(&mut self) -> VoteRequest {
        self.state.current_term += 1;
        self.state.voted_for = Some(self.address.clone());
        self.state.role = NodeRole::Candidate;

        self.votes_received.clear();
        self.votes_received.insert(self.address.clone());

        VoteRequest {
            term: self.state.current_term,
            candidate_id: self.address.clone(),
        }
    }

    pub fn record_vote(&mut self, peer: &str, reply: VoteReply) {
        if reply.term > self.state.current_term {
            self.state.current_term = reply.term;
            self.state.voted_for = None;
            self.state.role = NodeRole::Follower;
            self.votes_received.clear();
            return;
        }

        if self.state.role == NodeRole::Candidate
            && reply.term == self.state.current_term
            && reply.vote_granted
        {
            self.votes_received.insert(peer.to_string());
        }
    }

    /// Votes collected in the current candidacy, self included.
    pub fn votes(&self) -> usize {
        self.votes_received.len()
    }

    pub fn is_candidate_for(&self, term: u64) -> bool {
        self.state.role == NodeRole::Candidate && self.state.current_term == term
    }

    pub fn become_leader(&mut self) {
        self.state.role = NodeRole::Leader;
        self.state.voted_for = None;
        self.state.leader_address = Some(self.address.clone());
        self.votes_received.clear();
    }

    /// Gives up a failed candidacy and waits for the next trigger.
    pub fn abandon_election(&mut self) {
        if self.state.role == NodeRole::Candidate {
            self.state.role = NodeRole::Follower;
        }
        self.votes_received.clear();
    }

    /// Records a leader announcement. Returns whether this node was leading.
    pub fn accept_leader(&mut self, leader: &str) -> bool {
        let was_leader = self.is_leader();
        self.state.leader_address = Some(leader.to_string());
        self.state.role = if leader == self.address {
            NodeRole::Leader
        } else {
            NodeRole::Follower
        };
        self.votes_received.clear();
        was_leader && !self.is_leader()
    }
}
