//! One node of the cluster.
//!
//! [`Replica`] owns every piece of node-wide mutable state, each behind its own
//! lock, and implements the operations the RPC layer exposes: client writes
//! (replicated through the command log), elections, roster maintenance and
//! full-state synchronization.

mod election;
mod membership;
mod writes;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{info, warn};
use tokio::sync::Mutex;

use crate::config::NodeConfig;
use crate::game::{
    countdown, now_millis, GameError, GameSession, GameTable, GameView, MatchPoll, MatchQueue,
    SharedSession, Viewer,
};
use crate::raft::{
    Command, CommandLog, Forward, NodeRole, Peers, RaftConfig, RaftError, RaftNode, Reply, Roster,
};
use crate::storage::{AccountStore, LoginOutcome, StorageError};

/// Where a write came from. Forwarded writes are never forwarded again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Client,
    Forwarded,
}

pub struct Replica {
    raft: RaftConfig,
    turn_seconds: u64,
    countdown_tick: std::time::Duration,

    node: Mutex<RaftNode>,
    log: Mutex<CommandLog>,
    roster: Mutex<Roster>,
    /// Held from append to apply so entries commit and apply in index order.
    write_path: Arc<Mutex<()>>,
    registered: AtomicBool,

    games: GameTable,
    matches: Mutex<MatchQueue>,
    online: Mutex<HashSet<String>>,
    accounts: AccountStore,

    peers: Arc<dyn Peers>,
}

impl Replica {
    pub fn new(config: &NodeConfig, accounts: AccountStore, peers: Arc<dyn Peers>) -> Arc<Self> {
        let raft = config.raft_config();
        let address = raft.address.clone();

        Arc::new(Self {
            node: Mutex::new(RaftNode::new(
                &address,
                config.is_leader,
                config.leader_address.clone(),
            )),
            log: Mutex::new(CommandLog::new()),
            roster: Mutex::new(Roster::new(&address, &config.replicas)),
            write_path: Arc::new(Mutex::new(())),
            registered: AtomicBool::new(config.is_leader),
            raft,
            turn_seconds: config.turn_seconds,
            countdown_tick: config.countdown_tick(),
            games: GameTable::new(),
            matches: Mutex::new(MatchQueue::new()),
            online: Mutex::new(HashSet::new()),
            accounts,
            peers,
        })
    }

    pub fn address(&self) -> &str {
        &self.raft.address
    }

    pub fn raft_config(&self) -> &RaftConfig {
        &self.raft
    }

    pub fn games(&self) -> &GameTable {
        &self.games
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub async fn is_leader(&self) -> bool {
        self.node.lock().await.is_leader()
    }

    pub async fn role(&self) -> NodeRole {
        self.node.lock().await.role()
    }

    pub async fn current_term(&self) -> u64 {
        self.node.lock().await.current_term()
    }

    pub async fn leader_address(&self) -> Option<String> {
        self.node.lock().await.leader_address().map(str::to_string)
    }

    /// `(leader address, whether this node is the leader)`.
    pub async fn who_is_leader(&self) -> (Option<String>, bool) {
        let node = self.node.lock().await;
        (node.leader_address().map(str::to_string), node.is_leader())
    }

    pub async fn roster(&self) -> Vec<String> {
        self.roster.lock().await.members().to_vec()
    }

    pub async fn commit_index(&self) -> u64 {
        self.log.lock().await.commit_index()
    }

    pub async fn last_log_index(&self) -> u64 {
        self.log.lock().await.last_index()
    }

    /// Whether this node has registered with a leader, or started as one.
    pub fn is_registered(&self) -> bool {
        self.registered.load(Ordering::Acquire)
    }

    pub async fn is_online(&self, username: &str) -> bool {
        self.online.lock().await.contains(username)
    }

    pub async fn login(&self, username: &str, password: &str) -> Reply {
        if username.is_empty() {
            return Reply::error("Username must not be empty");
        }
        match self.accounts.login_or_register(username, password).await {
            Ok(outcome) => {
                self.online.lock().await.insert(username.to_string());
                info!("{username} logged in");
                match outcome {
                    LoginOutcome::Registered => Reply::success("Account created."),
                    LoginOutcome::Authenticated => Reply::success("Login successful."),
                }
            }
            Err(e) => Reply::error(e.to_string()),
        }
    }

    pub async fn logout(&self, username: &str) -> Reply {
        self.online.lock().await.remove(username);
        self.matches.lock().await.remove_user(username);
        Reply::success("User logged out.")
    }

    pub async fn delete_account(&self, username: &str, password: &str) -> Reply {
        match self.accounts.delete_account(username, password).await {
            Ok(()) => {
                self.logout(username).await;
                info!("Deleted account {username}");
                Reply::success("Account deleted")
            }
            Err(StorageError::UnknownAccount(_)) => Reply::error("User not found"),
            Err(StorageError::InvalidCredentials) => Reply::error("Incorrect password"),
            Err(e) => Reply::error(e.to_string()),
        }
    }

    /// Queues `username` for a `num_players` match. The poll that fills the
    /// queue creates the session.
    pub async fn start_match(self: &Arc<Self>, username: &str, num_players: u32, origin: Origin) -> Reply {
        if !self.is_leader().await {
            return self
                .forward(
                    Forward::StartMatch {
                        username: username.to_string(),
                        num_players,
                    },
                    origin,
                )
                .await;
        }

        let poll = self
            .matches
            .lock()
            .await
            .poll(username, num_players as usize);

        match poll {
            Err(e) => Reply::error(e.to_string()),
            Ok(MatchPoll::Waiting { queued, needed }) => {
                Reply::waiting(format!("Waiting for players ({queued}/{needed})"))
            }
            Ok(MatchPoll::Ready { game_id }) => Reply::success(format!("Game ready! ID: {game_id}")),
            Ok(MatchPoll::Filled(players)) => match self.create_game(username, players).await {
                Ok(game_id) => Reply::success(format!("Game ready! ID: {game_id}")),
                Err(e) => Reply::error(e.to_string()),
            },
        }
    }

    async fn create_game(self: &Arc<Self>, filled_by: &str, players: Vec<String>) -> Result<String, GameError> {
        let game_id = format!("{:016x}", rand::random::<u64>());
        let session = GameSession::new(game_id.clone(), players.clone())?;
        let shared = self.games.insert(session).await;
        self.matches
            .lock()
            .await
            .assign(&game_id, &players, filled_by);
        self.start_countdown(&game_id, shared).await;

        info!("Created game {game_id} for {}", players.join(", "));
        Ok(game_id)
    }

    pub async fn accept_match(&self, username: &str, game_id: &str, origin: Origin) -> Reply {
        if !self.is_leader().await {
            return self
                .forward(
                    Forward::AcceptMatch {
                        username: username.to_string(),
                        game_id: game_id.to_string(),
                    },
                    origin,
                )
                .await;
        }

        let session = match self.games.get(game_id).await {
            Ok(session) => session,
            Err(e) => return Reply::error(e.to_string()),
        };
        if !session.lock().await.contains(username) {
            return Reply::error(GameError::PlayerNotInGame(username.to_string()).to_string());
        }

        self.matches.lock().await.claim(username, game_id);
        Reply::success(format!("Joined game {game_id}"))
    }

    /// Snapshot of a session for `username`, or for the turn holder when
    /// `username` is empty.
    pub async fn game_state(&self, game_id: &str, username: &str) -> Result<GameView, GameError> {
        let session = self.games.get(game_id).await?;
        let viewer = if username.is_empty() {
            Viewer::TurnHolder
        } else {
            Viewer::Player(username)
        };

        let mut view = session
            .lock()
            .await
            .view(viewer, self.turn_seconds, now_millis());
        for player in &mut view.players {
            player.win_rate = self.accounts.win_rate(&player.username).await;
        }
        Ok(view)
    }

    /// Starts the turn timer for a session. Only the leader auto-passes; the
    /// task ends itself once this node stops leading.
    async fn start_countdown(self: &Arc<Self>, game_id: &str, session: SharedSession) {
        let weak = Arc::downgrade(self);
        let id = game_id.to_string();

        let handle = countdown::spawn(
            session,
            self.countdown_tick,
            self.turn_seconds,
            move |player| {
                let weak = weak.clone();
                let game_id = id.clone();
                async move {
                    let Some(replica) = weak.upgrade() else {
                        return false;
                    };
                    if !replica.is_leader().await {
                        return false;
                    }

                    info!("Turn timer expired for {player} in game {game_id}");
                    let command = Command::PassTurn {
                        game_id: game_id.clone(),
                        username: player,
                    };
                    if let Err(e) = replica.replicate_and_apply(command).await {
                        warn!("Auto-pass in game {game_id} failed: {e}");
                    }
                    true
                }
            },
        );

        self.games.attach_countdown(game_id, handle).await;
    }

    async fn forward(&self, write: Forward, origin: Origin) -> Reply {
        if origin == Origin::Forwarded {
            return Reply::error(RaftError::NotLeader.to_string());
        }
        let Some(leader) = self.leader_address().await else {
            return Reply::error(RaftError::NotLeader.to_string());
        };
        if leader == self.address() {
            return Reply::error(RaftError::NotLeader.to_string());
        }

        match self.peers.forward(&leader, &write).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Forwarding to leader {leader} failed: {e}");
                Reply::error(RaftError::LeaderUnavailable.to_string())
            }
        }
    }
}
