use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use deckraft::config::NodeConfig;
use deckraft::game::GameSession;
use deckraft::network::NetworkError;
use deckraft::raft::{
    Command, Forward, LogEntry, NodeRole, Peers, Reply, ReplyStatus, VoteReply, VoteRequest,
};
use deckraft::replica::{Origin, Replica};
use deckraft::storage::AccountStore;

/// In-process transport: every address maps to a replica, and any address
/// in `down` behaves like a crashed node. `slow` holds back AppendLog for the
/// given log indexes.
#[derive(Default)]
struct Mesh {
    nodes: Mutex<HashMap<String, Arc<Replica>>>,
    down: Mutex<HashSet<String>>,
    slow: Mutex<HashMap<u64, Duration>>,
}

impl Mesh {
    fn add(&self, replica: &Arc<Replica>) {
        self.nodes
            .lock()
            .unwrap()
            .insert(replica.address().to_string(), Arc::clone(replica));
    }

    fn crash(&self, address: &str) {
        self.down.lock().unwrap().insert(address.to_string());
    }

    fn restart(&self, address: &str) {
        self.down.lock().unwrap().remove(address);
    }

    fn delay_entry(&self, index: u64, by: Duration) {
        self.slow.lock().unwrap().insert(index, by);
    }

    fn target(&self, address: &str) -> Result<Arc<Replica>, NetworkError> {
        if self.down.lock().unwrap().contains(address) {
            return Err(NetworkError::ConnectionError(format!("{address} is down")));
        }
        self.nodes
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .ok_or_else(|| NetworkError::ConnectionError(format!("{address} unknown")))
    }
}

fn rejected(e: impl ToString) -> NetworkError {
    NetworkError::Rejected(e.to_string())
}

#[async_trait]
impl Peers for Mesh {
    async fn heartbeat(&self, peer: &str) -> Result<(), NetworkError> {
        self.target(peer).map(|_| ())
    }

    async fn request_vote(
        &self,
        peer: &str,
        request: &VoteRequest,
    ) -> Result<VoteReply, NetworkError> {
        let target = self.target(peer)?;
        Ok(target
            .handle_request_vote(request.term, &request.candidate_id)
            .await)
    }

    async fn announce_leader(&self, peer: &str, leader: &str) -> Result<(), NetworkError> {
        self.target(peer)?.accept_leader(leader).await;
        Ok(())
    }

    async fn append_log(&self, peer: &str, entry: &LogEntry) -> Result<(), NetworkError> {
        let delay = self.slow.lock().unwrap().get(&entry.index).copied();
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        self.target(peer)?
            .append_log(entry.clone())
            .await
            .map_err(rejected)
    }

    async fn update_replica_list(&self, peer: &str, roster: &[String]) -> Result<(), NetworkError> {
        self.target(peer)?.update_replica_list(roster).await;
        Ok(())
    }

    async fn register_replica(
        &self,
        leader: &str,
        replica: &str,
    ) -> Result<Vec<String>, NetworkError> {
        self.target(leader)?
            .register_replica(replica)
            .await
            .map_err(rejected)
    }

    async fn sync_all_games(&self, leader: &str) -> Result<String, NetworkError> {
        self.target(leader)?.sync_all_games().await.map_err(rejected)
    }

    async fn sync_database(&self, leader: &str) -> Result<Vec<u8>, NetworkError> {
        self.target(leader)?
            .database_snapshot()
            .await
            .map_err(rejected)
    }

    async fn forward(&self, leader: &str, write: &Forward) -> Result<Reply, NetworkError> {
        let target = self.target(leader)?;
        let reply = match write.clone() {
            Forward::Command(command) => target.submit(command, Origin::Forwarded).await,
            Forward::StartMatch {
                username,
                num_players,
            } => {
                target
                    .start_match(&username, num_players, Origin::Forwarded)
                    .await
            }
            Forward::AcceptMatch { username, game_id } => {
                target
                    .accept_match(&username, &game_id, Origin::Forwarded)
                    .await
            }
        };
        Ok(reply)
    }
}

const LEADER: &str = "127.0.0.1:7000";
const F1: &str = "127.0.0.1:7001";
const F2: &str = "127.0.0.1:7002";

fn config(address: &str, leader: bool, replicas: &[&str]) -> NodeConfig {
    NodeConfig {
        listen_address: address.to_string(),
        is_leader: leader,
        leader_address: (!leader).then(|| LEADER.to_string()),
        replicas: replicas.iter().map(|r| r.to_string()).collect(),
        heartbeat_interval_ms: 20,
        rpc_timeout_ms: 100,
        turn_seconds: 600,
        countdown_tick_ms: 50,
        ..NodeConfig::default()
    }
}

/// One leader and two followers, wired through a shared mesh.
fn cluster() -> (Arc<Mesh>, Arc<Replica>, Arc<Replica>, Arc<Replica>) {
    cluster_with(|_| {})
}

fn cluster_with(
    tweak: impl Fn(&mut NodeConfig),
) -> (Arc<Mesh>, Arc<Replica>, Arc<Replica>, Arc<Replica>) {
    let mesh = Arc::new(Mesh::default());
    let build = |address: &str, leader: bool, replicas: &[&str]| {
        let mut cfg = config(address, leader, replicas);
        tweak(&mut cfg);
        let replica = Replica::new(&cfg, AccountStore::in_memory(), mesh.clone());
        mesh.add(&replica);
        replica
    };

    let leader = build(LEADER, true, &[F1, F2]);
    let f1 = build(F1, false, &[F2]);
    let f2 = build(F2, false, &[F1]);
    (mesh, leader, f1, f2)
}

fn players(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// Seeds the same two-player session on every node.
async fn seed_game(nodes: &[&Arc<Replica>], game_id: &str) {
    for node in nodes {
        let session = GameSession::with_hands(
            game_id,
            players(&["alice", "bob"]),
            vec![vec![3, 5, 5], vec![4, 6, 9]],
        )
        .unwrap();
        node.games().insert(session).await;
    }
}

fn play(game_id: &str, username: &str, cards: &[u8]) -> Command {
    Command::PlayCards {
        game_id: game_id.to_string(),
        username: username.to_string(),
        cards: cards.to_vec(),
    }
}

fn pass(game_id: &str, username: &str) -> Command {
    Command::PassTurn {
        game_id: game_id.to_string(),
        username: username.to_string(),
    }
}

#[tokio::test]
async fn quorum_commit_reaches_every_follower() {
    let (_mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;

    let reply = leader.submit(play("g1", "alice", &[3]), Origin::Client).await;
    assert_eq!(reply, Reply::success("Cards played successfully"));
    assert_eq!(leader.commit_index().await, 1);

    for node in [&leader, &f1, &f2] {
        let session = node.games().get("g1").await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.hand("alice"), Some(&[5, 5][..]));
        assert_eq!(session.current_player(), "bob");
        assert_eq!(session.last_played(), &[3u8][..]);
    }
    assert_eq!(f1.commit_index().await, 1);
}

#[tokio::test]
async fn game_errors_come_back_as_error_replies() {
    let (_mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;

    let reply = leader.submit(play("g1", "bob", &[4]), Origin::Client).await;
    assert_eq!(reply, Reply::error("Not your turn."));

    let reply = leader.submit(play("g1", "alice", &[7]), Origin::Client).await;
    assert_eq!(reply, Reply::error("You don't have those cards."));

    let reply = leader.submit(play("nope", "alice", &[3]), Origin::Client).await;
    assert_eq!(reply.status, ReplyStatus::Error);
    assert!(reply.message.contains("Game not found"));

    let session = leader.games().get("g1").await.unwrap();
    assert_eq!(session.lock().await.current_player(), "alice");
}

#[tokio::test]
async fn commit_survives_one_failed_follower() {
    let (mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;
    mesh.crash(F2);

    // Two followers need two acks: the leader plus f1.
    let reply = leader.submit(play("g1", "alice", &[3]), Origin::Client).await;
    assert!(reply.is_success(), "{reply:?}");
    assert_eq!(leader.commit_index().await, 1);
}

#[tokio::test]
async fn write_without_quorum_is_not_applied() {
    let mesh = Arc::new(Mesh::default());
    let peers: Arc<dyn Peers> = mesh.clone();
    let leader = Replica::new(
        &config(LEADER, true, &[F1, F2, "127.0.0.1:7003"]),
        AccountStore::in_memory(),
        peers,
    );
    mesh.add(&leader);
    seed_game(&[&leader], "g1").await;

    // Three followers, none reachable: 1 ack of 3 needed.
    let reply = leader.submit(play("g1", "alice", &[3]), Origin::Client).await;
    assert_eq!(reply.status, ReplyStatus::Error);
    assert!(reply.message.contains("Replication failed"), "{}", reply.message);

    assert_eq!(leader.commit_index().await, 0);
    assert_eq!(leader.last_log_index().await, 1);
    let session = leader.games().get("g1").await.unwrap();
    assert_eq!(session.lock().await.hand("alice"), Some(&[3, 5, 5][..]));
}

#[tokio::test]
async fn overlapping_writes_apply_in_log_order() {
    let (mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;
    mesh.delay_entry(1, Duration::from_millis(150));

    let first = {
        let leader = Arc::clone(&leader);
        tokio::spawn(async move { leader.submit(play("g1", "alice", &[3]), Origin::Client).await })
    };
    sleep(Duration::from_millis(20)).await;
    let second = leader.submit(pass("g1", "bob"), Origin::Client).await;
    let first = first.await.unwrap();

    assert_eq!(first, Reply::success("Cards played successfully"));
    assert_eq!(
        second,
        Reply::success("bob passed the turn. alice starts a new round.")
    );

    for node in [&leader, &f1, &f2] {
        assert_eq!(node.commit_index().await, 2);
        let session = node.games().get("g1").await.unwrap();
        let session = session.lock().await;
        assert_eq!(session.hand("alice"), Some(&[5, 5][..]));
        assert_eq!(session.current_player(), "alice");
        assert!(session.last_played().is_empty());
    }
}

#[tokio::test]
async fn follower_forwards_writes_to_the_leader() {
    let (_mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;

    let reply = f1.submit(play("g1", "alice", &[3]), Origin::Client).await;
    assert_eq!(reply, Reply::success("Cards played successfully"));
    assert_eq!(leader.commit_index().await, 1);

    let session = f2.games().get("g1").await.unwrap();
    assert_eq!(session.lock().await.current_player(), "bob");
}

#[tokio::test]
async fn forwarded_writes_are_not_forwarded_again() {
    let (_mesh, _leader, f1, _f2) = cluster();
    let reply = f1.submit(pass("g1", "alice"), Origin::Forwarded).await;
    assert_eq!(reply, Reply::error("Not the leader"));
}

#[tokio::test]
async fn dead_leader_makes_forwarding_fail() {
    let (mesh, leader, f1, _f2) = cluster();
    mesh.crash(leader.address());

    let reply = f1.submit(pass("g1", "alice"), Origin::Client).await;
    assert_eq!(reply, Reply::error("Leader unavailable"));
}

#[tokio::test]
async fn quit_is_applied_locally_then_broadcast() {
    let (_mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;

    let quit = Command::QuitGame {
        game_id: "g1".to_string(),
        username: "bob".to_string(),
    };
    let reply = leader.submit(quit, Origin::Client).await;
    assert_eq!(reply, Reply::success("bob quit the game. alice won the game!"));
    assert_eq!(leader.commit_index().await, 1);

    // The broadcast runs in the background.
    for _ in 0..50 {
        let session = f2.games().get("g1").await.unwrap();
        if session.lock().await.is_over() {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    let session = f2.games().get("g1").await.unwrap();
    assert_eq!(session.lock().await.winner(), Some("alice"));
}

#[tokio::test]
async fn replayed_entries_are_not_applied_twice() {
    let (_mesh, _leader, f1, _f2) = cluster();
    seed_game(&[&f1], "g1").await;

    let entry = LogEntry {
        index: 1,
        command: play("g1", "alice", &[3]),
    };
    f1.append_log(entry.clone()).await.unwrap();
    f1.append_log(entry).await.unwrap();

    let session = f1.games().get("g1").await.unwrap();
    let session = session.lock().await;
    assert_eq!(session.hand("alice"), Some(&[5, 5][..]));
    assert_eq!(session.current_player(), "bob");
}

#[tokio::test]
async fn finished_game_updates_accounts_once() {
    let (_mesh, leader, f1, f2) = cluster();
    for node in [&leader, &f1, &f2] {
        node.login("alice", "pw").await;
        node.login("bob", "pw").await;
        let session = GameSession::with_hands(
            "g1",
            players(&["alice", "bob"]),
            vec![vec![7], vec![2, 3]],
        )
        .unwrap();
        node.games().insert(session).await;
    }

    let reply = leader.submit(play("g1", "alice", &[7]), Origin::Client).await;
    assert_eq!(reply, Reply::success("alice won the game!"));

    // A second attempt on a finished game changes nothing.
    let again = leader.submit(pass("g1", "bob"), Origin::Client).await;
    assert_eq!(again.status, ReplyStatus::Error);

    for node in [&leader, &f1, &f2] {
        let alice = node.accounts().account("alice").await.unwrap();
        let bob = node.accounts().account("bob").await.unwrap();
        assert_eq!((alice.win_count, alice.loss_count), (1, 0));
        assert_eq!((bob.win_count, bob.loss_count), (0, 1));
    }
}

#[tokio::test]
async fn start_match_pairs_two_players() {
    let (_mesh, leader, f1, _f2) = cluster();

    let first = f1.start_match("alice", 2, Origin::Client).await;
    assert_eq!(first, Reply::waiting("Waiting for players (1/2)"));

    let second = leader.start_match("bob", 2, Origin::Client).await;
    assert_eq!(second.status, ReplyStatus::Success);
    let game_id = second
        .message
        .strip_prefix("Game ready! ID: ")
        .expect("game id in reply")
        .to_string();

    // Alice's next poll picks up the game created on Bob's poll.
    let again = f1.start_match("alice", 2, Origin::Client).await;
    assert_eq!(again, Reply::success(format!("Game ready! ID: {game_id}")));

    let session = leader.games().get(&game_id).await.unwrap();
    let session = session.lock().await;
    assert_eq!(session.players(), &players(&["alice", "bob"])[..]);
    let dealt: usize = ["alice", "bob"]
        .iter()
        .map(|p| session.hand(p).unwrap().len())
        .sum();
    assert_eq!(dealt, 40);
    drop(session);

    assert!(leader.games().has_running_countdown(&game_id).await);
    let accepted = f1.accept_match("bob", &game_id, Origin::Client).await;
    assert_eq!(accepted, Reply::success(format!("Joined game {game_id}")));
}

#[tokio::test]
async fn three_player_match_keeps_waiting_with_two() {
    let (_mesh, leader, _f1, _f2) = cluster();
    leader.start_match("alice", 3, Origin::Client).await;
    let reply = leader.start_match("bob", 3, Origin::Client).await;
    assert_eq!(reply, Reply::waiting("Waiting for players (2/3)"));
    assert!(leader.games().is_empty().await);

    let bad = leader.start_match("carol", 5, Origin::Client).await;
    assert_eq!(bad.status, ReplyStatus::Error);
}

#[tokio::test]
async fn logout_leaves_the_match_queue() {
    let (_mesh, leader, _f1, _f2) = cluster();
    assert!(leader.login("alice", "pw").await.is_success());
    assert!(leader.is_online("alice").await);

    leader.start_match("alice", 2, Origin::Client).await;
    assert_eq!(leader.logout("alice").await, Reply::success("User logged out."));
    assert!(!leader.is_online("alice").await);

    let reply = leader.start_match("bob", 2, Origin::Client).await;
    assert_eq!(reply, Reply::waiting("Waiting for players (1/2)"));
}

#[tokio::test]
async fn login_checks_the_password_after_registration() {
    let (_mesh, leader, _f1, _f2) = cluster();
    assert_eq!(leader.login("alice", "pw").await, Reply::success("Account created."));
    assert_eq!(leader.login("alice", "pw").await, Reply::success("Login successful."));
    assert_eq!(leader.login("alice", "nope").await, Reply::error("Invalid credentials"));

    assert_eq!(
        leader.delete_account("alice", "nope").await,
        Reply::error("Incorrect password")
    );
    assert_eq!(leader.delete_account("alice", "pw").await, Reply::success("Account deleted"));
    assert!(leader.accounts().account("alice").await.is_none());
}

#[tokio::test]
async fn game_state_hides_other_hands() {
    let (_mesh, leader, f1, f2) = cluster();
    seed_game(&[&leader, &f1, &f2], "g1").await;

    let view = leader.game_state("g1", "bob").await.unwrap();
    assert_eq!(view.current_turn, "alice");
    let alice = view.players.iter().find(|p| p.username == "alice").unwrap();
    let bob = view.players.iter().find(|p| p.username == "bob").unwrap();
    assert!(alice.cards.is_empty());
    assert_eq!(alice.card_count, 3);
    assert_eq!(bob.cards, vec![4, 6, 9]);

    // No viewer: the turn holder's hand is shown.
    let view = leader.game_state("g1", "").await.unwrap();
    let alice = view.players.iter().find(|p| p.username == "alice").unwrap();
    assert_eq!(alice.cards, vec![3, 5, 5]);
}

#[tokio::test]
async fn election_after_leader_loss() {
    let (mesh, leader, f1, f2) = cluster();
    mesh.crash(leader.address());

    assert!(f1.initiate_election().await);
    assert_eq!(f1.role().await, NodeRole::Leader);
    assert_eq!(f1.current_term().await, 1);

    // f2 learned about the new leader through the announcement.
    assert_eq!(f2.leader_address().await.as_deref(), Some(F1));
    assert_eq!(f2.role().await, NodeRole::Follower);
    assert!(f1.roster().await.contains(&F2.to_string()));
    assert!(!f2.roster().await.contains(&F1.to_string()));
}

#[tokio::test]
async fn election_without_majority_fails() {
    let (mesh, leader, f1, _f2) = cluster();
    mesh.crash(leader.address());
    mesh.crash(F2);

    assert!(!f1.initiate_election().await);
    assert_eq!(f1.role().await, NodeRole::Follower);
    assert_eq!(f1.current_term().await, 1);
}

#[tokio::test]
async fn one_vote_per_term() {
    let (_mesh, _leader, f1, _f2) = cluster();
    assert!(f1.handle_request_vote(3, F2).await.vote_granted);
    assert!(!f1.handle_request_vote(3, "127.0.0.1:7009").await.vote_granted);
    assert!(!f1.handle_request_vote(2, F2).await.vote_granted);
}

#[tokio::test]
async fn heartbeat_tick_elects_a_follower_when_the_leader_is_gone() {
    let (mesh, leader, f1, f2) = cluster();
    mesh.crash(leader.address());

    f1.heartbeat_tick().await;
    assert!(f1.is_leader().await);
    assert_eq!(f2.leader_address().await.as_deref(), Some(F1));
}

#[tokio::test]
async fn leader_that_voted_for_a_loser_can_lead_again() {
    let mesh = Arc::new(Mesh::default());
    let f3 = "127.0.0.1:7003";
    let leader = Replica::new(
        &config(LEADER, true, &[F1, F2]),
        AccountStore::in_memory(),
        mesh.clone(),
    );
    // f1 still has the operator's list, leader included.
    let f1 = Replica::new(
        &config(F1, false, &[LEADER, F2, f3]),
        AccountStore::in_memory(),
        mesh.clone(),
    );
    mesh.add(&leader);
    mesh.add(&f1);
    mesh.crash(F2);
    mesh.crash(f3);

    assert!(!f1.initiate_election().await);
    assert_eq!(leader.who_is_leader().await, (None, false));
    assert_eq!(
        leader.submit(pass("g1", "bob"), Origin::Client).await,
        Reply::error("Not the leader")
    );

    // With no leader known the next tick runs an election, and f1 has not
    // voted in the new term.
    leader.heartbeat_tick().await;
    assert!(leader.is_leader().await);
    assert_eq!(
        f1.who_is_leader().await,
        (Some(LEADER.to_string()), false)
    );
}

#[tokio::test]
async fn heartbeat_retries_a_failed_bootstrap() {
    let (mesh, leader, _f1, _f2) = cluster();
    leader.login("alice", "pw").await;
    seed_game(&[&leader], "g1").await;

    let late = Replica::new(
        &config("127.0.0.1:7003", false, &[]),
        AccountStore::in_memory(),
        mesh.clone(),
    );
    mesh.add(&late);

    mesh.crash(LEADER);
    assert!(late.bootstrap().await.is_err());
    assert!(!late.is_registered());

    mesh.restart(LEADER);
    late.heartbeat_tick().await;
    assert!(late.is_registered());
    assert!(leader.roster().await.contains(&"127.0.0.1:7003".to_string()));
    assert!(late.accounts().account("alice").await.is_some());
    assert_eq!(late.games().ids().await, vec!["g1".to_string()]);

    // Registered followers go back to plain game syncs.
    late.heartbeat_tick().await;
    assert_eq!(leader.roster().await.len(), 3);
}

#[tokio::test]
async fn leader_evicts_unreachable_replicas() {
    let (mesh, leader, f1, _f2) = cluster();
    mesh.crash(F2);

    leader.heartbeat_tick().await;
    assert_eq!(leader.roster().await, vec![F1.to_string()]);
    // Survivors get the shrunken roster; f1 never lists itself.
    assert!(f1.roster().await.is_empty());
}

#[tokio::test]
async fn register_broadcasts_the_new_roster() {
    let (mesh, leader, f1, f2) = cluster();
    let newcomer = Replica::new(
        &config("127.0.0.1:7003", false, &[]),
        AccountStore::in_memory(),
        mesh.clone(),
    );
    mesh.add(&newcomer);

    let roster = leader.register_replica(newcomer.address()).await.unwrap();
    assert_eq!(roster, vec![F1.to_string(), F2.to_string()]);
    assert!(f1.roster().await.contains(&"127.0.0.1:7003".to_string()));
    assert!(f2.roster().await.contains(&"127.0.0.1:7003".to_string()));

    // Registering twice changes nothing.
    let again = leader.register_replica(newcomer.address()).await.unwrap();
    assert_eq!(again, roster);
    assert_eq!(leader.roster().await.len(), 3);

    assert!(f1.register_replica("127.0.0.1:7004").await.is_err());
}

#[tokio::test]
async fn bootstrap_copies_accounts_and_games() {
    let (mesh, leader, _f1, _f2) = cluster();
    leader.login("alice", "pw").await;
    seed_game(&[&leader], "g1").await;

    let newcomer = Replica::new(
        &config("127.0.0.1:7003", false, &[]),
        AccountStore::in_memory(),
        mesh.clone(),
    );
    mesh.add(&newcomer);

    newcomer.bootstrap().await.unwrap();
    assert!(newcomer.accounts().account("alice").await.is_some());
    assert_eq!(newcomer.games().ids().await, vec!["g1".to_string()]);
    assert_eq!(newcomer.roster().await, vec![F1.to_string(), F2.to_string()]);
}

#[tokio::test]
async fn expired_turn_is_passed_through_the_log() {
    let (_mesh, leader, f1, f2) = cluster_with(|cfg| cfg.turn_seconds = 1);

    leader.start_match("alice", 2, Origin::Client).await;
    let reply = leader.start_match("bob", 2, Origin::Client).await;
    let game_id = reply.message.trim_start_matches("Game ready! ID: ").to_string();
    // Followers pick the new game up the way a heartbeat would.
    f1.pull_games(LEADER).await.unwrap();
    f2.pull_games(LEADER).await.unwrap();

    let session = leader.games().get(&game_id).await.unwrap();
    for _ in 0..60 {
        if session.lock().await.current_player() == "bob" {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(session.lock().await.current_player(), "bob");
    assert!(leader.commit_index().await >= 1);

    let mirrored = f1.games().get(&game_id).await.unwrap();
    assert_eq!(mirrored.lock().await.current_player(), "bob");
}
