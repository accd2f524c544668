use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use tonic::metadata::MetadataValue;
use tonic::transport::{Channel, Endpoint};
use tonic::Request;

use crate::network::proto::card_game_service_client::CardGameServiceClient;
use crate::raft::{
    Command, Forward, LogEntry, Peers, Reply, ReplyStatus, Roster, VoteReply, VoteRequest,
};

use super::proto;
use super::{NetworkError, FORWARDED_HEADER};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

impl From<proto::Response> for Reply {
    fn from(response: proto::Response) -> Self {
        Reply {
            status: ReplyStatus::parse(&response.status),
            message: response.message,
        }
    }
}

/// gRPC client for one node, used both by players and by other replicas.
pub struct GameClient {
    address: String,
    timeout: Duration,
    forwarded: bool,
    client: Option<CardGameServiceClient<Channel>>,
}

impl GameClient {
    pub fn new(address: &str) -> Self {
        Self::with_timeout(address, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(address: &str, timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            timeout,
            forwarded: false,
            client: None,
        }
    }

    /// Marks every write sent through this client as already forwarded, so
    /// the receiving node will not forward it again.
    pub fn forwarded(mut self) -> Self {
        self.forwarded = true;
        self
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn connect(&mut self) -> Result<(), NetworkError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", self.address))
            .map_err(|e| NetworkError::ConnectionError(e.to_string()))?;

        let channel = tokio::time::timeout(
            self.timeout,
            endpoint
                .connect_timeout(self.timeout)
                .timeout(self.timeout)
                .connect(),
        )
        .await
        .map_err(|_| NetworkError::TimeoutError)??;

        self.client = Some(CardGameServiceClient::new(channel));

        Ok(())
    }

    async fn client(&mut self) -> Result<&mut CardGameServiceClient<Channel>, NetworkError> {
        if self.client.is_none() {
            self.connect().await?;
        }
        self.client
            .as_mut()
            .ok_or_else(|| NetworkError::ConnectionError("Client not connected".to_string()))
    }

    fn request<T>(&self, message: T) -> Request<T> {
        let mut request = Request::new(message);
        if self.forwarded {
            request
                .metadata_mut()
                .insert(FORWARDED_HEADER, MetadataValue::from_static("1"));
        }
        request
    }

    pub async fn login(&mut self, username: &str, password: &str) -> Result<Reply, NetworkError> {
        let request = self.request(proto::LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        let response = self.client().await?.login(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn logout(&mut self, username: &str) -> Result<Reply, NetworkError> {
        let request = self.request(proto::LogoutRequest {
            username: username.to_string(),
        });
        let response = self.client().await?.logout(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn delete_account(
        &mut self,
        username: &str,
        password: &str,
    ) -> Result<Reply, NetworkError> {
        let request = self.request(proto::DeleteAccountRequest {
            username: username.to_string(),
            password: password.to_string(),
        });
        let response = self
            .client()
            .await?
            .delete_account(request)
            .await?
            .into_inner();
        Ok(response.into())
    }

    pub async fn start_match(
        &mut self,
        username: &str,
        num_players: u32,
    ) -> Result<Reply, NetworkError> {
        let request = self.request(proto::MatchRequest {
            username: username.to_string(),
            num_players,
        });
        let response = self.client().await?.start_match(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn accept_match(
        &mut self,
        username: &str,
        game_id: &str,
    ) -> Result<Reply, NetworkError> {
        let request = self.request(proto::AcceptMatchRequest {
            username: username.to_string(),
            game_id: game_id.to_string(),
        });
        let response = self
            .client()
            .await?
            .accept_match(request)
            .await?
            .into_inner();
        Ok(response.into())
    }

    pub async fn play_card(
        &mut self,
        username: &str,
        game_id: &str,
        cards: &[u8],
    ) -> Result<Reply, NetworkError> {
        let request = self.request(proto::PlayCardRequest {
            username: username.to_string(),
            game_id: game_id.to_string(),
            cards: cards.iter().map(|&c| u32::from(c)).collect(),
        });
        let response = self.client().await?.play_card(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn pass_turn(&mut self, username: &str, game_id: &str) -> Result<Reply, NetworkError> {
        let request = self.request(game_action(username, game_id));
        let response = self.client().await?.pass_turn(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn quit_game(&mut self, username: &str, game_id: &str) -> Result<Reply, NetworkError> {
        let request = self.request(game_action(username, game_id));
        let response = self.client().await?.quit_game(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn get_game_state(
        &mut self,
        game_id: &str,
        username: &str,
    ) -> Result<proto::GameStateResponse, NetworkError> {
        let request = self.request(proto::GameStateRequest {
            game_id: game_id.to_string(),
            username: username.to_string(),
        });
        Ok(self
            .client()
            .await?
            .get_game_state(request)
            .await?
            .into_inner())
    }

    pub async fn who_is_leader(&mut self) -> Result<proto::LeaderInfoResponse, NetworkError> {
        let request = self.request(proto::Empty {});
        Ok(self
            .client()
            .await?
            .who_is_leader(request)
            .await?
            .into_inner())
    }

    /// Asks each candidate who leads, sweeping the list a second time if the
    /// first sweep finds nobody.
    pub async fn locate_leader(
        candidates: &[String],
        timeout: Duration,
    ) -> Result<String, NetworkError> {
        for sweep in 0..2 {
            for candidate in candidates {
                let mut client = GameClient::with_timeout(candidate, timeout);
                match client.who_is_leader().await {
                    Ok(info) if info.is_leader => return Ok(candidate.clone()),
                    Ok(info) if !info.leader_address.is_empty() => {
                        return Ok(info.leader_address)
                    }
                    Ok(_) => debug!("{candidate} does not know the leader"),
                    Err(e) => debug!("WhoIsLeader to {candidate} failed (sweep {sweep}): {e}"),
                }
            }
        }
        Err(NetworkError::ConnectionError(
            "No leader found among candidates".to_string(),
        ))
    }

    pub async fn heartbeat(&mut self) -> Result<Reply, NetworkError> {
        let request = self.request(proto::Empty {});
        let response = self.client().await?.heartbeat(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn request_vote(&mut self, vote: &VoteRequest) -> Result<VoteReply, NetworkError> {
        let request = self.request(proto::VoteRequest {
            term: vote.term,
            candidate_id: vote.candidate_id.clone(),
        });
        let response = self.client().await?.request_vote(request).await?.into_inner();
        Ok(VoteReply {
            term: response.term,
            vote_granted: response.vote_granted,
        })
    }

    pub async fn announce_leader(&mut self, leader: &str) -> Result<Reply, NetworkError> {
        let request = self.request(proto::CoordinatorMessage {
            new_leader_address: leader.to_string(),
        });
        let response = self
            .client()
            .await?
            .announce_leader(request)
            .await?
            .into_inner();
        Ok(response.into())
    }

    pub async fn append_log(&mut self, entry: &LogEntry) -> Result<Reply, NetworkError> {
        let payload = entry
            .command
            .encode()
            .map_err(|e| NetworkError::ConnectionError(e.to_string()))?;
        let request = self.request(proto::LogEntry {
            index: entry.index,
            command: entry.command.tag().to_string(),
            payload,
        });
        let response = self.client().await?.append_log(request).await?.into_inner();
        Ok(response.into())
    }

    pub async fn register_replica(
        &mut self,
        replica: &str,
    ) -> Result<proto::RegisterReplicaResponse, NetworkError> {
        let request = self.request(proto::RegisterReplicaRequest {
            replica_address: replica.to_string(),
        });
        Ok(self
            .client()
            .await?
            .register_replica(request)
            .await?
            .into_inner())
    }

    pub async fn update_replica_list(&mut self, roster: &[String]) -> Result<Reply, NetworkError> {
        let json = serde_json::to_string(roster)
            .map_err(|e| NetworkError::ConnectionError(e.to_string()))?;
        let request = self.request(proto::ReplicaListUpdateRequest {
            replica_addresses_json: json,
        });
        let response = self
            .client()
            .await?
            .update_replica_list(request)
            .await?
            .into_inner();
        Ok(response.into())
    }

    pub async fn sync_all_games(&mut self) -> Result<proto::SyncGamesResponse, NetworkError> {
        let request = self.request(proto::Empty {});
        Ok(self
            .client()
            .await?
            .sync_all_games(request)
            .await?
            .into_inner())
    }

    pub async fn sync_database(&mut self) -> Result<proto::SyncDatabaseResponse, NetworkError> {
        let request = self.request(proto::Empty {});
        Ok(self
            .client()
            .await?
            .sync_database(request)
            .await?
            .into_inner())
    }
}

fn game_action(username: &str, game_id: &str) -> proto::GameActionRequest {
    proto::GameActionRequest {
        username: username.to_string(),
        game_id: game_id.to_string(),
    }
}

fn ensure_success(reply: Reply) -> Result<(), NetworkError> {
    if reply.is_success() {
        Ok(())
    } else {
        Err(NetworkError::Rejected(reply.message))
    }
}

fn ensure_status(status: &str, what: &str) -> Result<(), NetworkError> {
    match ReplyStatus::parse(status) {
        ReplyStatus::Success => Ok(()),
        _ => Err(NetworkError::Rejected(format!("{what} refused"))),
    }
}

/// [`Peers`] over gRPC. Each call dials the peer fresh and is bounded by
/// `rpc_timeout`.
#[derive(Debug, Clone)]
pub struct GrpcPeers {
    rpc_timeout: Duration,
}

impl GrpcPeers {
    pub fn new(rpc_timeout: Duration) -> Self {
        Self { rpc_timeout }
    }

    fn client(&self, peer: &str) -> GameClient {
        GameClient::with_timeout(peer, self.rpc_timeout)
    }
}

#[async_trait]
impl Peers for GrpcPeers {
    async fn heartbeat(&self, peer: &str) -> Result<(), NetworkError> {
        ensure_success(self.client(peer).heartbeat().await?)
    }

    async fn request_vote(
        &self,
        peer: &str,
        request: &VoteRequest,
    ) -> Result<VoteReply, NetworkError> {
        self.client(peer).request_vote(request).await
    }

    async fn announce_leader(&self, peer: &str, leader: &str) -> Result<(), NetworkError> {
        ensure_success(self.client(peer).announce_leader(leader).await?)
    }

    async fn append_log(&self, peer: &str, entry: &LogEntry) -> Result<(), NetworkError> {
        ensure_success(self.client(peer).append_log(entry).await?)
    }

    async fn update_replica_list(&self, peer: &str, roster: &[String]) -> Result<(), NetworkError> {
        ensure_success(self.client(peer).update_replica_list(roster).await?)
    }

    async fn register_replica(
        &self,
        leader: &str,
        replica: &str,
    ) -> Result<Vec<String>, NetworkError> {
        let response = self.client(leader).register_replica(replica).await?;
        if ReplyStatus::parse(&response.status) != ReplyStatus::Success {
            return Err(NetworkError::Rejected(response.message));
        }
        Roster::parse_json(&response.replica_addresses_json)
            .map_err(|e| NetworkError::Rejected(format!("Malformed roster: {e}")))
    }

    async fn sync_all_games(&self, leader: &str) -> Result<String, NetworkError> {
        let response = self.client(leader).sync_all_games().await?;
        ensure_status(&response.status, "SyncAllGames")?;
        Ok(response.games_json)
    }

    async fn sync_database(&self, leader: &str) -> Result<Vec<u8>, NetworkError> {
        let response = self.client(leader).sync_database().await?;
        ensure_status(&response.status, "SyncDatabase")?;
        Ok(response.snapshot)
    }

    async fn forward(&self, leader: &str, write: &Forward) -> Result<Reply, NetworkError> {
        let mut client = self.client(leader).forwarded();
        match write {
            Forward::Command(Command::PlayCards {
                game_id,
                username,
                cards,
            }) => client.play_card(username, game_id, cards).await,
            Forward::Command(Command::PassTurn { game_id, username }) => {
                client.pass_turn(username, game_id).await
            }
            Forward::Command(Command::QuitGame { game_id, username }) => {
                client.quit_game(username, game_id).await
            }
            Forward::StartMatch {
                username,
                num_players,
            } => client.start_match(username, *num_players).await,
            Forward::AcceptMatch { username, game_id } => {
                client.accept_match(username, game_id).await
            }
        }
    }
}
