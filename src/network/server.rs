use std::sync::Arc;

use log::{debug, info, warn};
use tonic::{Request, Response, Status};

use crate::game::GameView;
use crate::network::proto::card_game_service_server::CardGameService;
use crate::raft::{Command, LogEntry, Reply, Roster};
use crate::replica::{Origin, Replica};

use super::proto::*;
use super::FORWARDED_HEADER;

/// The gRPC façade. Domain failures travel back as `status: "error"`
/// responses, never as gRPC error statuses.
pub struct CardGameServer {
    replica: Arc<Replica>,
}

impl CardGameServer {
    pub fn new(replica: Arc<Replica>) -> Self {
        Self { replica }
    }
}

fn origin<T>(request: &Request<T>) -> Origin {
    if request.metadata().contains_key(FORWARDED_HEADER) {
        Origin::Forwarded
    } else {
        Origin::Client
    }
}

fn reply(reply: Reply) -> Response<super::proto::Response> {
    Response::new(super::proto::Response {
        status: reply.status.as_str().to_string(),
        message: reply.message,
    })
}

fn cards_from_wire(cards: &[u32]) -> Vec<u8> {
    // Out-of-range ranks become 0, which no hand holds.
    cards.iter().map(|&c| u8::try_from(c).unwrap_or(0)).collect()
}

fn game_state(view: GameView) -> GameStateResponse {
    GameStateResponse {
        status: "success".to_string(),
        message: String::new(),
        current_turn: view.current_turn,
        last_played_cards: view.last_played.iter().map(|&c| u32::from(c)).collect(),
        players: view
            .players
            .into_iter()
            .map(|p| PlayerState {
                username: p.username,
                card_count: p.card_count as u32,
                cards: p.cards.iter().map(|&c| u32::from(c)).collect(),
                win_rate: p.win_rate,
                is_connected: p.is_connected,
                is_current_turn: p.is_current_turn,
            })
            .collect(),
        countdown_seconds: view.countdown_seconds as u32,
        game_over: view.game_over,
        winner: view.winner.unwrap_or_default(),
    }
}

#[tonic::async_trait]
impl CardGameService for CardGameServer {
    async fn login(
        &self,
        request: Request<LoginRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        debug!("Received Login for {}", req.username);
        Ok(reply(self.replica.login(&req.username, &req.password).await))
    }

    async fn logout(
        &self,
        request: Request<LogoutRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        Ok(reply(self.replica.logout(&req.username).await))
    }

    async fn delete_account(
        &self,
        request: Request<DeleteAccountRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        Ok(reply(
            self.replica
                .delete_account(&req.username, &req.password)
                .await,
        ))
    }

    async fn start_match(
        &self,
        request: Request<MatchRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let origin = origin(&request);
        let req = request.into_inner();
        debug!("Received StartMatch: {} for {} players", req.username, req.num_players);
        Ok(reply(
            self.replica
                .start_match(&req.username, req.num_players, origin)
                .await,
        ))
    }

    async fn accept_match(
        &self,
        request: Request<AcceptMatchRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let origin = origin(&request);
        let req = request.into_inner();
        Ok(reply(
            self.replica
                .accept_match(&req.username, &req.game_id, origin)
                .await,
        ))
    }

    async fn play_card(
        &self,
        request: Request<PlayCardRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let origin = origin(&request);
        let req = request.into_inner();
        debug!("Received PlayCard: {} {:?} in {}", req.username, req.cards, req.game_id);

        let command = Command::PlayCards {
            game_id: req.game_id,
            username: req.username,
            cards: cards_from_wire(&req.cards),
        };
        Ok(reply(self.replica.submit(command, origin).await))
    }

    async fn pass_turn(
        &self,
        request: Request<GameActionRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let origin = origin(&request);
        let req = request.into_inner();
        let command = Command::PassTurn {
            game_id: req.game_id,
            username: req.username,
        };
        Ok(reply(self.replica.submit(command, origin).await))
    }

    async fn quit_game(
        &self,
        request: Request<GameActionRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let origin = origin(&request);
        let req = request.into_inner();
        let command = Command::QuitGame {
            game_id: req.game_id,
            username: req.username,
        };
        Ok(reply(self.replica.submit(command, origin).await))
    }

    async fn get_game_state(
        &self,
        request: Request<GameStateRequest>,
    ) -> Result<Response<GameStateResponse>, Status> {
        let req = request.into_inner();
        let response = match self.replica.game_state(&req.game_id, &req.username).await {
            Ok(view) => game_state(view),
            Err(e) => GameStateResponse {
                status: "error".to_string(),
                message: e.to_string(),
                ..Default::default()
            },
        };
        Ok(Response::new(response))
    }

    async fn who_is_leader(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<LeaderInfoResponse>, Status> {
        let (leader, is_leader) = self.replica.who_is_leader().await;
        Ok(Response::new(LeaderInfoResponse {
            leader_address: leader.unwrap_or_default(),
            is_leader,
        }))
    }

    async fn heartbeat(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<super::proto::Response>, Status> {
        Ok(reply(Reply::success("alive")))
    }

    async fn request_vote(
        &self,
        request: Request<VoteRequest>,
    ) -> Result<Response<VoteResponse>, Status> {
        let req = request.into_inner();
        debug!("Received RequestVote: term={}, candidate={}", req.term, req.candidate_id);

        let vote = self
            .replica
            .handle_request_vote(req.term, &req.candidate_id)
            .await;
        Ok(Response::new(VoteResponse {
            term: vote.term,
            vote_granted: vote.vote_granted,
        }))
    }

    async fn announce_leader(
        &self,
        request: Request<CoordinatorMessage>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        self.replica.accept_leader(&req.new_leader_address).await;
        Ok(reply(Reply::success("Leader acknowledged")))
    }

    async fn append_log(
        &self,
        request: Request<super::proto::LogEntry>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        debug!("Received AppendLog: index={}, command={}", req.index, req.command);

        let command = match Command::decode(&req.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("Undecodable entry {}: {e}", req.index);
                return Ok(reply(Reply::error(e.to_string())));
            }
        };
        let entry = LogEntry {
            index: req.index,
            command,
        };

        match self.replica.append_log(entry).await {
            Ok(()) => Ok(reply(Reply::success("Log entry applied"))),
            Err(e) => Ok(reply(Reply::error(e.to_string()))),
        }
    }

    async fn register_replica(
        &self,
        request: Request<RegisterReplicaRequest>,
    ) -> Result<Response<RegisterReplicaResponse>, Status> {
        let req = request.into_inner();
        info!("Received RegisterReplica from {}", req.replica_address);

        let response = match self.replica.register_replica(&req.replica_address).await {
            Ok(roster) => match serde_json::to_string(&roster) {
                Ok(json) => RegisterReplicaResponse {
                    status: "success".to_string(),
                    message: "Replica registered".to_string(),
                    replica_addresses_json: json,
                },
                Err(e) => RegisterReplicaResponse {
                    status: "error".to_string(),
                    message: e.to_string(),
                    replica_addresses_json: String::new(),
                },
            },
            Err(e) => RegisterReplicaResponse {
                status: "error".to_string(),
                message: e.to_string(),
                replica_addresses_json: String::new(),
            },
        };
        Ok(Response::new(response))
    }

    async fn update_replica_list(
        &self,
        request: Request<ReplicaListUpdateRequest>,
    ) -> Result<Response<super::proto::Response>, Status> {
        let req = request.into_inner();
        match Roster::parse_json(&req.replica_addresses_json) {
            Ok(members) => {
                self.replica.update_replica_list(&members).await;
                Ok(reply(Reply::success("Replica list updated")))
            }
            Err(e) => Ok(reply(Reply::error(format!("Malformed roster: {e}")))),
        }
    }

    async fn sync_all_games(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SyncGamesResponse>, Status> {
        let response = match self.replica.sync_all_games().await {
            Ok(games_json) => SyncGamesResponse {
                status: "success".to_string(),
                games_json,
            },
            Err(e) => {
                debug!("SyncAllGames refused: {e}");
                SyncGamesResponse {
                    status: "error".to_string(),
                    games_json: String::new(),
                }
            }
        };
        Ok(Response::new(response))
    }

    async fn sync_database(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<SyncDatabaseResponse>, Status> {
        let response = match self.replica.database_snapshot().await {
            Ok(snapshot) => SyncDatabaseResponse {
                status: "success".to_string(),
                snapshot,
            },
            Err(e) => {
                debug!("SyncDatabase refused: {e}");
                SyncDatabaseResponse {
                    status: "error".to_string(),
                    snapshot: Vec::new(),
                }
            }
        };
        Ok(Response::new(response))
    }
}
