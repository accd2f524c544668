//! Client writes: quorum-gated replication on the leader, fire-and-forget
//! broadcast for quits, forwarding on followers and apply on every node.

use std::sync::Arc;

use log::{debug, info, warn};
use tokio::task::JoinSet;

use super::{Origin, Replica};
use crate::game::Outcome;
use crate::raft::{quorum, Command, Forward, LogEntry, RaftError, Reply};

impl Replica {
    /// Entry point for PlayCard, PassTurn and QuitGame.
    pub async fn submit(&self, command: Command, origin: Origin) -> Reply {
        if !self.is_leader().await {
            return self.forward(Forward::Command(command), origin).await;
        }

        let result = match command {
            Command::QuitGame { .. } => self.broadcast_and_apply(command).await,
            _ => self.replicate_and_apply(command).await,
        };

        match result {
            Ok(outcome) => Reply::success(outcome.message),
            Err(e) => Reply::error(e.to_string()),
        }
    }

    /// Appends `command`, sends it to every replica and applies it only once
    /// a quorum (self included) acknowledged it.
    pub async fn replicate_and_apply(&self, command: Command) -> Result<Outcome, RaftError> {
        // Reject writes for unknown games before they take a log index.
        self.games.get(command.game_id()).await?;

        let _write = self.write_path.lock().await;
        let entry = self.log.lock().await.append(command);
        let replicas = self.roster().await;
        let needed = quorum(replicas.len());

        let acks = 1 + self.fan_out_append(&entry, replicas).await;
        if acks < needed {
            warn!(
                "Entry {} reached {acks}/{needed} replicas, not committing",
                entry.index
            );
            return Err(RaftError::ReplicationFailed {
                index: entry.index,
                acks,
                needed,
            });
        }

        self.log.lock().await.commit(entry.index);
        debug!("Committed entry {} with {acks} acks", entry.index);
        self.apply(&entry.command).await
    }

    /// Applies and commits locally, then replicates in the background without
    /// waiting for acknowledgements. The background task keeps the write path
    /// until every replica was tried, so later entries cannot overtake it.
    pub async fn broadcast_and_apply(&self, command: Command) -> Result<Outcome, RaftError> {
        self.games.get(command.game_id()).await?;

        let write = Arc::clone(&self.write_path).lock_owned().await;
        let entry = self.log.lock().await.append(command);
        let outcome = self.apply(&entry.command).await;
        self.log.lock().await.commit(entry.index);

        let replicas = self.roster().await;
        let peers = Arc::clone(&self.peers);
        tokio::spawn(async move {
            let _write = write;
            for replica in replicas {
                if let Err(e) = peers.append_log(&replica, &entry).await {
                    warn!("Broadcast of entry {} to {replica} failed: {e}", entry.index);
                }
            }
        });

        outcome
    }

    /// Sends `entry` to every replica concurrently and counts the successes.
    async fn fan_out_append(&self, entry: &LogEntry, replicas: Vec<String>) -> usize {
        let mut calls = JoinSet::new();
        for replica in replicas {
            let peers = Arc::clone(&self.peers);
            let entry = entry.clone();
            calls.spawn(async move {
                let result = peers.append_log(&replica, &entry).await;
                (replica, result)
            });
        }

        let mut acks = 0;
        while let Some(joined) = calls.join_next().await {
            match joined {
                Ok((_, Ok(()))) => acks += 1,
                Ok((replica, Err(e))) => {
                    debug!("AppendLog {} to {replica} failed: {e}", entry.index)
                }
                Err(e) => warn!("AppendLog task failed: {e}"),
            }
        }
        acks
    }

    /// Follower side of AppendLog. Entries at or below the commit index are
    /// stored but not applied again.
    pub async fn append_log(&self, entry: LogEntry) -> Result<(), RaftError> {
        let index = entry.index;
        let command = entry.command.clone();

        let _write = self.write_path.lock().await;

        if !self.log.lock().await.append_replicated(entry) {
            debug!("Entry {index} already applied, skipping");
            return Ok(());
        }

        if let Err(e) = self.apply(&command).await {
            debug!("Entry {index} ({}) did not apply: {e}", command.tag());
        }
        Ok(())
    }

    /// Runs `command` against its session. A terminal outcome stops the
    /// session's countdown and records wins and losses.
    async fn apply(&self, command: &Command) -> Result<Outcome, RaftError> {
        let session = self.games.get(command.game_id()).await?;

        let (outcome, losers) = {
            let mut session = session.lock().await;
            let outcome = command.apply_to(&mut session)?;
            let losers: Vec<String> = match outcome.winner.as_deref() {
                Some(winner) => session
                    .players()
                    .iter()
                    .filter(|p| p.as_str() != winner)
                    .cloned()
                    .collect(),
                None => vec![],
            };
            (outcome, losers)
        };

        if let Some(winner) = outcome.winner.as_deref() {
            info!("Game {} over, {winner} won", command.game_id());
            self.games.cancel_countdown(command.game_id()).await;
            if let Err(e) = self.accounts.record_result(winner, &losers).await {
                warn!("Recording result of game {} failed: {e}", command.game_id());
            }
        }

        Ok(outcome)
    }
}
