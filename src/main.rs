use std::fs::OpenOptions;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use log::{info, warn};

use deckraft::config::NodeConfig;
use deckraft::network::proto::card_game_service_server::CardGameServiceServer;
use deckraft::network::{CardGameServer, GameClient, GrpcPeers, HeartbeatMonitor};
use deckraft::replica::Replica;
use deckraft::storage::AccountStore;

fn init_logging() {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    if let Ok(path) = std::env::var("DECKRAFT_LOG_FILE") {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
            Err(e) => eprintln!("Cannot open log file {path}: {e}, logging to stderr"),
        }
    }

    builder.init();
}

#[derive(Parser)]
#[command(name = "deckraft")]
#[command(about = "A replicated turn-based card game server built from scratch in Rust")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one replica of the game cluster
    Node {
        /// JSON config file; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Address to listen on
        #[arg(short, long)]
        listen: Option<String>,

        /// Address other nodes use to reach this one (defaults to --listen)
        #[arg(long)]
        advertise: Option<String>,

        /// Start as the cluster leader
        #[arg(long)]
        leader: bool,

        /// Address of the current leader, for followers
        #[arg(long)]
        leader_address: Option<String>,

        /// Comma-separated list of replica addresses
        #[arg(short, long)]
        replicas: Option<String>,

        /// Directory to store account data
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Milliseconds between heartbeats
        #[arg(long)]
        heartbeat_ms: Option<u64>,

        /// Milliseconds before a peer RPC counts as failed
        #[arg(long)]
        rpc_timeout_ms: Option<u64>,

        /// Seconds a player has to act before the turn is passed for them
        #[arg(long)]
        turn_seconds: Option<u64>,
    },

    /// Ask a set of nodes who the leader is
    Leader {
        /// Comma-separated list of node addresses
        #[arg(short, long)]
        nodes: String,

        /// Milliseconds to wait for each node
        #[arg(long, default_value_t = 1000)]
        timeout_ms: u64,
    },
}

fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keeps one account file per node when several nodes share a data dir.
fn node_data_dir(config: &NodeConfig) -> PathBuf {
    let node = config
        .listen_address
        .rsplit(':')
        .next()
        .unwrap_or(&config.listen_address)
        .to_string();
    config.data_dir.join(format!("node-{node}"))
}

async fn run_node(config: NodeConfig) -> anyhow::Result<()> {
    let addr = config
        .listen_address
        .parse::<SocketAddr>()
        .with_context(|| format!("invalid listen address {}", config.listen_address))?;

    let data_dir = node_data_dir(&config);
    let accounts = AccountStore::open(&data_dir)
        .with_context(|| format!("cannot open account store in {}", data_dir.display()))?;
    info!("Account store at {}", data_dir.display());

    let peers = Arc::new(GrpcPeers::new(config.rpc_timeout()));
    let replica = Replica::new(&config, accounts, peers);

    if config.is_leader {
        info!("Starting {} as leader", replica.address());
    } else {
        info!(
            "Starting {} as follower of {}",
            replica.address(),
            config.leader_address.as_deref().unwrap_or("<unknown>")
        );
        let bootstrapping = Arc::clone(&replica);
        tokio::spawn(async move {
            if let Err(e) = bootstrapping.bootstrap().await {
                warn!("Bootstrap from leader failed, the heartbeat will retry: {e}");
            }
        });
    }

    let monitor = HeartbeatMonitor::new(Arc::clone(&replica), config.heartbeat_interval());
    tokio::spawn(monitor.run());

    info!("gRPC server listening on {addr}");
    tonic::transport::Server::builder()
        .add_service(CardGameServiceServer::new(CardGameServer::new(replica)))
        .serve(addr)
        .await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let cli = Cli::parse();

    match cli.command {
        Command::Node {
            config,
            listen,
            advertise,
            leader,
            leader_address,
            replicas,
            data_dir,
            heartbeat_ms,
            rpc_timeout_ms,
            turn_seconds,
        } => {
            let mut cfg = match config {
                Some(path) => NodeConfig::load(&path)
                    .with_context(|| format!("cannot load config {}", path.display()))?,
                None => NodeConfig::default(),
            };

            if let Some(listen) = listen {
                cfg.listen_address = listen;
            }
            if let Some(advertise) = advertise {
                cfg.advertise_address = advertise;
            }
            if leader {
                cfg.is_leader = true;
            }
            if leader_address.is_some() {
                cfg.leader_address = leader_address;
            }
            if let Some(replicas) = replicas {
                cfg.replicas = split_list(&replicas);
            }
            if let Some(data_dir) = data_dir {
                cfg.data_dir = data_dir;
            }
            if let Some(ms) = heartbeat_ms {
                cfg.heartbeat_interval_ms = ms;
            }
            if let Some(ms) = rpc_timeout_ms {
                cfg.rpc_timeout_ms = ms;
            }
            if let Some(secs) = turn_seconds {
                cfg.turn_seconds = secs;
            }

            run_node(cfg).await?;
        }
        Command::Leader { nodes, timeout_ms } => {
            let candidates = split_list(&nodes);
            let leader =
                GameClient::locate_leader(&candidates, Duration::from_millis(timeout_ms)).await?;
            println!("{leader}");
        }
    }

    Ok(())
}
