use clap::{Args, Parser, Subcommand};
use roomlink_cli::{CliError, LogConfig, Result};
use roomlink_client::{
    ClientConfig, ClientOutput, ClientRuntime, CreateRoomRequest, Notification, PeerCommand,
};
use roomlink_core::{protocol_schema, IceServer, PlayerIdentity, RoomId};
use roomlink_directory::DirectoryConfig;
use roomlink_relay::RelayConfig;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "roomlink")]
#[command(version, about = "roomlink - rooms, signaling and matchmaking for peer-to-peer sessions")]
struct Cli {
    #[command(flatten)]
    logging: LoggingArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct LoggingArgs {
    /// Debug logging for the roomlink crates
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true, env = "ROOMLINK_LOG_JSON")]
    log_json: bool,

    /// Serve tokio-console on 127.0.0.1:6669
    #[cfg(feature = "console")]
    #[arg(long, global = true)]
    console: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the signaling relay
    Relay {
        #[arg(long, env = "ROOMLINK_RELAY_ADDR", default_value = "0.0.0.0:3000")]
        addr: SocketAddr,

        /// Interval clients heartbeat at; sessions silent for twice as long are closed
        #[arg(long, env = "ROOMLINK_HEARTBEAT_SECS", default_value_t = 30)]
        heartbeat_secs: u64,

        /// Rooms idle for this long are closed
        #[arg(long, env = "ROOMLINK_ROOM_INACTIVITY_MINS", default_value_t = 60)]
        room_inactivity_mins: u64,

        /// How often idle rooms are swept
        #[arg(long, env = "ROOMLINK_ROOM_SWEEP_MINS", default_value_t = 30)]
        room_sweep_mins: u64,

        /// Mirror rooms into this directory service
        #[arg(long, env = "ROOMLINK_DIRECTORY_URL")]
        directory_url: Option<String>,

        /// TURN server URL (format: turn:host:port)
        #[arg(long, env = "ROOMLINK_TURN_SERVER")]
        turn_server: Option<String>,

        #[arg(long, env = "ROOMLINK_TURN_USERNAME")]
        turn_username: Option<String>,

        #[arg(long, env = "ROOMLINK_TURN_CREDENTIAL")]
        turn_credential: Option<String>,
    },

    /// Run the directory service
    Directory {
        #[arg(long, env = "ROOMLINK_DIRECTORY_ADDR", default_value = "0.0.0.0:3001")]
        addr: SocketAddr,

        #[arg(long, env = "ROOMLINK_DIRECTORY_DB", default_value = "roomlink-directory.db")]
        db: PathBuf,

        /// HS256 secret for session tokens
        #[arg(long, env = "ROOMLINK_JWT_SECRET", hide_env_values = true)]
        jwt_secret: Option<String>,

        #[arg(long, env = "ROOMLINK_TOKEN_TTL_HOURS", default_value_t = 24)]
        token_ttl_hours: u64,

        /// Rooms idle for this long are purged
        #[arg(long, env = "ROOMLINK_RETENTION_HOURS", default_value_t = 24)]
        retention_hours: u64,

        #[arg(long, env = "ROOMLINK_SWEEP_MINS", default_value_t = 60)]
        sweep_mins: u64,
    },

    /// Connect to a relay and log room activity
    Watch {
        #[arg(long, env = "ROOMLINK_RELAY_URL", default_value = "ws://127.0.0.1:3000/ws")]
        relay_url: String,

        /// Token from the directory
        #[arg(long, env = "ROOMLINK_TOKEN", hide_env_values = true)]
        token: String,

        #[arg(short = 'n', long, default_value = "Watcher")]
        name: String,

        /// Join this room
        #[arg(long, conflicts_with = "create")]
        join: Option<String>,

        /// Create a room with this name
        #[arg(long)]
        create: Option<String>,

        #[arg(long)]
        password: Option<String>,
    },

    /// Print the relay protocol JSON schema
    Schema {
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    log_config(&cli.logging).init()?;

    match cli.command {
        Commands::Relay {
            addr,
            heartbeat_secs,
            room_inactivity_mins,
            room_sweep_mins,
            directory_url,
            turn_server,
            turn_username,
            turn_credential,
        } => {
            let mut config = RelayConfig::new(addr)
                .with_heartbeat_interval(Duration::from_secs(heartbeat_secs))
                .with_room_inactivity(Duration::from_secs(room_inactivity_mins * 60))
                .with_room_sweep_interval(Duration::from_secs(room_sweep_mins * 60));
            if let Some(url) = directory_url {
                config = config.with_directory_url(url);
            }
            config = with_turn(config, turn_server, turn_username, turn_credential)?;

            roomlink_relay::server::run(config, shutdown_signal()).await?;
        }
        Commands::Directory {
            addr,
            db,
            jwt_secret,
            token_ttl_hours,
            retention_hours,
            sweep_mins,
        } => {
            let mut config = DirectoryConfig::new(addr, db)
                .with_token_ttl(Duration::from_secs(token_ttl_hours * 3600))
                .with_retention(Duration::from_secs(retention_hours * 3600))
                .with_sweep_interval(Duration::from_secs(sweep_mins * 60));
            if let Some(secret) = jwt_secret {
                config = config.with_jwt_secret(secret);
            }

            roomlink_directory::server::run(config, shutdown_signal()).await?;
        }
        Commands::Watch {
            relay_url,
            token,
            name,
            join,
            create,
            password,
        } => watch(relay_url, token, name, join, create, password).await?,
        Commands::Schema { pretty } => {
            let schema = protocol_schema();
            let text = if pretty {
                serde_json::to_string_pretty(&schema)?
            } else {
                serde_json::to_string(&schema)?
            };
            println!("{}", text);
        }
    }

    Ok(())
}

fn log_config(args: &LoggingArgs) -> LogConfig {
    let mut config = if args.verbose {
        LogConfig::dev()
    } else {
        LogConfig::default()
    };
    if args.log_json {
        config = config.with_json();
    }
    #[cfg(feature = "console")]
    if args.console {
        config = config.with_console();
    }
    config
}

fn with_turn(
    config: RelayConfig,
    turn_server: Option<String>,
    turn_username: Option<String>,
    turn_credential: Option<String>,
) -> Result<RelayConfig> {
    let Some(url) = turn_server else {
        return Ok(config);
    };
    let server = IceServer {
        urls: vec![url.clone()],
        username: turn_username,
        credential: turn_credential,
    };
    if !server.is_turn() {
        return Err(CliError::InvalidConfig(format!(
            "'{}' is not a turn: or turns: URL",
            url
        )));
    }
    if let Some(problem) = server.problem() {
        return Err(CliError::InvalidConfig(problem));
    }
    let (Some(username), Some(credential)) = (server.username, server.credential) else {
        return Err(CliError::InvalidConfig(
            "TURN server requires both username and credential".to_string(),
        ));
    };
    info!("Using TURN server: {}", url);
    Ok(config.with_turn_server(url, username, credential))
}

async fn watch(
    relay_url: String,
    token: String,
    name: String,
    join: Option<String>,
    create: Option<String>,
    password: Option<String>,
) -> Result<()> {
    let identity = PlayerIdentity::new(format!("watch-{}", name.to_lowercase()), name)
        .map_err(|e| CliError::InvalidConfig(e.to_string()))?;
    let (handle, mut outputs, task) =
        ClientRuntime::spawn(ClientConfig::new(relay_url), identity, token);

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            output = outputs.recv() => {
                let Some(output) = output else { break };
                match output {
                    ClientOutput::Notify(Notification::Initialized { session_id }) => {
                        info!(%session_id, "Connected");
                        if let Some(room_id) = &join {
                            handle.join_room(RoomId::from(room_id.as_str()), password.clone())?;
                        } else if let Some(room_name) = &create {
                            let mut request = CreateRoomRequest::new(room_name.clone());
                            request.password = password.clone();
                            handle.create_room(request)?;
                        } else {
                            handle.refresh_rooms()?;
                        }
                    }
                    ClientOutput::Notify(Notification::RoomsUpdated(rooms)) => {
                        info!(count = rooms.len(), "Room list");
                        for room in rooms {
                            info!(
                                room_id = %room.room_id,
                                members = room.member_count,
                                max = room.max_members,
                                status = %room.status,
                                "  {}", room.name
                            );
                        }
                    }
                    ClientOutput::Notify(Notification::Disconnected { terminal: true }) => {
                        warn!("Relay unreachable, giving up");
                    }
                    ClientOutput::Notify(notification) => info!(?notification, "Room event"),
                    // No peer transport here; the links stay in negotiation
                    ClientOutput::Peer(PeerCommand::Prepare { remote_id, initiator }) => {
                        debug!(%remote_id, initiator, "Peer link requested");
                    }
                    ClientOutput::Peer(command) => debug!(?command, "Peer command ignored"),
                }
            }
            _ = &mut shutdown => {
                handle.shutdown()?;
                break;
            }
        }
    }

    task.await??;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
