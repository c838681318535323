//! Multi-room websocket chat server.
//!
//! Runs with in-memory collaborators (message store, room directory, token
//! validator). Rooms and tokens are seeded from the command line.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 \
//!     --seed-room 6f1c1f0e-8f0b-4c57-9d0a-0d5c1b7c2a11 \
//!     --seed-token alice-token=0b7e5c39-3a3e-4b7b-8a59-4d0f7f2b8d10
//! ```

use std::{str::FromStr, sync::Arc, time::Duration};

use clap::Parser;
use hiroba_server::{
    domain::{RoomId, RoomRegistry, UserId},
    infrastructure::{
        connection::OutboundConfig,
        repository::{InMemoryMessageStore, InMemoryRoomDirectory, InMemoryTokenValidator},
    },
    ui::{AppState, Server, ServerConfig},
    usecase::{
        AuthenticateUseCase, ConnectParticipantUseCase, DisconnectParticipantUseCase,
        GetMessagesUseCase, ListActiveRoomsUseCase, SendMessageUseCase,
    },
};
use hiroba_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Multi-room websocket chat server", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, env = "HIROBA_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, env = "HIROBA_PORT", default_value = "8080")]
    port: u16,

    /// Maximum number of pending outbound events per connection
    #[arg(long, env = "HIROBA_OUTBOUND_CAPACITY", default_value = "128")]
    outbound_capacity: usize,

    /// Send a ping when nothing was written to a connection for this many seconds
    #[arg(long, env = "HIROBA_PING_INTERVAL_SECS", default_value = "30")]
    ping_interval_secs: u64,

    /// Drop a connection that sent nothing for this many seconds
    #[arg(long, env = "HIROBA_PONG_WAIT_SECS", default_value = "60")]
    pong_wait_secs: u64,

    /// Deadline of one message store / room directory / auth call
    #[arg(long, env = "HIROBA_STORE_TIMEOUT_SECS", default_value = "5")]
    store_timeout_secs: u64,

    /// Room known to the room directory at startup (repeatable)
    #[arg(long = "seed-room", env = "HIROBA_SEED_ROOMS", value_delimiter = ',')]
    seed_rooms: Vec<RoomId>,

    /// Token accepted at startup, as `TOKEN=USER_UUID` (repeatable)
    #[arg(
        long = "seed-token",
        env = "HIROBA_SEED_TOKENS",
        value_delimiter = ',',
        value_parser = parse_seed_token
    )]
    seed_tokens: Vec<(String, UserId)>,

    /// Default log level when RUST_LOG is not set
    #[arg(long, env = "HIROBA_LOG_LEVEL", default_value = "debug")]
    log_level: String,
}

fn parse_seed_token(raw: &str) -> Result<(String, UserId), String> {
    let (token, user) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected TOKEN=USER_UUID, got '{}'", raw))?;
    if token.trim().is_empty() {
        return Err("token must not be empty".to_string());
    }
    let user_id = UserId::from_str(user).map_err(|e| e.to_string())?;
    Ok((token.to_string(), user_id))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Initialize dependencies in order:
    // 1. Collaborators (in-memory)
    // 2. Room Registry
    // 3. UseCases
    // 4. AppState
    // 5. Server

    // 1. Collaborators
    let mut seed_rooms = args.seed_rooms;
    if seed_rooms.is_empty() {
        seed_rooms.push(RoomId::generate());
    }
    for room_id in &seed_rooms {
        tracing::info!("Room {} available", room_id);
    }
    let room_directory = Arc::new(InMemoryRoomDirectory::with_rooms(seed_rooms));

    let token_validator = Arc::new(InMemoryTokenValidator::new());
    let mut seed_tokens = args.seed_tokens;
    if seed_tokens.is_empty() {
        let user_id = UserId::generate();
        seed_tokens.push((format!("demo-{}", user_id), user_id));
    }
    for (token, user_id) in seed_tokens {
        tracing::info!("Token '{}' issued for user {}", token, user_id);
        token_validator
            .insert(token, user_id, vec!["chat".to_string()])
            .await;
    }

    let message_store = Arc::new(InMemoryMessageStore::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let store_timeout = Duration::from_secs(args.store_timeout_secs);

    // 2. Room Registry
    let registry = Arc::new(RoomRegistry::new());

    // 3. UseCases
    let authenticate_usecase = Arc::new(AuthenticateUseCase::new(
        token_validator.clone(),
        store_timeout,
    ));
    let connect_participant_usecase = Arc::new(ConnectParticipantUseCase::new(
        registry.clone(),
        room_directory.clone(),
        message_store.clone(),
        clock.clone(),
        store_timeout,
    ));
    let disconnect_participant_usecase = Arc::new(DisconnectParticipantUseCase::new(
        registry.clone(),
        message_store.clone(),
        clock.clone(),
        store_timeout,
    ));
    let send_message_usecase = Arc::new(SendMessageUseCase::new(
        registry.clone(),
        message_store.clone(),
        clock.clone(),
        store_timeout,
    ));
    let get_messages_usecase = Arc::new(GetMessagesUseCase::new(
        message_store.clone(),
        store_timeout,
    ));
    let list_active_rooms_usecase = Arc::new(ListActiveRoomsUseCase::new(registry.clone()));

    // 4. AppState
    let state = AppState {
        authenticate_usecase,
        connect_participant_usecase,
        disconnect_participant_usecase,
        send_message_usecase,
        get_messages_usecase,
        list_active_rooms_usecase,
        outbound_config: OutboundConfig {
            queue_capacity: args.outbound_capacity,
            ping_interval: Duration::from_secs(args.ping_interval_secs),
            pong_wait: Duration::from_secs(args.pong_wait_secs),
            ..OutboundConfig::default()
        },
    };

    // 5. Create and run the server
    let server = Server::new(
        state,
        ServerConfig {
            host: args.host,
            port: args.port,
        },
    );
    if let Err(e) = server.run().await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
