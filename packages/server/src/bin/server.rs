//! Multiplayer session coordinator server.
//!
//! Clients connect over WebSocket, join rooms, and play matches from a shared playlist.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin hiroba-server
//! cargo run --bin hiroba-server -- --host 0.0.0.0 --port 3000 --seed demos/seed.json
//! ```

use std::{path::PathBuf, sync::Arc};

use clap::{Parser, ValueEnum};
use hiroba_server::{
    domain::{HostFallback, Timestamp},
    infrastructure::{
        database::{InMemoryMultiplayerDatabase, Seed},
        message_pusher::WebSocketMessagePusher,
    },
    ui::Server,
    usecase::{HubOptions, MultiplayerHub},
};
use hiroba_shared::{
    logger::setup_logger,
    time::{Clock, SystemClock},
};

/// Who becomes host when the host leaves
#[derive(Debug, Clone, Copy, ValueEnum)]
enum HostFallbackArg {
    /// The remaining member who joined first
    Earliest,
    /// The remaining member who joined last
    Latest,
}

impl From<HostFallbackArg> for HostFallback {
    fn from(arg: HostFallbackArg) -> Self {
        match arg {
            HostFallbackArg::Earliest => HostFallback::EarliestJoined,
            HostFallbackArg::Latest => HostFallback::LatestJoined,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "hiroba-server")]
#[command(about = "Multiplayer session coordinator over WebSocket", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Default log level (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// JSON seed for the in-memory store (rooms, playlists, beatmap catalog)
    #[arg(long)]
    seed: Option<PathBuf>,

    /// Who becomes host when the host leaves
    #[arg(long, value_enum, default_value = "earliest")]
    host_fallback: HostFallbackArg,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &args.log_level);

    // Initialize dependencies in order:
    // 1. Database
    // 2. MessagePusher
    // 3. MultiplayerHub
    // 4. Server

    // 1. Create the in-memory database from the seed
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let seed = match &args.seed {
        Some(path) => match Seed::load(path) {
            Ok(seed) => seed,
            Err(e) => {
                tracing::error!("{}", e);
                std::process::exit(1);
            }
        },
        None => {
            tracing::warn!("No seed given, starting with an empty store");
            Seed::default()
        }
    };
    let database =
        match InMemoryMultiplayerDatabase::from_seed(&seed, Timestamp::new(clock.now_millis())) {
            Ok(database) => Arc::new(database),
            Err(e) => {
                tracing::error!("Invalid seed: {}", e);
                std::process::exit(1);
            }
        };

    // 2. Create MessagePusher (WebSocket implementation)
    let message_pusher = Arc::new(WebSocketMessagePusher::new());

    // 3. Create the hub
    let options = HubOptions {
        host_fallback: args.host_fallback.into(),
    };
    let hub = Arc::new(MultiplayerHub::new(database, message_pusher, clock, options));

    // 4. Create and run the server
    let server = Server::new(hub);
    if let Err(e) = server.run(args.host, args.port).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
