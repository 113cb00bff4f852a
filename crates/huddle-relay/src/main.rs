//! huddle-relay: per-room signaling relay for Huddle voice and
//! collaboration rooms.
//!
//! Clients connect to `/voice/{room}` or `/collaboration/{room}` and send
//! `join`. The relay keeps the roster, forwards peer-to-peer negotiation to
//! its target with the sender stamped, and fans everything else out to the
//! rest of the room. Payloads are otherwise passed through unchanged.

mod connection;
mod protocol;
mod rooms;

use std::path::PathBuf;

use clap::Parser;
use huddle_config::schema::RelayConfig;
use huddle_config::HuddleConfig;
use tokio::net::TcpListener;

use crate::connection::serve;
use crate::rooms::RoomRegistry;

#[derive(Parser)]
#[command(name = "huddle-relay", about = "Signaling relay for Huddle rooms")]
struct Args {
    /// Address to bind.
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on. Overrides `[relay] port`.
    #[arg(short, long)]
    port: Option<u16>,

    /// Maximum members per room. Overrides `[relay] max_participants`.
    #[arg(long)]
    max_participants: Option<usize>,

    /// Config file to read the `[relay]` and `[logging]` sections from.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    fn resolve(&self, relay: &RelayConfig) -> (u16, usize) {
        let port = self
            .port
            .or_else(|| u16::try_from(relay.port).ok())
            .unwrap_or(3000);
        let max = self
            .max_participants
            .unwrap_or(relay.max_participants as usize);
        (port, max)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => huddle_config::load_from_path(path)?,
        None => HuddleConfig::default(),
    };

    let fallback = format!("huddle_relay={}", config.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| fallback.into()),
        )
        .init();

    let (port, max_participants) = args.resolve(&config.relay);
    let registry = RoomRegistry::new(max_participants);

    let addr = format!("{}:{}", args.host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(max_participants, "huddle-relay listening on {}", addr);

    serve(listener, registry).await;
    Ok(())
}
