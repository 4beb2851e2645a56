//! Broadcast server for trying the seglink client by hand.
//!
//! Answers every request with an `activity` acknowledgment and pushes the
//! whole broadcast structure to all clients on an interval.
//!
//!   cargo run -p seglink-demo-broadcast --bin seglink-broadcaster -- --port 8000
//!   cargo run -p seglink-demo-broadcast --bin seglink-watch -- --address ws://127.0.0.1:8000 --session abc

mod protocol;
mod server;

use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seglink-broadcaster", about = "Demo broadcast server")]
struct Args {
    #[arg(long, default_value_t = 8000)]
    port: u16,
    /// Milliseconds between full snapshots.
    #[arg(long, default_value_t = 5000)]
    interval_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("seglink_broadcaster=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let addr: SocketAddr = ([127, 0, 0, 1], args.port).into();

    tracing::info!("Starting broadcaster on {}", addr);

    server::run(addr, Duration::from_millis(args.interval_ms.max(1))).await
}
