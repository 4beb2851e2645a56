//! Connects, optionally sends one request, and prints every state change.

use anyhow::Context;
use clap::Parser;
use seglink_client::{Client, ClientConfig, disconnect};
use seglink_core::{ConnectionState, CookieJar, Request, SESSION_COOKIE};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "seglink-watch", about = "Mirror a seglink server's state")]
struct Args {
    /// TOML config file.
    #[arg(long, env = "SEGLINK_CONFIG")]
    config: Option<PathBuf>,
    /// WebSocket URL, overrides the config file.
    #[arg(long, env = "SEGLINK_ADDRESS")]
    address: Option<String>,
    /// Session token.
    #[arg(long, env = "SEGLINK_SESSION")]
    session: Option<String>,
    /// Raw cookie header, e.g. "sessionid=abc; theme=dark".
    #[arg(long, conflicts_with = "session")]
    cookie: Option<String>,
    /// Category of a request to send after connecting.
    #[arg(long)]
    send: Option<String>,
    /// JSON payload for --send.
    #[arg(long, requires = "send", default_value = "{}")]
    payload: String,
    /// Exit after the request is confirmed instead of watching.
    #[arg(long, requires = "send")]
    once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("seglink_watch=info".parse()?)
                .add_directive("seglink_client=info".parse()?),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if let Some(address) = args.address {
        config = config.with_address(address);
    }

    let jar = match (args.cookie, args.session) {
        (Some(header), _) => CookieJar::parse(&header),
        (None, Some(token)) => CookieJar::with_session(token),
        (None, None) => {
            tracing::warn!("No session given, requests will carry an empty {}", SESSION_COOKIE);
            CookieJar::new()
        }
    };

    let client = Client::new(config, jar);
    let conn = client.connect().await?;

    if let Some(category) = args.send {
        let payload = serde_json::from_str(&args.payload).context("--payload is not valid JSON")?;
        let dispatch = client.send(&conn, Request::new(category, payload))?;
        match dispatch.confirmed().await {
            Ok(ack) => match ack.response {
                Some(r) => tracing::info!("{} -> {} {}", ack.id, r.status_code, r.message),
                None => tracing::info!("{} confirmed", ack.id),
            },
            Err(e) => tracing::error!("Request failed: {}", e),
        }
        if args.once {
            disconnect(Some(conn)).await;
            return Ok(());
        }
    }

    let mut updates = client.subscribe();
    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = updates.borrow_and_update().clone();
                println!("{}", serde_json::to_string_pretty(&state)?);
                if state.connection_state() == ConnectionState::Disconnected {
                    tracing::info!("Connection lost");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                break;
            }
        }
    }

    disconnect(Some(conn)).await;
    Ok(())
}
