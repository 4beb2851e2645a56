//! Broadcast server implementation.

use crate::protocol::{Broadcast, make_activity};
use futures_util::{SinkExt, StreamExt};
use seglink_core::OutboundMessage;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{RwLock, broadcast};
use tokio_tungstenite::tungstenite::Message;

type SharedBroadcast = Arc<RwLock<Broadcast>>;

pub async fn run(addr: SocketAddr, interval: Duration) -> anyhow::Result<()> {
    let state = Arc::new(RwLock::new(Broadcast::new()));
    let (broadcast_tx, _) = broadcast::channel::<String>(100);

    // Periodic full snapshot, carrying a heartbeat so clients see change
    let tick_state = state.clone();
    let tick_tx = broadcast_tx.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let mut s = tick_state.write().await;
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or_default();
            if let Err(e) = s.system_broadcast("system", "clock", "now", now.into()) {
                tracing::warn!("Heartbeat rejected: {}", e);
            }
            let _ = tick_tx.send(s.snapshot().to_string());
        }
    });

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on ws://{}", addr);

    loop {
        let (stream, client_addr) = listener.accept().await?;
        let state = state.clone();
        let broadcast_tx = broadcast_tx.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, client_addr, state, broadcast_tx).await {
                tracing::warn!("Connection error from {}: {}", client_addr, e);
            }
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    state: SharedBroadcast,
    broadcast_tx: broadcast::Sender<String>,
) -> anyhow::Result<()> {
    let ws = tokio_tungstenite::accept_async(stream).await?;
    let (mut sink, mut stream) = ws.split();

    tracing::debug!("New connection from {}", addr);

    // Initial snapshot
    {
        let s = state.read().await;
        sink.send(Message::Text(s.snapshot().to_string().into()))
            .await?;
    }

    let mut broadcast_rx = broadcast_tx.subscribe();

    loop {
        tokio::select! {
            msg = stream.next() => {
                let msg = match msg {
                    Some(Ok(msg)) => msg,
                    Some(Err(e)) => {
                        tracing::debug!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                };

                if let Message::Text(text) = msg {
                    let request: OutboundMessage = match serde_json::from_str(text.as_str()) {
                        Ok(r) => r,
                        Err(e) => {
                            tracing::warn!("Invalid request: {}", e);
                            continue;
                        }
                    };

                    let (ack, snapshot) = {
                        let mut s = state.write().await;
                        let response = s.handle(&request);
                        tracing::info!(
                            "{}:{} -> {} {}",
                            request.id,
                            request.category,
                            response.status_code,
                            response.message
                        );
                        (make_activity(&request.id, &response), s.snapshot().to_string())
                    };

                    // Acknowledge to the sender, then let everyone see the change
                    sink.send(Message::Text(ack.to_string().into())).await?;
                    let _ = broadcast_tx.send(snapshot);
                }
            }

            msg = broadcast_rx.recv() => {
                if let Ok(msg) = msg {
                    sink.send(Message::Text(msg.into())).await?;
                }
            }
        }
    }

    tracing::debug!("Connection closed: {}", addr);
    Ok(())
}
