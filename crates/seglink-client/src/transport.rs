//! WebSocket transport.
//!
//! A connection runs three tasks:
//!
//! - **read loop**: turns socket frames into [`ConnectionEvent`]s
//! - **event loop**: applies events to the state in arrival order
//! - **write loop**: drains outbound frames into the socket
//!
//! All three stop when the handle is closed or dropped.
//!
//! There is no reconnection. Once the socket errors or closes the client
//! stays disconnected until `connect` is called again.

use crate::ack::settle_echoes;
use crate::dispatch::Dispatcher;
use crate::error::{ClientError, ClientResult};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use seglink_core::Request;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

/// How long `close` waits for the peer to finish the close handshake.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Raw socket events, processed one at a time.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Opened,
    Frame(String),
    /// A frame arrived that cannot be read as text.
    Rejected(String),
    Error(String),
    Closed,
}

/// Notifications for application code.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected { address: String },
    /// An inbound frame could not be merged. The connection is unaffected.
    FrameRejected { error: String },
    /// Requests the server acknowledged in one frame.
    Acknowledged { ids: Vec<String> },
    Error { message: String },
    Disconnected,
}

/// Cloneable handle on the outbound half of a connection.
#[derive(Clone, Debug)]
pub struct FrameWriter {
    tx: mpsc::UnboundedSender<Message>,
}

impl FrameWriter {
    pub(crate) fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    pub fn send_text(&self, text: String) -> ClientResult<()> {
        self.tx
            .send(Message::Text(text.into()))
            .map_err(|_| ClientError::Closed)
    }

    fn send_close(&self) -> bool {
        self.tx.send(Message::Close(None)).is_ok()
    }

    /// True once the write loop has stopped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

struct ConnectionTasks {
    write: JoinHandle<()>,
    read: JoinHandle<()>,
    event: JoinHandle<()>,
}

/// An open connection.
///
/// Dropping the handle without calling [`close`](Self::close) still shuts the
/// socket: the tasks stop, no further frames are merged and the state is
/// marked disconnected.
pub struct ConnectionHandle {
    address: String,
    generation: u64,
    writer: FrameWriter,
    dispatcher: Dispatcher,
    shutdown: CancellationToken,
    tasks: Option<ConnectionTasks>,
}

impl ConnectionHandle {
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn writer(&self) -> &FrameWriter {
        &self.writer
    }

    /// Send a close frame and wait briefly for the socket to wind down.
    pub async fn close(mut self) {
        if self.writer.send_close() {
            tracing::debug!("Closing connection to {}", self.address);
        }

        if let Some(tasks) = self.tasks.take() {
            let ConnectionTasks { write, read, event } = tasks;
            let wind_down = async {
                let _ = write.await;
                let _ = event.await;
            };
            if tokio::time::timeout(CLOSE_TIMEOUT, wind_down).await.is_err() {
                tracing::debug!("Peer did not finish close handshake, dropping socket");
            }
            read.abort();
        }

        tracing::info!("Disconnected from {}", self.address);
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        if self.tasks.take().is_some() {
            tracing::debug!("Connection to {} dropped without close", self.address);
        }
        // The write loop sends the close frame on its way out.
        self.shutdown.cancel();
        self.dispatcher.store().close_connection(self.generation);
    }
}

/// Close the connection if there is one.
pub async fn disconnect(handle: Option<ConnectionHandle>) {
    if let Some(handle) = handle {
        handle.close().await;
    }
}

/// Open a WebSocket to `address` and start the connection tasks.
///
/// On success the state is marked connected and a `ping` has been dispatched
/// before this returns.
pub async fn connect(
    address: &str,
    dispatcher: Dispatcher,
    events: broadcast::Sender<ClientEvent>,
) -> ClientResult<ConnectionHandle> {
    let (ws, _response) = tokio_tungstenite::connect_async(address)
        .await
        .map_err(|e| {
            tracing::error!("Websocket failed to connect to {}: {}", address, e);
            let _ = events.send(ClientEvent::Error {
                message: e.to_string(),
            });
            ClientError::Transport(e)
        })?;
    let (sink, stream) = ws.split();
    let shutdown = CancellationToken::new();

    let (write_tx, write_rx) = mpsc::unbounded_channel();
    let writer = FrameWriter::new(write_tx);
    let write = tokio::spawn(run_write_loop(sink, write_rx, shutdown.clone()));

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let read = tokio::spawn(run_read_loop(stream, event_tx, shutdown.clone()));

    let generation = dispatcher.store().open_connection(address);
    let events_loop = EventLoop {
        address: address.to_string(),
        generation,
        dispatcher: dispatcher.clone(),
        writer: writer.clone(),
        events,
    };
    events_loop.handle(ConnectionEvent::Opened);
    let event = tokio::spawn(events_loop.run(event_rx, shutdown.clone()));

    Ok(ConnectionHandle {
        address: address.to_string(),
        generation,
        writer,
        dispatcher,
        shutdown,
        tasks: Some(ConnectionTasks { write, read, event }),
    })
}

struct EventLoop {
    address: String,
    generation: u64,
    dispatcher: Dispatcher,
    writer: FrameWriter,
    events: broadcast::Sender<ClientEvent>,
}

impl EventLoop {
    async fn run(
        self,
        mut rx: mpsc::UnboundedReceiver<ConnectionEvent>,
        shutdown: CancellationToken,
    ) {
        loop {
            let event = tokio::select! {
                biased;
                _ = shutdown.cancelled() => ConnectionEvent::Closed,
                event = rx.recv() => match event {
                    Some(event) => event,
                    None => ConnectionEvent::Closed,
                },
            };
            let closed = event == ConnectionEvent::Closed;
            self.handle(event);
            if closed {
                break;
            }
        }
    }

    fn handle(&self, event: ConnectionEvent) {
        let store = self.dispatcher.store();
        match event {
            // The store was marked connected when the generation was taken.
            ConnectionEvent::Opened => {
                tracing::info!("Websocket successfully connected to {}", self.address);
                self.publish(ClientEvent::Connected {
                    address: self.address.clone(),
                });
                if let Err(e) = self.dispatcher.send(&self.writer, Request::ping()) {
                    tracing::error!("Failed to send handshake ping: {}", e);
                }
            }
            ConnectionEvent::Frame(text) => {
                let acks = self.dispatcher.acks();
                match store.apply_frame(&text, |state, snapshot| {
                    settle_echoes(state, snapshot, acks)
                }) {
                    Ok(ids) if !ids.is_empty() => {
                        self.publish(ClientEvent::Acknowledged { ids });
                    }
                    Ok(_) => {}
                    Err(e) => self.reject(e.to_string()),
                }
            }
            ConnectionEvent::Rejected(error) => self.reject(error),
            ConnectionEvent::Error(message) => {
                tracing::warn!("Websocket error: {}", message);
                store.close_connection(self.generation);
                self.publish(ClientEvent::Error { message });
            }
            ConnectionEvent::Closed => {
                if store.close_connection(self.generation) {
                    tracing::info!("Websocket closed: {}", self.address);
                    self.publish(ClientEvent::Disconnected);
                } else {
                    tracing::debug!("Superseded connection to {} closed", self.address);
                }
            }
        }
    }

    fn reject(&self, error: String) {
        tracing::warn!("Dropping inbound frame: {}", error);
        self.publish(ClientEvent::FrameRejected { error });
    }

    fn publish(&self, event: ClientEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

async fn run_read_loop(
    mut stream: SplitStream<WsStream>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    shutdown: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return,
            msg = stream.next() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let event = match msg {
            Ok(Message::Text(text)) => ConnectionEvent::Frame(text.as_str().to_owned()),
            Ok(Message::Binary(data)) => match String::from_utf8(data.to_vec()) {
                Ok(text) => ConnectionEvent::Frame(text),
                Err(e) => ConnectionEvent::Rejected(format!("binary frame is not UTF-8: {e}")),
            },
            Ok(Message::Close(frame)) => {
                tracing::debug!("Peer sent close: {:?}", frame);
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                let _ = events.send(ConnectionEvent::Error(e.to_string()));
                break;
            }
        };
        if events.send(event).is_err() {
            return;
        }
    }
    let _ = events.send(ConnectionEvent::Closed);
}

async fn run_write_loop(
    mut sink: SplitSink<WsStream, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
    shutdown: CancellationToken,
) {
    loop {
        let msg = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let closing = matches!(msg, Message::Close(_));
        if let Err(e) = sink.send(msg).await {
            tracing::debug!("Write failed: {}", e);
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
}
