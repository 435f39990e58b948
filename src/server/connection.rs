//! WebSocket connection handling
//!
//! Each accepted socket gets a read loop (this task) and a write task. The
//! write task owns the sink and drains a bounded queue, so fan-out never
//! waits on a slow peer: when the queue is full, `send` fails instead.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitStream;
use futures::{Sink, SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Notify;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::broker::Broker;
use crate::client::{CloseOutcome, ConnectionHandle, SendError};
use crate::registry::Payload;

use super::config::ServerConfig;
use super::route::{Handshake, Route};

type WsSource = SplitStream<WebSocketStream<TcpStream>>;

/// Upper bound on sending the final close frame
pub const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection handle backed by a WebSocket write task
pub struct WsConnection {
    key: Option<String>,
    remote_addr: SocketAddr,
    tx: mpsc::Sender<Payload>,
    closed: AtomicBool,
    close_signal: Notify,
}

impl WsConnection {
    /// Create a handle and the queue its write task drains
    pub fn new(
        key: Option<String>,
        remote_addr: SocketAddr,
        buffer: usize,
    ) -> (Arc<Self>, mpsc::Receiver<Payload>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));

        let connection = Arc::new(Self {
            key,
            remote_addr,
            tx,
            closed: AtomicBool::new(false),
            close_signal: Notify::new(),
        });

        (connection, rx)
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl ConnectionHandle for WsConnection {
    fn identity(&self) -> Option<&str> {
        self.key.as_deref()
    }

    fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    fn send(&self, payload: Payload) -> Result<(), SendError> {
        if self.is_closed() {
            return Err(SendError::Closed);
        }

        self.tx.try_send(payload).map_err(|e| match e {
            TrySendError::Full(_) => SendError::Full,
            TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close(&self) -> CloseOutcome {
        if self.closed.swap(true, Ordering::AcqRel) {
            return CloseOutcome::AlreadyClosed;
        }

        // stores a permit if the write task is busy
        self.close_signal.notify_one();
        CloseOutcome::Closed
    }
}

fn into_message(payload: Payload) -> Message {
    match payload {
        Payload::Text(text) => Message::text(&*text),
        Payload::Binary(data) => Message::Binary(data),
    }
}

fn into_payload(message: Message) -> Option<Payload> {
    match message {
        Message::Text(text) => Some(Payload::text(text.as_str())),
        Message::Binary(data) => Some(Payload::Binary(data)),
        _ => None,
    }
}

/// Drain queued payloads into the socket until the handle is closed
///
/// Anything queued before `close` is still written, then a close frame. A
/// write stalled on a peer that stopped reading is abandoned on `close`, and
/// the close frame gets at most [`CLOSE_TIMEOUT`].
async fn write_loop<S>(connection: Arc<WsConnection>, mut rx: mpsc::Receiver<Payload>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: std::fmt::Display,
{
    loop {
        tokio::select! {
            biased;
            next = rx.recv() => match next {
                Some(payload) => {
                    tokio::select! {
                        biased;
                        result = sink.send(into_message(payload)) => {
                            if let Err(e) = result {
                                tracing::debug!(remote = %connection.remote_addr, error = %e, "Write failed");
                                break;
                            }
                        }
                        _ = connection.close_signal.notified() => {
                            tracing::debug!(remote = %connection.remote_addr, "Write abandoned on close");
                            break;
                        }
                    }
                }
                None => break,
            },
            _ = connection.close_signal.notified() => break,
        }
    }

    // later sends fail fast once the writer is gone
    connection.close();

    match tokio::time::timeout(CLOSE_TIMEOUT, sink.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::trace!(remote = %connection.remote_addr, error = %e, "Close frame not sent"),
        Err(_) => tracing::debug!(remote = %connection.remote_addr, "Close frame timed out"),
    }
}

/// Serve one accepted TCP connection
pub(crate) async fn handle_connection(
    socket: TcpStream,
    peer_addr: SocketAddr,
    broker: Arc<Broker>,
    config: Arc<ServerConfig>,
) {
    let mut accepted = None;
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        accepted = Some(Handshake::inspect(request, &config.allow_origin)?);
        Ok(response)
    };

    let stream = match tokio_tungstenite::accept_hdr_async(socket, callback).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::debug!(peer = %peer_addr, error = %e, "WebSocket handshake failed");
            return;
        }
    };

    let Some(handshake) = accepted else {
        return;
    };

    let (sink, mut source) = stream.split();
    let (connection, rx) = WsConnection::new(handshake.key, peer_addr, config.outbound_buffer);
    let mut writer = tokio::spawn(write_loop(Arc::clone(&connection), rx, sink));

    let route = handshake.route;
    let session = async {
        match route {
            Route::Channel(name) => channel_loop(&connection, &mut source, &broker, &name).await,
            Route::Echo => echo_loop(&connection, &mut source).await,
        }
    };

    // the writer only finishes first once the connection is closed or broken;
    // the read half is dropped with the session then
    let writer_first = tokio::select! {
        _ = session => None,
        result = &mut writer => Some(result),
    };
    let written = match writer_first {
        Some(result) => result,
        None => writer.await,
    };
    if let Err(e) = written {
        tracing::debug!(peer = %peer_addr, error = %e, "Write task failed");
    }

    broker.detach(&*connection).await;
}

async fn channel_loop(connection: &Arc<WsConnection>, source: &mut WsSource, broker: &Broker, name: &str) {
    let handle: Arc<dyn ConnectionHandle> = connection.clone();

    let client = match broker.attach(handle, name).await {
        Ok(Some(client)) => client,
        // turned away at capacity; already notified and closed
        Ok(None) => return,
        Err(e) => {
            tracing::warn!(peer = %connection.remote_addr, channel = %name, error = %e, "Attach failed");
            let notice = Payload::text(format!("Cannot attach to channel {}: {}", name, e));
            if let Err(e) = connection.send(notice) {
                tracing::debug!(peer = %connection.remote_addr, error = %e, "Attach failure notice not delivered");
            }
            connection.close();
            return;
        }
    };

    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(message) => {
                if let Some(payload) = into_payload(message) {
                    broker.relay(&client, payload).await;
                }
            }
            Err(e) => {
                tracing::debug!(client = %client.key(), error = %e, "Read failed");
                break;
            }
        }

        // channel was force-removed underneath us
        if !client.is_attached() {
            break;
        }
    }

    broker.detach(&**connection).await;
    connection.close();
}

async fn echo_loop(connection: &Arc<WsConnection>, source: &mut WsSource) {
    while let Some(frame) = source.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            Ok(message) => {
                if let Some(payload) = into_payload(message) {
                    if let Err(e) = connection.send(payload) {
                        tracing::debug!(peer = %connection.remote_addr, error = %e, "Echo dropped");
                    }
                }
            }
            Err(e) => {
                tracing::debug!(peer = %connection.remote_addr, error = %e, "Read failed");
                break;
            }
        }
    }

    connection.close();
}
