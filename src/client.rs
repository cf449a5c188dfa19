//! Connection worker
//!
//! A `Client` owns one peer connection and runs two duties on it: the read
//! pump forwards peer data to the hub as chat, the write pump relays queued
//! hub output to the peer and keeps the connection alive with pings. The hub
//! only ever sees the `ClientHandle`, never the connection.

use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant};
use tokio_tungstenite::tungstenite::error::ProtocolError;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, SendError};
use crate::hub::HubHandle;
use crate::message::Message;
use crate::types::{ClientId, RoomName};

/// Lifecycle of a connection worker
///
/// Moves strictly forward; `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Handshake done, not yet registered with the hub
    Connecting,
    /// Registered, both pumps running
    Active,
    /// One pump has exited, the other is being torn down
    Closing,
    /// Both pumps have exited
    Closed,
}

impl ClientState {
    /// Whether `next` is a legal step forward from this state
    pub fn can_advance_to(self, next: ClientState) -> bool {
        matches!(
            (self, next),
            (ClientState::Connecting, ClientState::Active)
                | (ClientState::Connecting, ClientState::Closed)
                | (ClientState::Active, ClientState::Closing)
                | (ClientState::Closing, ClientState::Closed)
        )
    }
}

fn advance(state: &watch::Sender<ClientState>, next: ClientState) -> Result<(), AppError> {
    let current = *state.borrow();
    if !current.can_advance_to(next) {
        return Err(AppError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    state.send_replace(next);
    Ok(())
}

/// The hub's view of a connected client
///
/// Holds the only sending half of the client's outbound queue. Dropping it
/// closes the queue, which tells the write pump to shut the connection.
#[derive(Debug)]
pub struct ClientHandle {
    pub id: ClientId,
    pub room: RoomName,
    pub username: String,
    sender: mpsc::Sender<String>,
}

impl ClientHandle {
    pub fn new(
        id: ClientId,
        room: RoomName,
        username: String,
        sender: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            room,
            username,
            sender,
        }
    }

    /// Queue a serialized message without waiting
    pub fn try_send(&self, json: String) -> Result<(), SendError> {
        self.sender.try_send(json).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SendError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SendError::ChannelClosed,
        })
    }
}

/// Why the read pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReadExit {
    /// Nothing arrived within the liveness window
    Timeout,
    /// Close frame or end of stream
    Closed,
    /// Transport or protocol error, including oversized messages
    Error,
    /// The hub is no longer accepting messages
    HubGone,
}

/// Why the write pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WriteExit {
    /// The hub dropped this client's queue
    QueueClosed,
    /// A message could not be written in time
    WriteFailed,
    /// A keep-alive ping could not be written in time
    PingFailed,
}

/// One connected peer
pub struct Client<S> {
    id: ClientId,
    room: RoomName,
    username: String,
    ws: S,
    queue: mpsc::Receiver<String>,
    handle: ClientHandle,
    hub: HubHandle,
    config: Config,
    state: watch::Sender<ClientState>,
}

impl<S> Client<S>
where
    S: Stream<Item = Result<WsMessage, WsError>> + Sink<WsMessage, Error = WsError>,
    S: Unpin + Send + 'static,
{
    /// Wrap an upgraded connection
    pub fn new(ws: S, room: RoomName, username: String, hub: HubHandle, config: &Config) -> Self {
        let id = ClientId::new();
        let (sender, queue) = mpsc::channel(config.send_buffer);
        let handle = ClientHandle::new(id, room.clone(), username.clone(), sender);
        let (state, _) = watch::channel(ClientState::Connecting);

        Self {
            id,
            room,
            username,
            ws,
            queue,
            handle,
            hub,
            config: config.clone(),
            state,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Observe lifecycle transitions
    pub fn subscribe_state(&self) -> watch::Receiver<ClientState> {
        self.state.subscribe()
    }

    /// Register with the hub and run both pumps until the connection ends
    pub async fn run(self) -> Result<(), AppError> {
        let Client {
            id,
            room,
            username,
            ws,
            queue,
            handle,
            hub,
            config,
            state,
        } = self;

        if let Err(e) = hub.register(handle).await {
            advance(&state, ClientState::Closed)?;
            return Err(e);
        }
        advance(&state, ClientState::Active)?;

        let (sink, stream) = ws.split();

        let mut read_task = tokio::spawn(read_pump(
            stream,
            id,
            room,
            username,
            hub.clone(),
            config.pong_wait,
        ));
        let mut write_task = tokio::spawn(write_pump(
            sink,
            queue,
            id,
            config.ping_period,
            config.write_wait,
        ));

        tokio::select! {
            exit = &mut read_task => {
                debug!("Read task completed for {}: {:?}", id, exit);
                advance(&state, ClientState::Closing)?;

                // The hub drops our handle, which ends the write pump
                if hub.unregister(id).await.is_err() {
                    debug!("Hub closed before {} could unregister", id);
                }
                if timeout(config.write_wait, &mut write_task).await.is_err() {
                    write_task.abort();
                }
            }
            exit = &mut write_task => {
                debug!("Write task completed for {}: {:?}", id, exit);
                advance(&state, ClientState::Closing)?;

                // Dropping the read half closes the connection
                read_task.abort();
                let _ = read_task.await;

                if hub.unregister(id).await.is_err() {
                    debug!("Hub closed before {} could unregister", id);
                }
            }
        }

        advance(&state, ClientState::Closed)?;
        info!("Client {} disconnected", id);

        Ok(())
    }
}

/// Forward everything the peer sends to the hub as chat
///
/// Any frame, pongs included, restarts the liveness window.
pub(crate) async fn read_pump<S>(
    mut stream: S,
    client_id: ClientId,
    room: RoomName,
    username: String,
    hub: HubHandle,
    pong_wait: Duration,
) -> ReadExit
where
    S: Stream<Item = Result<WsMessage, WsError>> + Unpin,
{
    loop {
        let frame = match timeout(pong_wait, stream.next()).await {
            Err(_) => {
                info!("Client {} missed the {:?} liveness window", client_id, pong_wait);
                return ReadExit::Timeout;
            }
            Ok(None) => return ReadExit::Closed,
            Ok(Some(Err(e))) => {
                log_read_error(client_id, &e);
                return ReadExit::Error;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let content = match frame {
            WsMessage::Text(text) => text,
            WsMessage::Binary(data) => String::from_utf8_lossy(&data).into_owned(),
            WsMessage::Close(_) => {
                debug!("Client {} sent close frame", client_id);
                return ReadExit::Closed;
            }
            WsMessage::Pong(_) => {
                debug!("Pong from {}", client_id);
                continue;
            }
            // Pings are answered by tungstenite
            WsMessage::Ping(_) | WsMessage::Frame(_) => continue,
        };

        let message = Message::chat(room.clone(), username.as_str(), content);
        if hub.broadcast(message).await.is_err() {
            debug!("Hub closed, ending read task for {}", client_id);
            return ReadExit::HubGone;
        }
    }
}

fn log_read_error(client_id: ClientId, error: &WsError) {
    match error {
        WsError::ConnectionClosed
        | WsError::AlreadyClosed
        | WsError::Protocol(ProtocolError::ResetWithoutClosingHandshake) => {
            debug!("Connection to {} closed: {}", client_id, error);
        }
        _ => warn!("WebSocket error for {}: {}", client_id, error),
    }
}

/// Relay queued hub output to the peer and ping it every `ping_period`
pub(crate) async fn write_pump<S>(
    mut sink: S,
    mut queue: mpsc::Receiver<String>,
    client_id: ClientId,
    ping_period: Duration,
    write_wait: Duration,
) -> WriteExit
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    let mut ticker = interval_at(Instant::now() + ping_period, ping_period);

    loop {
        tokio::select! {
            json = queue.recv() => {
                let Some(json) = json else {
                    debug!("Queue closed for {}, sending close frame", client_id);
                    let _ = timeout(write_wait, sink.send(WsMessage::Close(None))).await;
                    return WriteExit::QueueClosed;
                };

                match timeout(write_wait, sink.send(WsMessage::Text(json))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!("WebSocket send failed for {}: {}", client_id, e);
                        return WriteExit::WriteFailed;
                    }
                    Err(_) => {
                        debug!("WebSocket send to {} timed out", client_id);
                        return WriteExit::WriteFailed;
                    }
                }
            }
            _ = ticker.tick() => {
                if !matches!(timeout(write_wait, sink.send(WsMessage::Ping(Vec::new()))).await, Ok(Ok(()))) {
                    debug!("Ping to {} failed", client_id);
                    return WriteExit::PingFailed;
                }
            }
        }
    }
}
