//! Error types for the chat hub
//!
//! Defines application-level errors, admission errors, and queue delivery errors.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use crate::client::ClientState;

/// Application-level errors
///
/// Transport errors are fatal to the single connection they occur on and
/// never reach the hub.
#[derive(Debug, Error)]
pub enum AppError {
    /// WebSocket protocol error (fatal)
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Channel send error (fatal - the hub has stopped)
    #[error("Channel send error")]
    ChannelSend,

    /// Connection request rejected before the handshake completed
    #[error("Admission rejected: {0}")]
    Admission(#[from] AdmissionError),

    /// Client lifecycle moved backwards or skipped a state
    #[error("Invalid client state transition from {from:?} to {to:?}")]
    InvalidTransition { from: ClientState, to: ClientState },
}

/// Reasons a connection request is refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    /// No room segment after `/ws/`
    #[error("room is required")]
    MissingRoom,

    /// No `username` query parameter, or an empty one
    #[error("username is required")]
    MissingUsername,

    /// Request path is not a `/ws/{room}` path
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Outbound queue delivery errors
///
/// Occurs when the hub attempts a non-blocking push into a client's queue.
#[derive(Debug, Error)]
pub enum SendError {
    /// The client's writer has gone away
    #[error("Channel closed")]
    ChannelClosed,

    /// The client is not draining its queue fast enough
    #[error("Queue full")]
    QueueFull,
}
