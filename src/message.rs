//! Message protocol definitions
//!
//! Every event the hub routes (chat, join, leave, roster) is a `Message`.
//! Peers receive it as a JSON object with `type`, `content`, `room`, and
//! `username` fields. Inbound peer data is never parsed; it is chat content.

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::types::RoomName;

/// Kind of routed event. Serialized in snake_case as the `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    /// Text sent by a peer
    Chat,
    /// A peer entered the room
    UserJoined,
    /// A peer left the room
    UserLeft,
    /// Current roster of the room
    OnlineUsers,
}

/// One routed event
///
/// Fields are private; a message is immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: MessageKind,
    content: String,
    room: RoomName,
    username: String,
}

impl Message {
    /// Chat text from `username` in `room`
    pub fn chat(room: RoomName, username: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind: MessageKind::Chat,
            content: content.into(),
            room,
            username: username.into(),
        }
    }

    /// Join notification for `username`
    pub fn user_joined(room: RoomName, username: &str) -> Self {
        Self {
            kind: MessageKind::UserJoined,
            content: format!("{} joined the room", username),
            room,
            username: username.to_string(),
        }
    }

    /// Leave notification for `username`
    pub fn user_left(room: RoomName, username: &str) -> Self {
        Self {
            kind: MessageKind::UserLeft,
            content: format!("{} left the room", username),
            room,
            username: username.to_string(),
        }
    }

    /// Roster of `room`. Usernames are comma-joined in the given order.
    pub fn online_users<'a>(room: RoomName, usernames: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            kind: MessageKind::OnlineUsers,
            content: usernames.into_iter().collect::<Vec<_>>().join(","),
            room,
            username: String::new(),
        }
    }

    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn room(&self) -> &RoomName {
        &self.room
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Encode to the JSON wire form delivered to peers
    pub fn to_wire(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}
