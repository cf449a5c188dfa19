//! Basic type definitions for the chat hub
//!
//! Provides newtype wrappers for type safety:
//! - `ClientId`: UUID-based unique client identifier
//! - `RoomName`: non-empty room identifier taken from the connection path

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AdmissionError;

/// Unique client identifier (newtype pattern)
///
/// Wraps a UUID v4 for type-safe client identification.
/// Implements Hash and Eq for use as HashMap keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(pub Uuid);

impl ClientId {
    /// Create a new random client ID
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Room identifier
///
/// Always non-empty. Names are compared exactly, so `Lobby` and `lobby`
/// are different rooms.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomName(String);

impl RoomName {
    /// Create a room name, rejecting empty input
    pub fn new(name: impl Into<String>) -> Result<Self, AdmissionError> {
        let name = name.into();
        if name.is_empty() {
            return Err(AdmissionError::MissingRoom);
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_id_unique() {
        let id1 = ClientId::new();
        let id2 = ClientId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_room_name_rejects_empty() {
        assert!(matches!(RoomName::new(""), Err(AdmissionError::MissingRoom)));
    }

    #[test]
    fn test_room_name_is_case_sensitive() {
        let upper = RoomName::new("Lobby").unwrap();
        let lower = RoomName::new("lobby").unwrap();
        assert_ne!(upper, lower);
        assert_eq!(lower.as_str(), "lobby");
    }
}
