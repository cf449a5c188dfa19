//! Room struct definition
//!
//! Represents the membership of one named chat room.

use std::collections::HashSet;
use std::time::Instant;

use crate::types::{ClientId, RoomName};

/// Chat room membership
///
/// Holds only client IDs; the hub keeps the client handles themselves.
/// A room with no members is deleted by the hub.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Current members
    members: HashSet<ClientId>,
    /// Room creation time
    pub created_at: Instant,
}

impl Room {
    /// Create a new empty room
    pub fn new(name: RoomName) -> Self {
        Self {
            name,
            members: HashSet::new(),
            created_at: Instant::now(),
        }
    }

    /// Add a member. Returns false if it was already present.
    pub fn add(&mut self, client_id: ClientId) -> bool {
        self.members.insert(client_id)
    }

    /// Remove a member. Returns false if it was not present.
    pub fn remove(&mut self, client_id: ClientId) -> bool {
        self.members.remove(&client_id)
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.members.contains(&client_id)
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Get the number of members in the room
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Iterate members in unspecified order
    pub fn members(&self) -> impl Iterator<Item = ClientId> + '_ {
        self.members.iter().copied()
    }
}
