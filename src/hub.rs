//! Hub actor implementation
//!
//! The central actor that owns all membership state: registered clients and
//! room membership. Handlers reach it only through the register, unregister,
//! and broadcast intakes of a [`HubHandle`], which share one FIFO command
//! channel. The hub processes one command fully before the next, so compound
//! updates (remove, announce, send roster) never interleave and each sender's
//! commands are applied in the order it sent them.

use std::collections::HashMap;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::client::ClientHandle;
use crate::error::AppError;
use crate::message::Message;
use crate::room::Room;
use crate::types::{ClientId, RoomName};

/// Channel buffer size for hub commands
pub const CHANNEL_BUFFER_SIZE: usize = 256;

/// Commands sent from clients to the hub actor
#[derive(Debug)]
pub enum HubCommand {
    /// Client admitted into its room
    Register(ClientHandle),
    /// Client connection ended
    Unregister(ClientId),
    /// Message to fan out to a room
    Broadcast(Message),
}

/// Cloneable sender side of the hub's command channel
#[derive(Debug, Clone)]
pub struct HubHandle {
    sender: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    /// Admit a client into its room
    pub async fn register(&self, client: ClientHandle) -> Result<(), AppError> {
        self.send(HubCommand::Register(client)).await
    }

    /// Remove a client. Unknown or already evicted clients are ignored.
    pub async fn unregister(&self, client_id: ClientId) -> Result<(), AppError> {
        self.send(HubCommand::Unregister(client_id)).await
    }

    /// Route a message to every client in `message.room()`
    pub async fn broadcast(&self, message: Message) -> Result<(), AppError> {
        self.send(HubCommand::Broadcast(message)).await
    }

    async fn send(&self, cmd: HubCommand) -> Result<(), AppError> {
        self.sender.send(cmd).await.map_err(|_| AppError::ChannelSend)
    }
}

/// The hub actor
///
/// Holds the only sending half of every registered client's outbound queue,
/// so removing a client from `clients` closes its queue.
pub struct Hub {
    /// All registered clients: ClientId -> ClientHandle
    clients: HashMap<ClientId, ClientHandle>,
    /// Rooms with at least one member: RoomName -> Room
    rooms: HashMap<RoomName, Room>,
    /// Command receiver channel
    receiver: mpsc::Receiver<HubCommand>,
}

impl Hub {
    /// Create a hub and the handle used to reach it
    pub fn new() -> (Self, HubHandle) {
        let (sender, receiver) = mpsc::channel(CHANNEL_BUFFER_SIZE);

        let hub = Self {
            clients: HashMap::new(),
            rooms: HashMap::new(),
            receiver,
        };
        (hub, HubHandle { sender })
    }

    /// Run the hub event loop
    ///
    /// Continues receiving and processing commands until every `HubHandle`
    /// is dropped.
    pub async fn run(mut self) {
        info!("Hub started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!("Hub shutting down");
    }

    /// Process a single command
    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register(client) => self.handle_register(client),
            HubCommand::Unregister(client_id) => self.handle_unregister(client_id),
            HubCommand::Broadcast(message) => self.handle_broadcast(message),
        }
    }

    /// Number of registered clients
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Number of rooms with at least one member
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Members of `room`, or None if the room does not exist
    pub fn room_member_count(&self, room: &RoomName) -> Option<usize> {
        self.rooms.get(room).map(Room::member_count)
    }

    fn handle_register(&mut self, client: ClientHandle) {
        let client_id = client.id;
        let room_name = client.room.clone();
        let username = client.username.clone();

        let room = self.rooms.entry(room_name.clone()).or_insert_with(|| {
            debug!("Room {} created", room_name);
            Room::new(room_name.clone())
        });
        room.add(client_id);
        self.clients.insert(client_id, client);

        info!("Client {} ({}) joined room {}", client_id, username, room_name);
        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );

        self.handle_broadcast(Message::user_joined(room_name.clone(), &username));
        self.broadcast_room_users(&room_name);
    }

    fn handle_unregister(&mut self, client_id: ClientId) {
        // Dropping the handle closes the client's queue
        let Some(client) = self.clients.remove(&client_id) else {
            return;
        };

        if let Some(room) = self.rooms.get_mut(&client.room) {
            debug_assert!(room.contains(client_id));
            room.remove(client_id);
        }

        info!(
            "Client {} ({}) left room {}",
            client_id, client.username, client.room
        );

        self.handle_broadcast(Message::user_left(client.room.clone(), &client.username));
        self.broadcast_room_users(&client.room);

        self.remove_room_if_empty(&client.room);

        debug!(
            "Total clients: {}, Total rooms: {}",
            self.clients.len(),
            self.rooms.len()
        );
    }

    /// Deliver a message to every member of its room
    ///
    /// Delivery never waits: a member whose queue is full or closed is
    /// evicted on the spot, without a leave announcement.
    fn handle_broadcast(&mut self, message: Message) {
        let json = match message.to_wire() {
            Ok(json) => json,
            Err(e) => {
                warn!("Failed to serialize message for room {}: {}", message.room(), e);
                return;
            }
        };

        let Some(room) = self.rooms.get(message.room()) else {
            return;
        };

        let mut evicted = Vec::new();
        for client_id in room.members() {
            let Some(client) = self.clients.get(&client_id) else {
                continue;
            };
            if let Err(e) = client.try_send(json.clone()) {
                warn!(
                    "Evicting client {} ({}) from room {}: {}",
                    client_id,
                    client.username,
                    message.room(),
                    e
                );
                evicted.push(client_id);
            }
        }

        if evicted.is_empty() {
            return;
        }

        for client_id in evicted {
            self.clients.remove(&client_id);
            if let Some(room) = self.rooms.get_mut(message.room()) {
                room.remove(client_id);
            }
        }

        self.remove_room_if_empty(message.room());
    }

    fn remove_room_if_empty(&mut self, name: &RoomName) {
        if !self.rooms.get(name).is_some_and(Room::is_empty) {
            return;
        }
        if let Some(room) = self.rooms.remove(name) {
            debug!(
                "Room {} deleted (empty) after {:?}",
                room.name,
                room.created_at.elapsed()
            );
        }
    }

    /// Broadcast the roster of `room` to its members
    fn broadcast_room_users(&mut self, room: &RoomName) {
        let usernames: Vec<String> = self
            .rooms
            .get(room)
            .map(|r| {
                r.members()
                    .filter_map(|id| self.clients.get(&id))
                    .map(|c| c.username.clone())
                    .collect()
            })
            .unwrap_or_default();

        self.handle_broadcast(Message::online_users(
            room.clone(),
            usernames.iter().map(String::as_str),
        ));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use tokio::sync::mpsc::error::TryRecvError;

    use super::*;
    use crate::message::MessageKind;

    fn room(name: &str) -> RoomName {
        RoomName::new(name).unwrap()
    }

    fn client(
        room_name: &str,
        username: &str,
        capacity: usize,
    ) -> (ClientHandle, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = ClientHandle::new(ClientId::new(), room(room_name), username.to_string(), tx);
        (handle, rx)
    }

    fn recv(rx: &mut mpsc::Receiver<String>) -> Message {
        let json = rx.try_recv().expect("expected a queued message");
        serde_json::from_str(&json).unwrap()
    }

    fn drain(rx: &mut mpsc::Receiver<String>) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Ok(json) = rx.try_recv() {
            messages.push(serde_json::from_str(&json).unwrap());
        }
        messages
    }

    fn roster(message: &Message) -> HashSet<String> {
        assert_eq!(message.kind(), MessageKind::OnlineUsers);
        message
            .content()
            .split(',')
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn names(list: &[&str]) -> HashSet<String> {
        list.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_register_creates_room_and_announces() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);

        hub.handle_register(alice);

        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.room_member_count(&room("lobby")), Some(1));

        let joined = recv(&mut alice_rx);
        assert_eq!(joined.kind(), MessageKind::UserJoined);
        assert_eq!(joined.username(), "alice");

        let users = recv(&mut alice_rx);
        assert_eq!(roster(&users), names(&["alice"]));
        assert_eq!(users.username(), "");
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn test_roster_lists_all_members() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        let (bob, mut bob_rx) = client("lobby", "bob", 16);

        hub.handle_register(alice);
        drain(&mut alice_rx);
        hub.handle_register(bob);

        for rx in [&mut alice_rx, &mut bob_rx] {
            let joined = recv(rx);
            assert_eq!(joined.kind(), MessageKind::UserJoined);
            assert_eq!(joined.username(), "bob");
            assert_eq!(roster(&recv(rx)), names(&["alice", "bob"]));
        }
    }

    #[test]
    fn test_room_isolation() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        let (carol, mut carol_rx) = client("garden", "carol", 16);

        hub.handle_register(alice);
        hub.handle_register(carol);
        drain(&mut alice_rx);
        drain(&mut carol_rx);

        hub.handle_broadcast(Message::chat(room("garden"), "carol", "secret"));

        assert!(matches!(alice_rx.try_recv(), Err(TryRecvError::Empty)));
        let chat = recv(&mut carol_rx);
        assert_eq!(chat.kind(), MessageKind::Chat);
        assert_eq!(chat.content(), "secret");
        assert_eq!(hub.room_count(), 2);
    }

    #[test]
    fn test_broadcast_to_missing_room_is_dropped() {
        let (mut hub, _handle) = Hub::new();
        hub.handle_broadcast(Message::chat(room("nowhere"), "ghost", "boo"));
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_unregister_announces_and_deletes_empty_room() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        let (bob, mut bob_rx) = client("lobby", "bob", 16);
        let bob_id = bob.id;
        let alice_id = alice.id;

        hub.handle_register(alice);
        hub.handle_register(bob);
        drain(&mut alice_rx);
        drain(&mut bob_rx);

        hub.handle_unregister(bob_id);

        let left = recv(&mut alice_rx);
        assert_eq!(left.kind(), MessageKind::UserLeft);
        assert_eq!(left.username(), "bob");
        assert_eq!(roster(&recv(&mut alice_rx)), names(&["alice"]));
        assert_eq!(hub.room_member_count(&room("lobby")), Some(1));

        // bob's handle was dropped, closing his queue
        assert!(matches!(bob_rx.try_recv(), Err(TryRecvError::Disconnected)));

        hub.handle_unregister(alice_id);
        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.client_count(), 0);
    }

    #[test]
    fn test_unregister_unknown_client_is_noop() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        let (bob, _bob_rx) = client("lobby", "bob", 16);
        let bob_id = bob.id;

        hub.handle_register(alice);
        hub.handle_register(bob);
        hub.handle_unregister(bob_id);
        drain(&mut alice_rx);

        hub.handle_unregister(bob_id);
        hub.handle_unregister(ClientId::new());

        assert!(matches!(alice_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(hub.client_count(), 1);
    }

    #[test]
    fn test_full_queue_evicts_without_blocking_others() {
        let (mut hub, _handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        // Room for the two registration messages and nothing more
        let (slow, mut slow_rx) = client("lobby", "slow", 2);

        hub.handle_register(alice);
        hub.handle_register(slow);
        drain(&mut alice_rx);

        hub.handle_broadcast(Message::chat(room("lobby"), "alice", "hi"));

        assert_eq!(hub.client_count(), 1);
        assert_eq!(hub.room_member_count(&room("lobby")), Some(1));

        // alice got the chat and no leave announcement for the evicted client
        let messages = drain(&mut alice_rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].kind(), MessageKind::Chat);
        assert_eq!(messages[0].content(), "hi");

        // The evicted client sees its backlog, then a closed queue
        assert_eq!(drain(&mut slow_rx).len(), 2);
        assert!(matches!(slow_rx.try_recv(), Err(TryRecvError::Disconnected)));
    }

    #[test]
    fn test_eviction_of_last_member_deletes_room() {
        let (mut hub, _handle) = Hub::new();
        let (slow, _slow_rx) = client("lobby", "slow", 2);
        let slow_id = slow.id;

        hub.handle_register(slow);
        hub.handle_broadcast(Message::chat(room("lobby"), "slow", "hi"));

        assert_eq!(hub.room_count(), 0);
        assert_eq!(hub.client_count(), 0);

        // A later unregister from the evicted client's own teardown does nothing
        hub.handle_unregister(slow_id);
        assert_eq!(hub.room_count(), 0);
    }

    #[test]
    fn test_closed_queue_is_evicted() {
        let (mut hub, _handle) = Hub::new();
        let (alice, alice_rx) = client("lobby", "alice", 16);

        hub.handle_register(alice);
        drop(alice_rx);
        hub.handle_broadcast(Message::chat(room("lobby"), "someone", "hi"));

        assert_eq!(hub.client_count(), 0);
        assert_eq!(hub.room_count(), 0);
    }

    #[tokio::test]
    async fn test_run_processes_intakes_and_stops_when_handles_drop() {
        let (hub, handle) = Hub::new();
        let (alice, mut alice_rx) = client("lobby", "alice", 16);
        let alice_id = alice.id;

        let task = tokio::spawn(hub.run());

        handle.register(alice).await.unwrap();
        handle
            .broadcast(Message::chat(room("lobby"), "alice", "hello"))
            .await
            .unwrap();

        let mut kinds = Vec::new();
        for _ in 0..3 {
            let json = alice_rx.recv().await.unwrap();
            let message: Message = serde_json::from_str(&json).unwrap();
            kinds.push(message.kind());
        }
        assert_eq!(
            kinds,
            vec![
                MessageKind::UserJoined,
                MessageKind::OnlineUsers,
                MessageKind::Chat
            ]
        );

        handle.unregister(alice_id).await.unwrap();
        assert!(alice_rx.recv().await.is_none());

        drop(handle);
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_commands_apply_in_arrival_order() {
        let (hub, handle) = Hub::new();
        let (listener, mut listener_rx) = client("lobby", "listener", 32);
        let (bob, _bob_rx) = client("lobby", "bob", 32);
        let (carol, mut carol_rx) = client("lobby", "carol", 32);
        let bob_id = bob.id;

        // Queue everything before the hub starts so nothing is applied early
        handle.register(listener).await.unwrap();
        handle.register(bob).await.unwrap();
        handle
            .broadcast(Message::chat(room("lobby"), "bob", "bye"))
            .await
            .unwrap();
        handle.unregister(bob_id).await.unwrap();
        handle.register(carol).await.unwrap();

        let task = tokio::spawn(hub.run());

        let mut seen = Vec::new();
        for _ in 0..9 {
            let json = listener_rx.recv().await.unwrap();
            let message: Message = serde_json::from_str(&json).unwrap();
            seen.push((message.kind(), message.username().to_string()));
        }
        let kinds: Vec<_> = seen.iter().map(|(kind, _)| *kind).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::UserJoined,
                MessageKind::OnlineUsers,
                MessageKind::UserJoined,
                MessageKind::OnlineUsers,
                MessageKind::Chat,
                MessageKind::UserLeft,
                MessageKind::OnlineUsers,
                MessageKind::UserJoined,
                MessageKind::OnlineUsers,
            ]
        );
        assert_eq!(seen[4].1, "bob");
        assert_eq!(seen[5].1, "bob");
        assert_eq!(seen[7].1, "carol");

        // carol joined after bob's chat and departure, so she sees neither
        let joined: Message = serde_json::from_str(&carol_rx.recv().await.unwrap()).unwrap();
        assert_eq!(joined.kind(), MessageKind::UserJoined);
        assert_eq!(joined.username(), "carol");
        let users: Message = serde_json::from_str(&carol_rx.recv().await.unwrap()).unwrap();
        assert_eq!(roster(&users), names(&["listener", "carol"]));
        assert!(carol_rx.try_recv().is_err());

        drop(handle);
        task.await.unwrap();
    }
}
