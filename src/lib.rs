//! Room-based WebSocket chat hub library
//!
//! Routes short text messages between peers grouped into named rooms,
//! built with tokio-tungstenite using the Actor pattern for state management.
//!
//! # Features
//! - WebSocket admission on `/ws/{room}?username={name}`
//! - Join/leave announcements and room rosters
//! - Real-time chat fan-out within a room
//! - Ping/pong liveness checks
//! - Eviction of peers that cannot keep up
//!
//! # Architecture
//! Uses the Actor pattern with `mpsc` channels:
//! - `Hub` is the central actor owning all room membership
//! - Each connection runs a `Client` with a read task and a write task
//! - No locks needed - all state access goes through message passing
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_hub::{serve, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     serve(listener, Config::default()).await;
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod handler;
pub mod hub;
pub mod message;
pub mod room;
pub mod server;
pub mod types;

// Re-export main types for convenience
pub use client::{Client, ClientHandle, ClientState};
pub use config::Config;
pub use error::{AdmissionError, AppError, SendError};
pub use handler::{handle_connection, Admission};
pub use hub::{Hub, HubCommand, HubHandle};
pub use message::{Message, MessageKind};
pub use room::Room;
pub use server::serve;
pub use types::{ClientId, RoomName};
