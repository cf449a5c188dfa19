//! WebSocket connection handler
//!
//! Admits a new TCP connection: validates the requested room and username
//! during the WebSocket handshake, then hands the upgraded connection to a
//! `Client` which registers with the hub and runs until the peer goes away.

use serde::Deserialize;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{header, HeaderValue, StatusCode, Uri};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::config::Config;
use crate::error::{AdmissionError, AppError};
use crate::hub::HubHandle;
use crate::types::RoomName;

/// Path prefix for chat connections: `/ws/{room}?username={name}`
const WS_PATH_PREFIX: &str = "/ws/";

/// Body returned with every rejected connection request
const REJECTION_BODY: &str = r#"{"error":"room and username are required"}"#;

/// A validated connection request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub room: RoomName,
    pub username: String,
}

#[derive(Debug, Deserialize)]
struct AdmissionQuery {
    username: Option<String>,
}

impl Admission {
    /// Parse the room from the path and the username from the query string
    pub fn from_uri(uri: &Uri) -> Result<Self, AdmissionError> {
        let path = uri.path();
        if path == WS_PATH_PREFIX.trim_end_matches('/') {
            return Err(AdmissionError::MissingRoom);
        }
        let raw_room = path
            .strip_prefix(WS_PATH_PREFIX)
            .filter(|segment| !segment.contains('/'))
            .ok_or_else(|| AdmissionError::InvalidPath(path.to_string()))?;
        let room = urlencoding::decode(raw_room)
            .map_err(|_| AdmissionError::InvalidPath(path.to_string()))?;
        let room = RoomName::new(room.into_owned())?;

        let query: AdmissionQuery = serde_urlencoded::from_str(uri.query().unwrap_or(""))
            .map_err(|_| AdmissionError::MissingUsername)?;
        let username = query
            .username
            .filter(|name| !name.is_empty())
            .ok_or(AdmissionError::MissingUsername)?;

        Ok(Self { room, username })
    }
}

/// Build the HTTP 400 sent in place of the upgrade
fn rejection() -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(REJECTION_BODY.to_string()));
    *response.status_mut() = StatusCode::BAD_REQUEST;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    response
}

fn websocket_config(config: &Config) -> WebSocketConfig {
    let mut ws_config = WebSocketConfig::default();
    ws_config.max_message_size = Some(config.max_message_size);
    ws_config.max_frame_size = Some(config.max_message_size);
    ws_config
}

/// Handle a new TCP connection
///
/// Performs the WebSocket handshake, registers the client with the hub, and
/// runs it until the connection ends.
pub async fn handle_connection(
    stream: TcpStream,
    hub: HubHandle,
    config: Config,
) -> Result<(), AppError> {
    let peer_addr = stream
        .peer_addr()
        .map(|a| a.to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    debug!("New TCP connection from {}", peer_addr);

    let mut admission = None;
    let callback = |request: &Request, response: Response| {
        match Admission::from_uri(request.uri()) {
            Ok(accepted) => {
                admission = Some(accepted);
                Ok(response)
            }
            Err(e) => {
                warn!("Rejecting connection from {}: {}", peer_addr, e);
                Err(rejection())
            }
        }
    };

    // WebSocket handshake
    let ws_stream = tokio_tungstenite::accept_hdr_async_with_config(
        stream,
        callback,
        Some(websocket_config(&config)),
    )
    .await?;

    let Admission { room, username } = admission.ok_or(AdmissionError::MissingRoom)?;

    let client = Client::new(ws_stream, room.clone(), username.clone(), hub, &config);
    info!(
        "Client {} ({}) connected to room {} from {}",
        client.id(),
        username,
        room,
        peer_addr
    );

    client.run().await
}
