//! Server entry point
//!
//! Starts the hub actor and accepts connections on a bound listener,
//! spawning one handler task per connection.

use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::Config;
use crate::handler::handle_connection;
use crate::hub::Hub;

/// Run the chat hub on `listener` until the process exits
pub async fn serve(listener: TcpListener, config: Config) {
    let (hub, hub_handle) = Hub::new();
    tokio::spawn(hub.run());

    info!("Hub actor started");

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let hub_handle = hub_handle.clone();
                let config = config.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, hub_handle, config).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
