//! Room-based WebSocket chat hub - Entry Point
//!
//! Parses arguments, sets up logging, binds the listener, and serves.

use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use chat_hub::{serve, Config};

#[derive(Parser, Debug)]
#[command(name = "chat_hub")]
#[command(about = "Room-based WebSocket chat hub", long_about = None)]
struct Args {
    /// Host address to bind the server to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Port number to bind the server to
    #[arg(short = 'p', long, default_value = "8080")]
    port: u16,

    /// Seconds a peer may stay silent before it is disconnected
    #[arg(long, default_value = "60")]
    pong_wait_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    let args = Args::parse();
    let config = Config::default().with_pong_wait(Duration::from_secs(args.pong_wait_secs));

    let addr = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Chat hub listening on ws://{}/ws/{{room}}?username={{name}}", addr);

    serve(listener, config).await;

    Ok(())
}
