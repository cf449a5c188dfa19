//! Connection tunables
//!
//! Defaults follow the keep-alive contract: a peer has `pong_wait` to show
//! any sign of life, and pings go out every 9/10 of that window so at least
//! one probe lands inside it.

use std::time::Duration;

/// Time allowed to write a message to the peer
pub const WRITE_WAIT: Duration = Duration::from_secs(10);

/// Time allowed to read the next frame (data or pong) from the peer
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Maximum inbound message size in bytes
pub const MAX_MESSAGE_SIZE: usize = 512;

/// Capacity of each client's outbound queue
pub const SEND_BUFFER_SIZE: usize = 256;

#[derive(Debug, Clone)]
pub struct Config {
    pub pong_wait: Duration,
    /// Must be shorter than `pong_wait`
    pub ping_period: Duration,
    pub write_wait: Duration,
    pub max_message_size: usize,
    pub send_buffer: usize,
}

impl Config {
    /// Replace the liveness window and derive the ping period from it
    pub fn with_pong_wait(mut self, pong_wait: Duration) -> Self {
        self.pong_wait = pong_wait;
        self.ping_period = ping_period_for(pong_wait);
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pong_wait: PONG_WAIT,
            ping_period: ping_period_for(PONG_WAIT),
            write_wait: WRITE_WAIT,
            max_message_size: MAX_MESSAGE_SIZE,
            send_buffer: SEND_BUFFER_SIZE,
        }
    }
}

fn ping_period_for(pong_wait: Duration) -> Duration {
    pong_wait * 9 / 10
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing() {
        let config = Config::default();
        assert_eq!(config.pong_wait, Duration::from_secs(60));
        assert_eq!(config.ping_period, Duration::from_secs(54));
        assert_eq!(config.write_wait, Duration::from_secs(10));
        assert_eq!(config.max_message_size, 512);
        assert_eq!(config.send_buffer, 256);
    }

    #[test]
    fn test_ping_period_follows_pong_wait() {
        let config = Config::default().with_pong_wait(Duration::from_millis(200));
        assert_eq!(config.ping_period, Duration::from_millis(180));
        assert!(config.ping_period < config.pong_wait);
    }
}
