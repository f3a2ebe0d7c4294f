// Server configuration

use std::time::Duration;

use crate::log::LogConfig;
use crate::rtmp::{DEFAULT_PEER_BANDWIDTH, DEFAULT_WINDOW_ACK_SIZE};

/// Configuration for the RTMP server
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind, e.g. "0.0.0.0:1935"
    pub bind_address: String,

    /// Outgoing chunk size announced after connect
    pub chunk_size: usize,

    /// Window acknowledgement size announced to publishers
    pub window_ack_size: u32,

    /// Peer bandwidth announced to publishers
    pub peer_bandwidth: u32,

    /// Per-read timeout during the handshake
    pub handshake_timeout: Duration,

    /// Sessions idle longer than this are dropped
    pub read_timeout: Duration,

    /// Logging configuration
    pub log_config: LogConfig,
}

impl ServerConfig {
    pub fn new(bind_address: impl Into<String>) -> ServerConfig {
        ServerConfig {
            bind_address: bind_address.into(),
            chunk_size: 4096,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            peer_bandwidth: DEFAULT_PEER_BANDWIDTH,
            handshake_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> ServerConfig {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> ServerConfig {
        self.read_timeout = read_timeout;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> ServerConfig {
        self.log_config = log_config;
        self
    }
}
