// Client configuration

use std::time::Duration;

use crate::log::LogConfig;
use crate::rtmp::DEFAULT_WINDOW_ACK_SIZE;

/// Configuration for a publish client, built with the `with_*` methods
#[derive(Clone)]
pub struct ClientConfig {
    /// Full RTMP URL: rtmp[s|t|te|ts]://host[:port]/app/streamKey
    pub url: String,

    /// Advertised flash version string
    pub flash_version: String,

    /// Outgoing chunk size announced after connect
    pub chunk_size: usize,

    /// Window acknowledgement size announced to the server
    pub window_ack_size: u32,

    /// TCP / TLS connect timeout
    pub connect_timeout: Duration,

    /// Per-read timeout during the handshake
    pub handshake_timeout: Duration,

    /// Timeout for command transactions and status waits
    pub command_timeout: Duration,

    /// When set, audio/video messages older than this at write time
    /// are dropped instead of sent
    pub drop_late_frames: Option<Duration>,

    /// SoundFormat bitmask advertised in connect
    pub audio_codecs: f64,

    /// Legacy CodecID bitmask advertised in connect
    pub video_codecs: f64,

    /// Enhanced FourCCs advertised in connect
    pub four_cc_list: Vec<String>,

    /// Logging configuration
    pub log_config: LogConfig,
}

impl ClientConfig {
    /// Creates a configuration with defaults for everything but the URL
    pub fn new(url: impl Into<String>) -> ClientConfig {
        ClientConfig {
            url: url.into(),
            flash_version: "FMLE/3.0 (compatible; rtmp-cast)".to_string(),
            chunk_size: 4096,
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            connect_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(10),
            drop_late_frames: None,
            audio_codecs: 3575.0,
            video_codecs: 252.0,
            four_cc_list: Vec::new(),
            log_config: LogConfig::disabled(),
        }
    }

    pub fn with_flash_version(mut self, flash_version: impl Into<String>) -> ClientConfig {
        self.flash_version = flash_version.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> ClientConfig {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_window_ack_size(mut self, window_ack_size: u32) -> ClientConfig {
        self.window_ack_size = window_ack_size;
        self
    }

    pub fn with_command_timeout(mut self, command_timeout: Duration) -> ClientConfig {
        self.command_timeout = command_timeout;
        self
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> ClientConfig {
        self.handshake_timeout = handshake_timeout;
        self
    }

    /// Enables the drop-if-older-than policy for media messages
    pub fn with_drop_late_frames(mut self, max_age: Duration) -> ClientConfig {
        self.drop_late_frames = Some(max_age);
        self
    }

    /// Advertises enhanced codecs, e.g. "hvc1" or "av01"
    pub fn with_four_cc_list(mut self, four_cc_list: Vec<String>) -> ClientConfig {
        self.four_cc_list = four_cc_list;
        self
    }

    pub fn with_log_config(mut self, log_config: LogConfig) -> ClientConfig {
        self.log_config = log_config;
        self
    }
}
