// Error types

use thiserror::Error;

use crate::rtmp::RtmpCommand;

/// Errors produced by the library
#[derive(Debug, Error)]
pub enum RtmpError {
    /// Malformed bytes: unknown AMF0 marker, bad FLV signature, truncated chunk
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The peer violated the protocol: handshake mismatch, unexpected message
    /// for the current state, bad message length
    #[error("protocol error: {0}")]
    ProtocolError(String),

    /// The peer responded with `_error` or an error-level `onStatus`
    #[error("remote server error: {}", .command.describe())]
    RemoteServerError {
        /// The raw command received from the peer
        command: Box<RtmpCommand>,
    },

    /// Transport EOF or explicit close
    #[error("connection closed: {cause}")]
    ConnectionClosed {
        /// The original cause of the teardown
        cause: String,
    },

    /// The message was older than the configured drop deadline at write time
    #[error("frame dropped: older than the configured deadline")]
    FrameDropped,

    /// A handshake or transaction deadline elapsed
    #[error("timed out waiting for {0}")]
    TimeoutElapsed(String),

    /// The peer requested a feature outside this implementation
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(&'static str),

    /// Transport IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The RTMP URL could not be parsed
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl RtmpError {
    /// Creates an InvalidFormat error
    pub fn invalid_format(message: impl Into<String>) -> RtmpError {
        RtmpError::InvalidFormat(message.into())
    }

    /// Creates a ProtocolError
    pub fn protocol(message: impl Into<String>) -> RtmpError {
        RtmpError::ProtocolError(message.into())
    }

    /// Creates a ConnectionClosed error
    pub fn closed(cause: impl Into<String>) -> RtmpError {
        RtmpError::ConnectionClosed {
            cause: cause.into(),
        }
    }

    /// Creates a RemoteServerError carrying the raw command
    pub fn remote(command: RtmpCommand) -> RtmpError {
        RtmpError::RemoteServerError {
            command: Box::new(command),
        }
    }

    /// Returns true for errors that end the connection
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RtmpError::ProtocolError(_) | RtmpError::ConnectionClosed { .. } | RtmpError::Io(_)
        )
    }
}
