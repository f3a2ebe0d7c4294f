// Session context

use crate::server::{SessionInfo, StreamIdProvider};

/// Mutable state of one accepted connection
pub struct SessionContext {
    pub info: SessionInfo,

    /// connect has been accepted
    pub connected: bool,

    /// Message stream ids handed to this client
    pub stream_ids: StreamIdProvider,

    /// The message stream currently publishing, if any
    pub publishing_stream_id: Option<u32>,
}

impl SessionContext {
    pub fn new(session_id: u64, remote_address: String) -> SessionContext {
        SessionContext {
            info: SessionInfo::new(session_id, remote_address),
            connected: false,
            stream_ids: StreamIdProvider::new(),
            publishing_stream_id: None,
        }
    }
}
