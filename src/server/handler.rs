// Session handler callbacks

use crate::rtmp::{RawMessage, RtmpCommand, RtmpData};

/// What the server knows about one accepted connection
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session_id: u64,
    pub remote_address: String,

    /// Application from connect, once received
    pub app: Option<String>,

    /// Stream key from publish, once received
    pub stream_key: Option<String>,
}

impl SessionInfo {
    pub fn new(session_id: u64, remote_address: String) -> SessionInfo {
        SessionInfo {
            session_id,
            remote_address,
            app: None,
            stream_key: None,
        }
    }
}

/// Per-session callbacks the server dispatches commands into
///
/// Returning Err from an accepting callback rejects the request: the
/// server answers with `_error` or an error-level onStatus and keeps
/// the connection alive. Defaults accept everything except play,
/// which this publish-oriented server has no media path for.
pub trait SessionHandler: Send + Sync + 'static {
    /// A client asked to connect to an application
    fn on_connect(&self, _session: &SessionInfo, _app: &str) -> Result<(), String> {
        Ok(())
    }

    /// A client asked for a new message stream
    fn on_create_stream(&self, _session: &SessionInfo) -> Result<(), String> {
        Ok(())
    }

    /// A client announced it will publish this stream key
    fn on_release_stream(&self, _session: &SessionInfo, _stream_key: &str) {}

    fn on_fc_publish(&self, _session: &SessionInfo, _stream_key: &str) {}

    fn on_fc_unpublish(&self, _session: &SessionInfo, _stream_key: &str) {}

    /// A client asked to publish; rejecting sends
    /// NetStream.Publish.Failed with the returned reason
    fn on_publish(
        &self,
        _session: &SessionInfo,
        _stream_key: &str,
        _publish_type: &str,
    ) -> Result<(), String> {
        Ok(())
    }

    /// A client asked to play a stream
    fn on_play(&self, _session: &SessionInfo, _stream_name: &str) -> Result<(), String> {
        Err("playback is not supported".to_string())
    }

    fn on_close_stream(&self, _session: &SessionInfo) {}

    fn on_delete_stream(&self, _session: &SessionInfo, _stream_id: u32) {}

    /// Stream metadata from @setDataFrame
    fn on_set_data_frame(&self, _session: &SessionInfo, _data: &RtmpData) {}

    /// An audio message body, in FLV audio tag framing
    fn on_audio(&self, _session: &SessionInfo, _timestamp: u32, _payload: &[u8]) {}

    /// A video message body, in FLV video tag framing
    fn on_video(&self, _session: &SessionInfo, _timestamp: u32, _payload: &[u8]) {}

    /// A message type outside the implemented set
    fn on_unknown_message(&self, _session: &SessionInfo, _message: &RawMessage) {}

    /// A command outside the dispatched set
    fn on_unknown_command(&self, _session: &SessionInfo, _command: &RtmpCommand) {}

    /// A data message that is not @setDataFrame
    fn on_unknown_data(&self, _session: &SessionInfo, _data: &RtmpData) {}

    /// The session ended, normally or not
    fn on_disconnect(&self, _session: &SessionInfo) {}
}

/// Accept-everything handler for tests and passive servers
pub struct DefaultSessionHandler;

impl SessionHandler for DefaultSessionHandler {}
