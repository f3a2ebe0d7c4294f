// Canonical server responses

use crate::amf::Amf0Value;
use crate::rtmp::{RtmpCommand, CAPABILITIES, SERVER_FMS_VERSION};

/// `_result` for an accepted connect
pub fn connect_success(transaction_id: f64) -> RtmpCommand {
    RtmpCommand::new("_result", transaction_id)
        .with_object(Amf0Value::object(vec![
            (
                "fmsVer",
                Amf0Value::String(SERVER_FMS_VERSION.to_string()),
            ),
            ("capabilities", Amf0Value::Number(CAPABILITIES)),
        ]))
        .with_argument(Amf0Value::object(vec![
            ("level", Amf0Value::String("status".to_string())),
            (
                "code",
                Amf0Value::String("NetConnection.Connect.Success".to_string()),
            ),
            (
                "description",
                Amf0Value::String("Connection succeeded.".to_string()),
            ),
            ("objectEncoding", Amf0Value::Number(0.0)),
        ]))
}

/// `_error` for a rejected connect
pub fn connect_rejected(transaction_id: f64, description: &str) -> RtmpCommand {
    RtmpCommand::new("_error", transaction_id).with_argument(Amf0Value::object(vec![
        ("level", Amf0Value::String("error".to_string())),
        (
            "code",
            Amf0Value::String("NetConnection.Connect.Rejected".to_string()),
        ),
        (
            "description",
            Amf0Value::String(description.to_string()),
        ),
    ]))
}

/// `_result` carrying a freshly allocated stream id
pub fn create_stream_result(transaction_id: f64, stream_id: u32) -> RtmpCommand {
    RtmpCommand::new("_result", transaction_id).with_argument(Amf0Value::Number(stream_id as f64))
}

/// `_error` for a rejected createStream
pub fn create_stream_rejected(transaction_id: f64, description: &str) -> RtmpCommand {
    RtmpCommand::new("_error", transaction_id).with_argument(Amf0Value::object(vec![
        ("level", Amf0Value::String("error".to_string())),
        (
            "code",
            Amf0Value::String("NetConnection.CreateStream.Failed".to_string()),
        ),
        (
            "description",
            Amf0Value::String(description.to_string()),
        ),
    ]))
}

/// `_result` for releaseStream
pub fn release_stream_result(transaction_id: f64) -> RtmpCommand {
    RtmpCommand::new("_result", transaction_id).with_argument(Amf0Value::Number(1.0))
}

/// onFCPublish notification answering FCPublish
pub fn on_fc_publish(stream_key: &str) -> RtmpCommand {
    RtmpCommand::new("onFCPublish", 0.0).with_argument(Amf0Value::object(vec![
        (
            "code",
            Amf0Value::String("NetStream.Publish.Start".to_string()),
        ),
        (
            "description",
            Amf0Value::String(format!("FCPublish to stream {}.", stream_key)),
        ),
    ]))
}

/// onStatus for an accepted publish
pub fn publish_start(app: &str, stream_key: &str) -> RtmpCommand {
    RtmpCommand::on_status(
        "status",
        "NetStream.Publish.Start",
        Some(&format!("/{}/{} is now published.", app, stream_key)),
    )
}

/// onStatus for a rejected or broken publish
pub fn publish_failed(description: &str) -> RtmpCommand {
    RtmpCommand::on_status("error", "NetStream.Publish.Failed", Some(description))
}

/// onStatus for play requests, which this server does not serve
pub fn play_failed(description: &str) -> RtmpCommand {
    RtmpCommand::on_status("error", "NetStream.Play.Failed", Some(description))
}
