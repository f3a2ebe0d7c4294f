// User control events

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

pub const EVENT_STREAM_BEGIN: u16 = 0;
pub const EVENT_STREAM_EOF: u16 = 1;
pub const EVENT_STREAM_DRY: u16 = 2;
pub const EVENT_SET_BUFFER_LENGTH: u16 = 3;
pub const EVENT_STREAM_IS_RECORDED: u16 = 4;
pub const EVENT_PING_REQUEST: u16 = 6;
pub const EVENT_PING_RESPONSE: u16 = 7;
pub const EVENT_STREAM_BUFFER_EMPTY: u16 = 31;
pub const EVENT_STREAM_BUFFER_READY: u16 = 32;

/// Events carried by USER_CONTROL messages
///
/// Ping events keep their 4 raw bytes so a response can echo the
/// request payload exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserControlEvent {
    StreamBegin(u32),
    StreamEof(u32),
    StreamDry(u32),
    SetBufferLength { stream_id: u32, buffer_ms: u32 },
    StreamIsRecorded(u32),
    PingRequest([u8; 4]),
    PingResponse([u8; 4]),
    StreamBufferEmpty(u32),
    StreamBufferReady(u32),
    Unknown { event_type: u16, data: Vec<u8> },
}

impl UserControlEvent {
    /// Event type id
    pub fn event_type(&self) -> u16 {
        match self {
            UserControlEvent::StreamBegin(_) => EVENT_STREAM_BEGIN,
            UserControlEvent::StreamEof(_) => EVENT_STREAM_EOF,
            UserControlEvent::StreamDry(_) => EVENT_STREAM_DRY,
            UserControlEvent::SetBufferLength { .. } => EVENT_SET_BUFFER_LENGTH,
            UserControlEvent::StreamIsRecorded(_) => EVENT_STREAM_IS_RECORDED,
            UserControlEvent::PingRequest(_) => EVENT_PING_REQUEST,
            UserControlEvent::PingResponse(_) => EVENT_PING_RESPONSE,
            UserControlEvent::StreamBufferEmpty(_) => EVENT_STREAM_BUFFER_EMPTY,
            UserControlEvent::StreamBufferReady(_) => EVENT_STREAM_BUFFER_READY,
            UserControlEvent::Unknown { event_type, .. } => *event_type,
        }
    }

    /// Serializes the event into a message payload
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut event_type = [0; 2];
        BigEndian::write_u16(&mut event_type, self.event_type());
        out.extend_from_slice(&event_type);

        let stream = |stream_id: u32, out: &mut Vec<u8>| {
            let mut buf = [0; 4];
            BigEndian::write_u32(&mut buf, stream_id);
            out.extend_from_slice(&buf);
        };

        match self {
            UserControlEvent::StreamBegin(stream_id)
            | UserControlEvent::StreamEof(stream_id)
            | UserControlEvent::StreamDry(stream_id)
            | UserControlEvent::StreamIsRecorded(stream_id)
            | UserControlEvent::StreamBufferEmpty(stream_id)
            | UserControlEvent::StreamBufferReady(stream_id) => stream(*stream_id, out),
            UserControlEvent::SetBufferLength {
                stream_id,
                buffer_ms,
            } => {
                stream(*stream_id, out);
                stream(*buffer_ms, out);
            }
            UserControlEvent::PingRequest(data) | UserControlEvent::PingResponse(data) => {
                out.extend_from_slice(data);
            }
            UserControlEvent::Unknown { data, .. } => out.extend_from_slice(data),
        }
    }

    /// Parses a USER_CONTROL message payload
    pub fn decode(payload: &[u8]) -> Result<UserControlEvent, RtmpError> {
        let mut cursor = ByteCursor::new(payload);
        let event_type = cursor.read_u16()?;

        let event = match event_type {
            EVENT_STREAM_BEGIN => UserControlEvent::StreamBegin(cursor.read_u32()?),
            EVENT_STREAM_EOF => UserControlEvent::StreamEof(cursor.read_u32()?),
            EVENT_STREAM_DRY => UserControlEvent::StreamDry(cursor.read_u32()?),
            EVENT_SET_BUFFER_LENGTH => UserControlEvent::SetBufferLength {
                stream_id: cursor.read_u32()?,
                buffer_ms: cursor.read_u32()?,
            },
            EVENT_STREAM_IS_RECORDED => UserControlEvent::StreamIsRecorded(cursor.read_u32()?),
            EVENT_PING_REQUEST => UserControlEvent::PingRequest(cursor.read_four_bytes()?),
            EVENT_PING_RESPONSE => UserControlEvent::PingResponse(cursor.read_four_bytes()?),
            EVENT_STREAM_BUFFER_EMPTY => {
                UserControlEvent::StreamBufferEmpty(cursor.read_u32()?)
            }
            EVENT_STREAM_BUFFER_READY => {
                UserControlEvent::StreamBufferReady(cursor.read_u32()?)
            }
            other => UserControlEvent::Unknown {
                event_type: other,
                data: cursor.read_remaining().to_vec(),
            },
        };

        Ok(event)
    }
}
