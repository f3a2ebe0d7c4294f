// RTMP typed messages

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::utils::ByteCursor;

use super::{
    RawMessage, RtmpCommand, RtmpData, UserControlEvent, CSID_AUDIO, CSID_COMMAND,
    CSID_PROTOCOL_CONTROL, CSID_USER_CONTROL, CSID_VIDEO, MSG_ABORT, MSG_ACK, MSG_AUDIO,
    MSG_COMMAND_AMF0, MSG_DATA_AMF0, MSG_SET_CHUNK_SIZE, MSG_SET_PEER_BANDWIDTH,
    MSG_USER_CONTROL, MSG_VIDEO, MSG_WINDOW_ACK_SIZE,
};

/// Peer bandwidth limit types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BandwidthLimitType {
    Hard = 0,
    Soft = 1,
    Dynamic = 2,
}

impl TryFrom<u8> for BandwidthLimitType {
    type Error = RtmpError;

    fn try_from(value: u8) -> Result<BandwidthLimitType, RtmpError> {
        match value {
            0 => Ok(BandwidthLimitType::Hard),
            1 => Ok(BandwidthLimitType::Soft),
            2 => Ok(BandwidthLimitType::Dynamic),
            other => Err(RtmpError::invalid_format(format!(
                "unknown bandwidth limit type: {}",
                other
            ))),
        }
    }
}

/// A decoded RTMP message
///
/// Types outside the implemented set, including the AMF3 variants and
/// aggregates, decode to Unknown and are routed to the unknown-message
/// handler rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum RtmpMessage {
    SetChunkSize(u32),
    Abort(u32),
    Ack(u32),
    UserControl(UserControlEvent),
    WindowAckSize(u32),
    SetPeerBandwidth {
        size: u32,
        limit_type: BandwidthLimitType,
    },
    Audio(Vec<u8>),
    Video(Vec<u8>),
    DataAmf0(RtmpData),
    CommandAmf0(RtmpCommand),
    Unknown {
        type_id: u8,
        payload: Vec<u8>,
    },
}

impl RtmpMessage {
    /// Message type id
    pub fn type_id(&self) -> u8 {
        match self {
            RtmpMessage::SetChunkSize(_) => MSG_SET_CHUNK_SIZE,
            RtmpMessage::Abort(_) => MSG_ABORT,
            RtmpMessage::Ack(_) => MSG_ACK,
            RtmpMessage::UserControl(_) => MSG_USER_CONTROL,
            RtmpMessage::WindowAckSize(_) => MSG_WINDOW_ACK_SIZE,
            RtmpMessage::SetPeerBandwidth { .. } => MSG_SET_PEER_BANDWIDTH,
            RtmpMessage::Audio(_) => MSG_AUDIO,
            RtmpMessage::Video(_) => MSG_VIDEO,
            RtmpMessage::DataAmf0(_) => MSG_DATA_AMF0,
            RtmpMessage::CommandAmf0(_) => MSG_COMMAND_AMF0,
            RtmpMessage::Unknown { type_id, .. } => *type_id,
        }
    }

    /// Default chunk stream for the message kind: protocol control on
    /// 2, commands and data on 3, audio on 4, video on 5, outgoing
    /// user control on 6
    pub fn default_chunk_stream_id(&self) -> u32 {
        match self {
            RtmpMessage::SetChunkSize(_)
            | RtmpMessage::Abort(_)
            | RtmpMessage::Ack(_)
            | RtmpMessage::WindowAckSize(_)
            | RtmpMessage::SetPeerBandwidth { .. } => CSID_PROTOCOL_CONTROL,
            RtmpMessage::UserControl(_) => CSID_USER_CONTROL,
            RtmpMessage::Audio(_) => CSID_AUDIO,
            RtmpMessage::Video(_) => CSID_VIDEO,
            RtmpMessage::DataAmf0(_) | RtmpMessage::CommandAmf0(_) | RtmpMessage::Unknown { .. } => {
                CSID_COMMAND
            }
        }
    }

    /// Serializes the message payload
    pub fn encode_payload(&self) -> Vec<u8> {
        match self {
            RtmpMessage::SetChunkSize(value)
            | RtmpMessage::Abort(value)
            | RtmpMessage::Ack(value)
            | RtmpMessage::WindowAckSize(value) => {
                let mut out = [0; 4];
                BigEndian::write_u32(&mut out, *value);
                out.to_vec()
            }
            RtmpMessage::UserControl(event) => {
                let mut out = Vec::new();
                event.encode(&mut out);
                out
            }
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                let mut out = vec![0; 5];
                BigEndian::write_u32(&mut out[0..4], *size);
                out[4] = *limit_type as u8;
                out
            }
            RtmpMessage::Audio(payload) | RtmpMessage::Video(payload) => payload.clone(),
            RtmpMessage::DataAmf0(data) => data.encode(),
            RtmpMessage::CommandAmf0(command) => command.encode(),
            RtmpMessage::Unknown { payload, .. } => payload.clone(),
        }
    }

    /// Decodes a message payload by type id
    pub fn decode(type_id: u8, payload: &[u8]) -> Result<RtmpMessage, RtmpError> {
        match type_id {
            MSG_SET_CHUNK_SIZE => {
                let mut cursor = ByteCursor::new(payload);
                // The high bit is reserved and must be ignored
                Ok(RtmpMessage::SetChunkSize(cursor.read_u32()? & 0x7FFF_FFFF))
            }
            MSG_ABORT => {
                let mut cursor = ByteCursor::new(payload);
                Ok(RtmpMessage::Abort(cursor.read_u32()?))
            }
            MSG_ACK => {
                let mut cursor = ByteCursor::new(payload);
                Ok(RtmpMessage::Ack(cursor.read_u32()?))
            }
            MSG_USER_CONTROL => Ok(RtmpMessage::UserControl(UserControlEvent::decode(payload)?)),
            MSG_WINDOW_ACK_SIZE => {
                let mut cursor = ByteCursor::new(payload);
                Ok(RtmpMessage::WindowAckSize(cursor.read_u32()?))
            }
            MSG_SET_PEER_BANDWIDTH => {
                let mut cursor = ByteCursor::new(payload);
                let size = cursor.read_u32()?;
                let limit_type = BandwidthLimitType::try_from(cursor.read_u8()?)?;
                Ok(RtmpMessage::SetPeerBandwidth { size, limit_type })
            }
            MSG_AUDIO => Ok(RtmpMessage::Audio(payload.to_vec())),
            MSG_VIDEO => Ok(RtmpMessage::Video(payload.to_vec())),
            MSG_DATA_AMF0 => Ok(RtmpMessage::DataAmf0(RtmpData::decode(payload)?)),
            MSG_COMMAND_AMF0 => Ok(RtmpMessage::CommandAmf0(RtmpCommand::decode(payload)?)),
            other => Ok(RtmpMessage::Unknown {
                type_id: other,
                payload: payload.to_vec(),
            }),
        }
    }

    /// Wraps the message into a RawMessage on its default chunk stream
    pub fn into_raw(self, message_stream_id: u32, timestamp: u32) -> RawMessage {
        let chunk_stream_id = self.default_chunk_stream_id();
        self.into_raw_on(chunk_stream_id, message_stream_id, timestamp)
    }

    /// Wraps the message into a RawMessage on an explicit chunk stream
    pub fn into_raw_on(
        self,
        chunk_stream_id: u32,
        message_stream_id: u32,
        timestamp: u32,
    ) -> RawMessage {
        RawMessage {
            chunk_stream_id,
            message_stream_id,
            timestamp,
            type_id: self.type_id(),
            payload: self.encode_payload(),
        }
    }
}
