// Chunk read logic

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::RtmpError;

use super::{
    ChunkStreamRecord, RawMessage, CHUNK_TYPE_0, CHUNK_TYPE_1, CHUNK_TYPE_2, DEFAULT_CHUNK_SIZE,
    EXTENDED_TIMESTAMP, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

/// Per-chunk-stream reassembly state
struct ChunkReadState {
    /// Absolute timestamp of the message being assembled
    timestamp: u32,

    /// Last timestamp delta, reused by type 3 message repeats
    timestamp_delta: u32,

    message_stream_id: u32,
    type_id: u8,
    length: usize,

    /// The last header carried an extended timestamp
    extended: bool,

    /// The last header's inline time value, absolute or delta
    time_field: u32,

    /// Payload collected so far
    buffer: Vec<u8>,
}

/// Reads chunks off a transport and reassembles messages
///
/// Owns the per-chunk-stream history for the read direction, plus the
/// connection's total-bytes-read counter that acknowledgements report.
pub struct ChunkReader {
    chunk_size: usize,
    streams: HashMap<u32, ChunkReadState>,
    total_bytes_read: u64,
}

impl Default for ChunkReader {
    fn default() -> ChunkReader {
        ChunkReader::new()
    }
}

impl ChunkReader {
    pub fn new() -> ChunkReader {
        ChunkReader {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
            total_bytes_read: 0,
        }
    }

    /// Current incoming chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Applies a SET_CHUNK_SIZE received from the peer.
    /// Takes effect at the next chunk boundary.
    pub fn set_chunk_size(&mut self, size: usize) -> Result<(), RtmpError> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&size) {
            return Err(RtmpError::protocol(format!(
                "chunk size {} is outside {}..={}",
                size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            )));
        }

        self.chunk_size = size;
        Ok(())
    }

    /// Total bytes consumed from the transport, the value reported in
    /// acknowledgements
    pub fn total_bytes_read(&self) -> u64 {
        self.total_bytes_read
    }

    /// Last message state for a chunk stream
    pub fn last_received(&self, chunk_stream_id: u32) -> Option<ChunkStreamRecord> {
        self.streams
            .get(&chunk_stream_id)
            .map(|s| ChunkStreamRecord {
                timestamp: s.timestamp,
                message_stream_id: s.message_stream_id,
                type_id: s.type_id,
                length: s.length,
            })
    }

    /// Discards a partially assembled message (ABORT semantics)
    pub fn abort(&mut self, chunk_stream_id: u32) {
        if let Some(state) = self.streams.get_mut(&chunk_stream_id) {
            state.buffer.clear();
        }
    }

    /// Reads chunks until a complete message is assembled
    pub async fn read_message<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<RawMessage, RtmpError> {
        loop {
            if let Some(message) = self.read_chunk(reader).await? {
                return Ok(message);
            }
        }
    }

    /// Reads one chunk; returns a message when it completes one
    async fn read_chunk<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<Option<RawMessage>, RtmpError> {
        let first = self.read_u8(reader).await?;
        let format = first >> 6;

        let chunk_stream_id = match first & 0x3F {
            0 => 64 + self.read_u8(reader).await? as u32,
            1 => {
                let low = self.read_u8(reader).await? as u32;
                let high = self.read_u8(reader).await? as u32;
                64 + low + (high << 8)
            }
            id => id as u32,
        };

        // Bytes of this chunk's payload consumed while disambiguating
        // the type 3 extended timestamp repeat
        let mut chunk_consumed = 0;

        match format {
            CHUNK_TYPE_0 => {
                let mut header = [0; 11];
                self.read_exact(reader, &mut header).await?;

                let time = BigEndian::read_u24(&header[0..3]);
                let length = BigEndian::read_u24(&header[3..6]) as usize;
                let type_id = header[6];
                let message_stream_id =
                    u32::from_le_bytes([header[7], header[8], header[9], header[10]]);

                if length == 0 {
                    return Err(RtmpError::protocol(
                        "message length must be greater than zero",
                    ));
                }

                let extended = time == EXTENDED_TIMESTAMP;
                let time_field = if extended {
                    self.read_u32(reader).await?
                } else {
                    time
                };

                if let Some(state) = self.streams.get(&chunk_stream_id) {
                    if !state.buffer.is_empty() {
                        return Err(RtmpError::protocol(
                            "new message header interrupts an incomplete message",
                        ));
                    }
                }

                self.streams.insert(
                    chunk_stream_id,
                    ChunkReadState {
                        timestamp: time_field,
                        // A type 3 repeat after a type 0 header reuses
                        // the absolute timestamp as its delta
                        timestamp_delta: time_field,
                        message_stream_id,
                        type_id,
                        length,
                        extended,
                        time_field,
                        buffer: Vec::with_capacity(length),
                    },
                );
            }
            CHUNK_TYPE_1 | CHUNK_TYPE_2 => {
                let header_size = if format == CHUNK_TYPE_1 { 7 } else { 3 };
                let mut header = [0; 7];
                self.read_exact(reader, &mut header[..header_size]).await?;

                let delta = BigEndian::read_u24(&header[0..3]);
                let extended = delta == EXTENDED_TIMESTAMP;
                let time_field = if extended {
                    self.read_u32(reader).await?
                } else {
                    delta
                };

                let state = self.streams.get_mut(&chunk_stream_id).ok_or_else(|| {
                    RtmpError::protocol(format!(
                        "compressed header on chunk stream {} with no prior message",
                        chunk_stream_id
                    ))
                })?;

                if !state.buffer.is_empty() {
                    return Err(RtmpError::protocol(
                        "new message header interrupts an incomplete message",
                    ));
                }

                if format == CHUNK_TYPE_1 {
                    let length = BigEndian::read_u24(&header[3..6]) as usize;

                    if length == 0 {
                        return Err(RtmpError::protocol(
                            "message length must be greater than zero",
                        ));
                    }

                    state.length = length;
                    state.type_id = header[6];
                }

                state.timestamp = state.timestamp.wrapping_add(time_field);
                state.timestamp_delta = time_field;
                state.extended = extended;
                state.time_field = time_field;
                state.buffer = Vec::with_capacity(state.length);
            }
            _ => {
                // Type 3: either a continuation of a partial message or
                // a full header repeat starting a new message
                let (expected_extension, starts_message) = {
                    let state = self.streams.get(&chunk_stream_id).ok_or_else(|| {
                        RtmpError::protocol(format!(
                            "continuation chunk on chunk stream {} with no prior message",
                            chunk_stream_id
                        ))
                    })?;

                    (
                        state.extended.then_some(state.time_field),
                        state.buffer.is_empty(),
                    )
                };

                // Peers differ on whether the 4-byte extension repeats
                // on type 3 chunks. Read it and compare: a mismatch
                // means the peer skipped it and these are payload bytes.
                let mut presumed_payload: Option<[u8; 4]> = None;

                if let Some(expected) = expected_extension {
                    let mut probe = [0; 4];
                    self.read_exact(reader, &mut probe).await?;

                    if BigEndian::read_u32(&probe) != expected {
                        presumed_payload = Some(probe);
                    }
                }

                let state = match self.streams.get_mut(&chunk_stream_id) {
                    Some(state) => state,
                    None => {
                        return Err(RtmpError::protocol(
                            "chunk stream state disappeared mid-read",
                        ))
                    }
                };

                if starts_message {
                    state.timestamp = state.timestamp.wrapping_add(state.timestamp_delta);
                }

                if let Some(probe) = presumed_payload {
                    // The probe bytes count against this chunk's share
                    // of the payload, so the chunk must be big enough
                    // to hold them
                    let remaining = state.length - state.buffer.len();

                    if remaining < probe.len() || self.chunk_size < probe.len() {
                        return Err(RtmpError::protocol(
                            "type 3 chunk is too small for its presumed payload",
                        ));
                    }

                    state.buffer.extend_from_slice(&probe);
                    chunk_consumed = probe.len();
                }
            }
        }

        self.read_payload(reader, chunk_stream_id, chunk_consumed).await
    }

    /// Reads the rest of one chunk's payload share for the given stream
    async fn read_payload<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        chunk_stream_id: u32,
        chunk_consumed: usize,
    ) -> Result<Option<RawMessage>, RtmpError> {
        let remaining = {
            let state = match self.streams.get(&chunk_stream_id) {
                Some(state) => state,
                None => {
                    return Err(RtmpError::protocol(
                        "chunk stream state disappeared mid-read",
                    ))
                }
            };

            state.length - state.buffer.len()
        };

        let to_read = remaining.min(self.chunk_size - chunk_consumed);

        let mut data = vec![0; to_read];
        self.read_exact(reader, &mut data).await?;

        let state = match self.streams.get_mut(&chunk_stream_id) {
            Some(state) => state,
            None => {
                return Err(RtmpError::protocol(
                    "chunk stream state disappeared mid-read",
                ))
            }
        };

        state.buffer.extend_from_slice(&data);

        if state.buffer.len() < state.length {
            return Ok(None);
        }

        let payload = std::mem::take(&mut state.buffer);

        Ok(Some(RawMessage {
            chunk_stream_id,
            message_stream_id: state.message_stream_id,
            timestamp: state.timestamp,
            type_id: state.type_id,
            payload,
        }))
    }

    async fn read_u8<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<u8, RtmpError> {
        let mut buf = [0; 1];
        self.read_exact(reader, &mut buf).await?;
        Ok(buf[0])
    }

    async fn read_u32<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<u32, RtmpError> {
        let mut buf = [0; 4];
        self.read_exact(reader, &mut buf).await?;
        Ok(BigEndian::read_u32(&buf))
    }

    async fn read_exact<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
        buf: &mut [u8],
    ) -> Result<(), RtmpError> {
        reader.read_exact(buf).await?;
        self.total_bytes_read += buf.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::Logger;
    use crate::rtmp::{ChunkWriter, MSG_AUDIO, MSG_VIDEO};

    fn message(csid: u32, msid: u32, timestamp: u32, type_id: u8, payload: Vec<u8>) -> RawMessage {
        RawMessage {
            chunk_stream_id: csid,
            message_stream_id: msid,
            timestamp,
            type_id,
            payload,
        }
    }

    async fn round_trip_with_chunk_size(messages: Vec<RawMessage>, chunk_size: usize) {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(chunk_size).unwrap();

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(chunk_size).unwrap();

        let mut wire = Vec::new();

        for msg in &messages {
            writer
                .encode(msg, &Logger::new_disabled(), &mut wire)
                .unwrap();
        }

        let mut cursor = &wire[..];

        for expected in &messages {
            let decoded = reader.read_message(&mut cursor).await.unwrap();
            assert_eq!(&decoded, expected);
        }
    }

    #[tokio::test]
    async fn test_round_trip_across_chunk_sizes() {
        for chunk_size in [1usize, 64, 128, 4096, MAX_CHUNK_SIZE] {
            round_trip_with_chunk_size(
                vec![
                    message(3, 1, 0, MSG_VIDEO, vec![0x11; 300]),
                    message(3, 1, 40, MSG_VIDEO, vec![0x22; 300]),
                    message(4, 1, 40, MSG_AUDIO, vec![0x33; 10]),
                    message(3, 1, 80, MSG_VIDEO, vec![0x44; 17]),
                ],
                chunk_size,
            )
            .await;
        }
    }

    #[tokio::test]
    async fn test_round_trip_extended_timestamps() {
        round_trip_with_chunk_size(
            vec![
                message(3, 1, 0x0100_0000, MSG_VIDEO, vec![0x01; 500]),
                message(3, 1, 0x0100_0000 + 40, MSG_VIDEO, vec![0x02; 500]),
            ],
            128,
        )
        .await;
    }

    #[tokio::test]
    async fn test_round_trip_high_chunk_stream_ids() {
        round_trip_with_chunk_size(
            vec![
                message(200, 1, 10, MSG_AUDIO, vec![0x0A; 5]),
                message(65599, 1, 10, MSG_AUDIO, vec![0x0B; 5]),
            ],
            128,
        )
        .await;
    }

    #[tokio::test]
    async fn test_interleaved_streams() {
        // Video fragments and an audio message interleave on
        // different chunk streams
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4).unwrap();

        let mut wire = Vec::new();
        writer
            .encode(
                &message(5, 1, 100, MSG_VIDEO, vec![1, 2, 3, 4, 5, 6]),
                &Logger::new_disabled(),
                &mut wire,
            )
            .unwrap();
        writer
            .encode(
                &message(4, 1, 100, MSG_AUDIO, vec![9, 9]),
                &Logger::new_disabled(),
                &mut wire,
            )
            .unwrap();

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4).unwrap();

        let mut cursor = &wire[..];
        let first = reader.read_message(&mut cursor).await.unwrap();
        let second = reader.read_message(&mut cursor).await.unwrap();

        assert_eq!(first.type_id, MSG_VIDEO);
        assert_eq!(first.payload, vec![1, 2, 3, 4, 5, 6]);
        assert_eq!(second.type_id, MSG_AUDIO);
    }

    #[tokio::test]
    async fn test_zero_length_rejected() {
        // Hand-built type 0 header claiming length 0
        let wire: Vec<u8> = vec![
            0x03, // fmt 0, csid 3
            0x00, 0x00, 0x00, // timestamp
            0x00, 0x00, 0x00, // length 0
            0x09, // type
            0x01, 0x00, 0x00, 0x00, // stream id
        ];

        let mut reader = ChunkReader::new();
        let mut cursor = &wire[..];

        assert!(matches!(
            reader.read_message(&mut cursor).await,
            Err(RtmpError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_compressed_header_without_history_rejected() {
        let wire: Vec<u8> = vec![
            0x83, // fmt 2, csid 3
            0x00, 0x00, 0x28,
        ];

        let mut reader = ChunkReader::new();
        let mut cursor = &wire[..];

        assert!(matches!(
            reader.read_message(&mut cursor).await,
            Err(RtmpError::ProtocolError(_))
        ));
    }

    #[tokio::test]
    async fn test_type_3_without_extension_repeat_tolerated() {
        // A peer that does not repeat the extension on continuations:
        // build the wire by hand. Message of 8 bytes, chunk size 4,
        // extended timestamp.
        let mut wire: Vec<u8> = vec![0x03];
        wire.extend_from_slice(&[0xFF, 0xFF, 0xFF]); // escape to extended
        wire.extend_from_slice(&[0x00, 0x00, 0x08]); // length 8
        wire.push(MSG_VIDEO);
        wire.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // stream id 1
        wire.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]); // extension
        wire.extend_from_slice(&[1, 2, 3, 4]); // first chunk
        wire.push(0xC3); // continuation, extension NOT repeated
        wire.extend_from_slice(&[5, 6, 7, 8]);

        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4).unwrap();

        let mut cursor = &wire[..];
        let msg = reader.read_message(&mut cursor).await.unwrap();

        assert_eq!(msg.timestamp, 0x0100_0000);
        assert_eq!(msg.payload, vec![1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_type_3_with_extension_repeat() {
        // Our own writer repeats the extension on every continuation
        round_trip_with_chunk_size(
            vec![message(3, 1, 0x0100_0000, MSG_VIDEO, vec![0x42; 9])],
            4,
        )
        .await;
    }

    #[tokio::test]
    async fn test_type_3_new_message_reuses_delta() {
        // Two equal-sized messages, the second sent as a bare type 3
        // header: the timestamp advances by the stored delta
        let mut wire: Vec<u8> = vec![0x03];
        wire.extend_from_slice(&[0x00, 0x00, 0x64]); // timestamp 100
        wire.extend_from_slice(&[0x00, 0x00, 0x02]); // length 2
        wire.push(MSG_AUDIO);
        wire.extend_from_slice(&[0x01, 0x00, 0x00, 0x00]);
        wire.extend_from_slice(&[0xAA, 0xBB]);
        wire.push(0xC3);
        wire.extend_from_slice(&[0xCC, 0xDD]);

        let mut reader = ChunkReader::new();
        let mut cursor = &wire[..];

        let first = reader.read_message(&mut cursor).await.unwrap();
        let second = reader.read_message(&mut cursor).await.unwrap();

        assert_eq!(first.timestamp, 100);
        assert_eq!(second.timestamp, 200);
        assert_eq!(second.payload, vec![0xCC, 0xDD]);
    }

    #[tokio::test]
    async fn test_abort_discards_partial_message() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4).unwrap();

        let mut wire = Vec::new();
        writer
            .encode(
                &message(3, 1, 0, MSG_VIDEO, vec![1, 2, 3, 4, 5, 6, 7, 8]),
                &Logger::new_disabled(),
                &mut wire,
            )
            .unwrap();

        // Feed only the first chunk (basic + header + 4 payload bytes)
        let mut reader = ChunkReader::new();
        reader.set_chunk_size(4).unwrap();

        let mut cursor = &wire[..16];
        assert!(reader.read_chunk(&mut cursor).await.unwrap().is_none());

        reader.abort(3);

        // A fresh message on the same stream parses cleanly
        let mut wire2 = Vec::new();
        let mut writer2 = ChunkWriter::new();
        writer2.set_chunk_size(4).unwrap();
        writer2
            .encode(
                &message(3, 1, 50, MSG_AUDIO, vec![0xEE; 2]),
                &Logger::new_disabled(),
                &mut wire2,
            )
            .unwrap();

        let mut cursor2 = &wire2[..];
        let msg = reader.read_message(&mut cursor2).await.unwrap();
        assert_eq!(msg.payload, vec![0xEE; 2]);
    }

    #[tokio::test]
    async fn test_bytes_read_counted() {
        let mut writer = ChunkWriter::new();
        let mut wire = Vec::new();
        writer
            .encode(
                &message(3, 1, 0, MSG_VIDEO, vec![0x01; 10]),
                &Logger::new_disabled(),
                &mut wire,
            )
            .unwrap();

        let mut reader = ChunkReader::new();
        let mut cursor = &wire[..];
        reader.read_message(&mut cursor).await.unwrap();

        assert_eq!(reader.total_bytes_read(), wire.len() as u64);
    }
}
