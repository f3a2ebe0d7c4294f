// Chunk write logic

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::log::Logger;
use crate::{log_warning, RtmpError};

use super::{
    encode_basic_header, validate_chunk_stream_id, ChunkStreamRecord, RawMessage, CHUNK_TYPE_0,
    CHUNK_TYPE_1, CHUNK_TYPE_2, CHUNK_TYPE_3, DEFAULT_CHUNK_SIZE, EXTENDED_TIMESTAMP,
    MAX_CHUNK_SIZE, MIN_CHUNK_SIZE,
};

/// Serializes messages into chunks
///
/// Owns the per-chunk-stream history backing header compression. A
/// connection has exactly one writer, so the map is never shared.
pub struct ChunkWriter {
    chunk_size: usize,
    streams: HashMap<u32, ChunkStreamRecord>,
    total_bytes_written: u64,
}

impl Default for ChunkWriter {
    fn default() -> ChunkWriter {
        ChunkWriter::new()
    }
}

impl ChunkWriter {
    pub fn new() -> ChunkWriter {
        ChunkWriter {
            chunk_size: DEFAULT_CHUNK_SIZE,
            streams: HashMap::new(),
            total_bytes_written: 0,
        }
    }

    /// Total bytes confirmed on the transport
    pub fn total_bytes_written(&self) -> u64 {
        self.total_bytes_written
    }

    /// Records bytes the transport accepted
    pub fn record_written(&mut self, count: u64) {
        self.total_bytes_written += count;
    }

    /// Current outgoing chunk size
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Changes the outgoing chunk size.
    /// Callers must apply this only after the announcing
    /// SET_CHUNK_SIZE message is fully on the wire.
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

    /// Last message recorded for a chunk stream
    pub fn last_sent(&self, chunk_stream_id: u32) -> Option<&ChunkStreamRecord> {
        self.streams.get(&chunk_stream_id)
    }

    /// Serializes a message into one or more chunks
    ///
    /// Picks the smallest header the per-stream history allows: type 2
    /// when type and length repeat, type 1 when only the stream id
    /// repeats, type 0 otherwise. Out-of-order timestamps force an
    /// absolute (type 0) header.
    pub fn encode(
        &mut self,
        message: &RawMessage,
        logger: &Logger,
        out: &mut Vec<u8>,
    ) -> Result<(), RtmpError> {
        validate_chunk_stream_id(message.chunk_stream_id)?;

        if message.payload.is_empty() {
            return Err(RtmpError::protocol(
                "message length must be greater than zero",
            ));
        }

        let last = self.streams.get(&message.chunk_stream_id);

        let format = match last {
            None => CHUNK_TYPE_0,
            Some(last) => {
                if last.timestamp > message.timestamp {
                    log_warning!(
                        logger,
                        format!(
                            "timestamp went backwards on chunk stream {} ({} -> {}), forcing an absolute header",
                            message.chunk_stream_id, last.timestamp, message.timestamp
                        )
                    );
                    CHUNK_TYPE_0
                } else if last.message_stream_id != message.message_stream_id {
                    CHUNK_TYPE_0
                } else if last.type_id == message.type_id
                    && last.length == message.payload.len()
                {
                    CHUNK_TYPE_2
                } else {
                    CHUNK_TYPE_1
                }
            }
        };

        // Absolute timestamp for type 0, delta for the compressed forms
        let time_field = match format {
            CHUNK_TYPE_0 => message.timestamp,
            _ => match last {
                Some(last) => message.timestamp - last.timestamp,
                None => message.timestamp,
            },
        };

        let extended = time_field >= EXTENDED_TIMESTAMP;

        encode_basic_header(format, message.chunk_stream_id, out);
        self.encode_message_header(format, time_field, message, out);

        if extended {
            let mut ext = [0; 4];
            BigEndian::write_u32(&mut ext, time_field);
            out.extend_from_slice(&ext);
        }

        // Payload, fragmented at the chunk size with type 3
        // continuations. The extended timestamp is repeated after
        // every continuation header so readers need not track whether
        // the extension is in effect.
        let mut offset = 0;

        while offset < message.payload.len() {
            if offset > 0 {
                encode_basic_header(CHUNK_TYPE_3, message.chunk_stream_id, out);

                if extended {
                    let mut ext = [0; 4];
                    BigEndian::write_u32(&mut ext, time_field);
                    out.extend_from_slice(&ext);
                }
            }

            let end = (offset + self.chunk_size).min(message.payload.len());
            out.extend_from_slice(&message.payload[offset..end]);
            offset = end;
        }

        self.streams.insert(
            message.chunk_stream_id,
            ChunkStreamRecord {
                timestamp: message.timestamp,
                message_stream_id: message.message_stream_id,
                type_id: message.type_id,
                length: message.payload.len(),
            },
        );

        Ok(())
    }

    fn encode_message_header(
        &self,
        format: u8,
        time_field: u32,
        message: &RawMessage,
        out: &mut Vec<u8>,
    ) {
        if format <= CHUNK_TYPE_2 {
            let mut time = [0; 3];
            BigEndian::write_u24(&mut time, time_field.min(EXTENDED_TIMESTAMP));
            out.extend_from_slice(&time);
        }

        if format <= CHUNK_TYPE_1 {
            let mut length = [0; 3];
            BigEndian::write_u24(&mut length, message.payload.len() as u32);
            out.extend_from_slice(&length);
            out.push(message.type_id);
        }

        if format == CHUNK_TYPE_0 {
            let mut stream_id = [0; 4];
            LittleEndian::write_u32(&mut stream_id, message.message_stream_id);
            out.extend_from_slice(&stream_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rtmp::MSG_VIDEO;

    fn message(csid: u32, msid: u32, timestamp: u32, payload: Vec<u8>) -> RawMessage {
        RawMessage {
            chunk_stream_id: csid,
            message_stream_id: msid,
            timestamp,
            type_id: MSG_VIDEO,
            payload,
        }
    }

    fn encode(writer: &mut ChunkWriter, msg: &RawMessage) -> Vec<u8> {
        let mut out = Vec::new();
        writer
            .encode(msg, &Logger::new_disabled(), &mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_first_message_uses_type_0() {
        let mut writer = ChunkWriter::new();
        let out = encode(&mut writer, &message(3, 1, 100, vec![0xAB; 4]));

        assert_eq!(out[0], 0x03);
        // timestamp 100
        assert_eq!(&out[1..4], &[0, 0, 100]);
        // length 4, type, stream id 1 little endian
        assert_eq!(&out[4..7], &[0, 0, 4]);
        assert_eq!(out[7], MSG_VIDEO);
        assert_eq!(&out[8..12], &[1, 0, 0, 0]);
        assert_eq!(&out[12..], &[0xAB; 4]);
    }

    #[test]
    fn test_repeat_message_compresses_to_type_2() {
        let mut writer = ChunkWriter::new();
        encode(&mut writer, &message(3, 1, 100, vec![1, 2, 3, 4]));
        let out = encode(&mut writer, &message(3, 1, 140, vec![5, 6, 7, 8]));

        // Type 2 header: basic byte + 3-byte delta
        assert_eq!(out[0], 0x83);
        assert_eq!(&out[1..4], &[0, 0, 40]);
        assert_eq!(&out[4..], &[5, 6, 7, 8]);
    }

    #[test]
    fn test_length_change_uses_type_1() {
        let mut writer = ChunkWriter::new();
        encode(&mut writer, &message(3, 1, 100, vec![1, 2, 3, 4]));
        let out = encode(&mut writer, &message(3, 1, 140, vec![5, 6]));

        assert_eq!(out[0], 0x43);
        assert_eq!(&out[1..4], &[0, 0, 40]);
        assert_eq!(&out[4..7], &[0, 0, 2]);
        assert_eq!(out[7], MSG_VIDEO);
    }

    #[test]
    fn test_stream_id_change_forces_type_0() {
        let mut writer = ChunkWriter::new();
        encode(&mut writer, &message(3, 1, 100, vec![1, 2]));
        let out = encode(&mut writer, &message(3, 2, 140, vec![3, 4]));

        assert_eq!(out[0] >> 6, CHUNK_TYPE_0);
    }

    #[test]
    fn test_timestamp_regression_forces_type_0() {
        let mut writer = ChunkWriter::new();
        encode(&mut writer, &message(3, 1, 100, vec![1, 2]));
        let out = encode(&mut writer, &message(3, 1, 50, vec![3, 4]));

        assert_eq!(out[0] >> 6, CHUNK_TYPE_0);
        assert_eq!(&out[1..4], &[0, 0, 50]);
    }

    #[test]
    fn test_chunk_stream_escape_bytes() {
        let mut writer = ChunkWriter::new();
        let out = encode(&mut writer, &message(200, 1, 0, vec![0x01]));

        assert_eq!(&out[0..2], &[0x00, 0x88]);
    }

    #[test]
    fn test_extended_timestamp_emitted() {
        let mut writer = ChunkWriter::new();
        let out = encode(&mut writer, &message(3, 1, 0x0100_0000, vec![0x01]));

        assert_eq!(&out[1..4], &[0xFF, 0xFF, 0xFF]);
        // 11-byte header, then 4-byte extension
        assert_eq!(&out[12..16], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(out[16], 0x01);
    }

    #[test]
    fn test_fragmentation_repeats_extension_on_type_3() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(2).unwrap();

        let out = encode(&mut writer, &message(3, 1, 0x0100_0000, vec![9, 8, 7]));

        // header(12) + ext(4) + 2 payload bytes, then the continuation
        let cont = &out[18..];
        assert_eq!(cont[0], 0xC3);
        assert_eq!(&cont[1..5], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(cont[5], 7);
    }

    #[test]
    fn test_fragmentation_at_chunk_size() {
        let mut writer = ChunkWriter::new();
        writer.set_chunk_size(4).unwrap();

        let out = encode(&mut writer, &message(3, 1, 0, vec![0x55; 10]));

        // 12 header bytes + 4 payload + C3 + 4 + C3 + 2
        assert_eq!(out.len(), 12 + 4 + 1 + 4 + 1 + 2);
        assert_eq!(out[16], 0xC3);
        assert_eq!(out[21], 0xC3);
    }

    #[test]
    fn test_zero_length_message_rejected() {
        let mut writer = ChunkWriter::new();
        let mut out = Vec::new();

        assert!(matches!(
            writer.encode(
                &message(3, 1, 0, vec![]),
                &Logger::new_disabled(),
                &mut out
            ),
            Err(RtmpError::ProtocolError(_))
        ));
    }

    #[test]
    fn test_state_reflects_last_write() {
        let mut writer = ChunkWriter::new();
        let msg = message(7, 5, 1000, vec![1, 2, 3]);
        encode(&mut writer, &msg);

        let record = writer.last_sent(7).unwrap();
        assert_eq!(record.timestamp, 1000);
        assert_eq!(record.message_stream_id, 5);
        assert_eq!(record.type_id, MSG_VIDEO);
        assert_eq!(record.length, 3);
    }
}
