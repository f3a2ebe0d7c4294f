// RTMP constants

// Chunk header formats
pub const CHUNK_TYPE_0: u8 = 0; // 11 bytes: timestamp(3) + length(3) + type(1) + stream id(4)
pub const CHUNK_TYPE_1: u8 = 1; // 7 bytes: delta(3) + length(3) + type(1)
pub const CHUNK_TYPE_2: u8 = 2; // 3 bytes: delta(3)
pub const CHUNK_TYPE_3: u8 = 3; // 0 bytes

// Default chunk stream assignment
pub const CSID_PROTOCOL_CONTROL: u32 = 2;
pub const CSID_COMMAND: u32 = 3;
pub const CSID_AUDIO: u32 = 4;
pub const CSID_VIDEO: u32 = 5;
pub const CSID_USER_CONTROL: u32 = 6;

/// Smallest chunk stream id usable by messages
pub const MIN_CHUNK_STREAM_ID: u32 = 2;

/// Largest id reachable through the 2-byte basic header escape
pub const MAX_CHUNK_STREAM_ID: u32 = 65599;

// Message type ids
pub const MSG_SET_CHUNK_SIZE: u8 = 1;
pub const MSG_ABORT: u8 = 2;
pub const MSG_ACK: u8 = 3;
pub const MSG_USER_CONTROL: u8 = 4;
pub const MSG_WINDOW_ACK_SIZE: u8 = 5;
pub const MSG_SET_PEER_BANDWIDTH: u8 = 6;
pub const MSG_AUDIO: u8 = 8;
pub const MSG_VIDEO: u8 = 9;
pub const MSG_DATA_AMF3: u8 = 15;
pub const MSG_COMMAND_AMF3: u8 = 17;
pub const MSG_DATA_AMF0: u8 = 18;
pub const MSG_COMMAND_AMF0: u8 = 20;
pub const MSG_AGGREGATE: u8 = 22;

/// Message stream id of connection-level control traffic
pub const CONTROL_MESSAGE_STREAM_ID: u32 = 0;

// Chunk sizes
pub const DEFAULT_CHUNK_SIZE: usize = 128;
pub const MIN_CHUNK_SIZE: usize = 1;
pub const MAX_CHUNK_SIZE: usize = 0x00FF_FFFF;

/// Timestamps at or above this value move into the extended field
pub const EXTENDED_TIMESTAMP: u32 = 0x00FF_FFFF;

// Flow control defaults
pub const DEFAULT_WINDOW_ACK_SIZE: u32 = 2_500_000;
pub const DEFAULT_PEER_BANDWIDTH: u32 = 2_500_000;

// Handshake
pub const RTMP_VERSION: u8 = 3;
pub const HANDSHAKE_SIZE: usize = 1536;
pub const HANDSHAKE_RANDOM_SIZE: usize = HANDSHAKE_SIZE - 8;

// Values advertised in connect exchanges
pub const SERVER_FMS_VERSION: &str = "FMS/3,0,1,123";
pub const CAPABILITIES: f64 = 239.0;
