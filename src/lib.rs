// RTMP live streaming library
//
// Provides a publish client and a server accept loop for the RTMP family of
// protocols, an FLV muxer/demuxer for the tag format RTMP carries in its
// audio and video messages, and the AMF0 value codec used by RTMP command
// messages and FLV script tags.

pub mod amf;
pub mod client;
pub mod connection;
pub mod error;
pub mod flv;
pub mod log;
pub mod rtmp;
pub mod server;
pub mod session;
pub mod transport;
pub mod utils;

pub use error::RtmpError;
