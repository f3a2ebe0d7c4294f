// RTMP wire protocol: chunking, handshake, messages and commands

mod chunk;
mod chunk_read;
mod chunk_write;
mod command;
mod constants;
mod data;
mod handshake;
mod messages;
mod user_control;

pub use chunk::*;
pub use chunk_read::*;
pub use chunk_write::*;
pub use command::*;
pub use constants::*;
pub use data::*;
pub use handshake::*;
pub use messages::*;
pub use user_control::*;
