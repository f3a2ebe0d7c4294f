// RTMP server

mod config;
mod handler;
mod server;
mod stream_id;
mod tls;

pub use config::*;
pub use handler::*;
pub use server::*;
pub use stream_id::*;
pub use tls::*;
