// Transport adapters: TCP, TLS and HTTP tunneling

mod tcp;
mod tls;
mod tunnel;
mod url;

pub use tcp::*;
pub use tls::*;
pub use tunnel::*;
pub use url::*;

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::RtmpError;
use crate::log::Logger;

/// The byte-stream contract every transport satisfies
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TransportStream for T {}

/// A connected transport, ready for the handshake
pub type BoxedTransport = Box<dyn TransportStream>;

/// Connects to the endpoint an RTMP URL names, picking the adapter
/// its scheme requires
pub async fn connect(
    url: &RtmpUrl,
    connect_timeout: Duration,
    logger: &Logger,
) -> Result<BoxedTransport, RtmpError> {
    match url.scheme {
        RtmpScheme::Rtmp => {
            let stream = connect_tcp(&url.host, url.port, connect_timeout, logger).await?;
            Ok(Box::new(stream))
        }
        RtmpScheme::Rtmps => {
            let stream = connect_tls(&url.host, url.port, connect_timeout, logger).await?;
            Ok(Box::new(stream))
        }
        RtmpScheme::Rtmpt | RtmpScheme::Rtmpte => {
            connect_tunnel(&url.host, url.port, false, logger).await
        }
        RtmpScheme::Rtmpts => connect_tunnel(&url.host, url.port, true, logger).await,
    }
}
