// Raw TCP transport

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::RtmpError;
use crate::log::Logger;
use crate::log_debug;

/// Connects a plain TCP transport (rtmp://)
pub async fn connect_tcp(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    logger: &Logger,
) -> Result<TcpStream, RtmpError> {
    let address = format!("{}:{}", host, port);

    log_debug!(logger, format!("Connecting to {}", address));

    let stream = match timeout(connect_timeout, TcpStream::connect(&address)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(RtmpError::TimeoutElapsed(format!(
                "tcp connect to {}",
                address
            )))
        }
    };

    stream.set_nodelay(true)?;

    Ok(stream)
}
