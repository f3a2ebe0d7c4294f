// HTTP tunneling transport (rtmpt / rtmpte / rtmpts)
//
// RTMP bytes ride inside POST requests: send/{session}/{seq} carries
// outgoing data, idle/{session}/{seq} polls for incoming data, and the
// first byte of every response (a polling interval hint) is discarded
// before the rest is fed to the RTMP parser.

use std::io;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::time::timeout;

use crate::error::RtmpError;
use crate::log::Logger;
use crate::log_debug;

use super::BoxedTransport;

const FCS_CONTENT_TYPE: &str = "application/x-fcs";

/// How long the driver waits for outgoing bytes before it polls with
/// an idle request instead
const POLL_INTERVAL: Duration = Duration::from_millis(250);

fn tunnel_error(error: reqwest::Error) -> RtmpError {
    RtmpError::Io(io::Error::other(format!("tunnel request failed: {}", error)))
}

async fn post(client: &reqwest::Client, url: &str, body: Vec<u8>) -> Result<Vec<u8>, RtmpError> {
    let response = client
        .post(url)
        .header(CONTENT_TYPE, FCS_CONTENT_TYPE)
        .body(body)
        .send()
        .await
        .map_err(tunnel_error)?;

    if !response.status().is_success() {
        return Err(RtmpError::protocol(format!(
            "tunnel endpoint {} answered {}",
            url,
            response.status()
        )));
    }

    let mut stream = response.bytes_stream();
    let mut out = Vec::new();

    while let Some(chunk) = stream.next().await {
        out.extend_from_slice(&chunk.map_err(tunnel_error)?);
    }

    Ok(out)
}

/// Opens an HTTP tunnel and returns a byte-stream transport over it
pub async fn connect_tunnel(
    host: &str,
    port: u16,
    secure: bool,
    logger: &Logger,
) -> Result<BoxedTransport, RtmpError> {
    let client = reqwest::Client::new();

    let base = format!(
        "{}://{}:{}",
        if secure { "https" } else { "http" },
        host,
        port
    );

    // Identification probe; servers commonly answer 404 and that is fine
    let _ = post(&client, &format!("{}/fcs/ident2", base), Vec::new()).await;

    let open = post(&client, &format!("{}/open/1", base), Vec::new()).await?;
    let session_id = String::from_utf8_lossy(&open).trim().to_string();

    if session_id.is_empty() {
        return Err(RtmpError::protocol("tunnel open returned no session id"));
    }

    log_debug!(logger, format!("Tunnel session {} open", session_id));

    let (user_side, driver_side) = tokio::io::duplex(64 * 1024);

    let driver_logger = logger.make_child_logger("[tunnel] ");
    tokio::spawn(drive_tunnel(
        client,
        base,
        session_id,
        driver_side,
        driver_logger,
    ));

    Ok(Box::new(user_side))
}

/// Shuttles bytes between the duplex pipe and the HTTP session until
/// either side goes away
async fn drive_tunnel(
    client: reqwest::Client,
    base: String,
    session_id: String,
    mut pipe: DuplexStream,
    logger: Logger,
) {
    let mut sequence: u64 = 1;
    let mut buf = vec![0u8; 16 * 1024];

    loop {
        let outgoing = match timeout(POLL_INTERVAL, pipe.read(&mut buf)).await {
            // Local side closed: tear the session down
            Ok(Ok(0)) | Ok(Err(_)) => {
                let _ = post(
                    &client,
                    &format!("{}/close/{}", base, session_id),
                    Vec::new(),
                )
                .await;
                return;
            }
            Ok(Ok(n)) => &buf[..n],
            // Nothing to send: poll with an idle request
            Err(_) => &[][..],
        };

        let url = if outgoing.is_empty() {
            format!("{}/idle/{}/{}", base, session_id, sequence)
        } else {
            format!("{}/send/{}/{}", base, session_id, sequence)
        };

        sequence += 1;

        match post(&client, &url, outgoing.to_vec()).await {
            Ok(body) => {
                // Skip the interval byte, forward the rest
                if body.len() > 1 && pipe.write_all(&body[1..]).await.is_err() {
                    let _ = post(
                        &client,
                        &format!("{}/close/{}", base, session_id),
                        Vec::new(),
                    )
                    .await;
                    return;
                }
            }
            Err(e) => {
                log_debug!(logger, format!("Tunnel request failed: {}", e));
                return;
            }
        }
    }
}
