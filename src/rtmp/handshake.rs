// RTMP handshake
//
// The simple, non-digest exchange: C0/C1/C2 against S0/S1/S2. Each
// 1536-byte block is 4 bytes of time, 4 zero bytes and 1528 random
// bytes; each side proves liveness by echoing the other's block.

use std::time::Duration;

use chrono::Utc;
use rand::{rngs::StdRng, RngCore, SeedableRng};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::log::Logger;
use crate::{log_debug, RtmpError};

use super::{HANDSHAKE_SIZE, RTMP_VERSION};

/// Builds a C1/S1 block: time, four zero bytes, random fill
fn build_handshake_block() -> [u8; HANDSHAKE_SIZE] {
    let mut block = [0; HANDSHAKE_SIZE];

    let now = Utc::now().timestamp_millis() as u32;
    block[0..4].copy_from_slice(&now.to_be_bytes());

    let mut rng = StdRng::from_os_rng();
    rng.fill_bytes(&mut block[8..]);

    block
}

/// True when the echoed block matches the original outside the 8-byte
/// time prefix the peer is allowed to rewrite
fn echo_matches(original: &[u8], echo: &[u8]) -> bool {
    original[8..] == echo[8..]
}

async fn read_full<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut [u8],
    deadline: Duration,
) -> Result<(), RtmpError> {
    match timeout(deadline, stream.read_exact(buf)).await {
        Ok(result) => {
            result?;
            Ok(())
        }
        Err(_) => Err(RtmpError::TimeoutElapsed("handshake".to_string())),
    }
}

/// Performs the client side of the handshake
/// stream - Transport to handshake over
/// deadline - Per-read timeout
/// logger - Connection logger
pub async fn client_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    deadline: Duration,
    logger: &Logger,
) -> Result<(), RtmpError> {
    let c1 = build_handshake_block();

    let mut opening = Vec::with_capacity(1 + HANDSHAKE_SIZE);
    opening.push(RTMP_VERSION);
    opening.extend_from_slice(&c1);

    stream.write_all(&opening).await?;
    stream.flush().await?;

    let mut s0 = [0; 1];
    read_full(stream, &mut s0, deadline).await?;

    if s0[0] != RTMP_VERSION {
        return Err(RtmpError::protocol(format!(
            "server requested RTMP version {}, only {} is supported",
            s0[0], RTMP_VERSION
        )));
    }

    let mut s1 = [0; HANDSHAKE_SIZE];
    read_full(stream, &mut s1, deadline).await?;

    // C2 echoes S1
    stream.write_all(&s1).await?;
    stream.flush().await?;

    let mut s2 = [0; HANDSHAKE_SIZE];
    read_full(stream, &mut s2, deadline).await?;

    if !echo_matches(&c1, &s2) {
        return Err(RtmpError::protocol(
            "handshake echo mismatch: S2 does not match C1",
        ));
    }

    log_debug!(logger, "Handshake completed (client side)");

    Ok(())
}

/// Performs the server side of the handshake
/// stream - Accepted transport to handshake over
/// deadline - Per-read timeout
/// logger - Session logger
pub async fn server_handshake<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    deadline: Duration,
    logger: &Logger,
) -> Result<(), RtmpError> {
    let mut c0 = [0; 1];
    read_full(stream, &mut c0, deadline).await?;

    if c0[0] != RTMP_VERSION {
        return Err(RtmpError::protocol(format!(
            "client requested RTMP version {}, only {} is supported",
            c0[0], RTMP_VERSION
        )));
    }

    let mut c1 = [0; HANDSHAKE_SIZE];
    read_full(stream, &mut c1, deadline).await?;

    let s1 = build_handshake_block();

    // S2 echoes C1 with the server time in the first 4 bytes
    let mut s2 = c1;
    let now = Utc::now().timestamp_millis() as u32;
    s2[0..4].copy_from_slice(&now.to_be_bytes());

    let mut response = Vec::with_capacity(1 + 2 * HANDSHAKE_SIZE);
    response.push(RTMP_VERSION);
    response.extend_from_slice(&s1);
    response.extend_from_slice(&s2);

    stream.write_all(&response).await?;
    stream.flush().await?;

    let mut c2 = [0; HANDSHAKE_SIZE];
    read_full(stream, &mut c2, deadline).await?;

    if !echo_matches(&s1, &c2) {
        return Err(RtmpError::protocol(
            "handshake echo mismatch: C2 does not match S1",
        ));
    }

    log_debug!(logger, "Handshake completed (server side)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_DEADLINE: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn test_client_server_handshake() {
        let (mut client_side, mut server_side) = tokio::io::duplex(8192);

        let server = tokio::spawn(async move {
            server_handshake(&mut server_side, TEST_DEADLINE, &Logger::new_disabled()).await
        });

        client_handshake(&mut client_side, TEST_DEADLINE, &Logger::new_disabled())
            .await
            .unwrap();

        server.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_bad_server_version_rejected() {
        let (mut client_side, mut server_side) = tokio::io::duplex(8192);

        tokio::spawn(async move {
            let mut sink = vec![0; 1 + HANDSHAKE_SIZE];
            server_side.read_exact(&mut sink).await.unwrap();

            // Version 6 (RTMPE) instead of 3
            let mut response = vec![6u8];
            response.extend_from_slice(&[0; 2 * HANDSHAKE_SIZE]);
            server_side.write_all(&response).await.unwrap();
        });

        let result =
            client_handshake(&mut client_side, TEST_DEADLINE, &Logger::new_disabled()).await;

        assert!(matches!(result, Err(RtmpError::ProtocolError(_))));
    }

    #[tokio::test]
    async fn test_corrupted_echo_rejected() {
        let (mut client_side, mut server_side) = tokio::io::duplex(8192);

        tokio::spawn(async move {
            let mut opening = vec![0; 1 + HANDSHAKE_SIZE];
            server_side.read_exact(&mut opening).await.unwrap();

            let s1 = build_handshake_block();

            // S2 claims to echo C1 but flips a random byte
            let mut s2 = [0u8; HANDSHAKE_SIZE];
            s2.copy_from_slice(&opening[1..]);
            s2[100] ^= 0xFF;

            let mut response = vec![RTMP_VERSION];
            response.extend_from_slice(&s1);
            response.extend_from_slice(&s2);
            server_side.write_all(&response).await.unwrap();

            let mut c2 = [0; HANDSHAKE_SIZE];
            let _ = server_side.read_exact(&mut c2).await;
        });

        let result =
            client_handshake(&mut client_side, TEST_DEADLINE, &Logger::new_disabled()).await;

        assert!(matches!(result, Err(RtmpError::ProtocolError(_))));
    }

    #[tokio::test]
    async fn test_handshake_timeout() {
        let (mut client_side, _server_side) = tokio::io::duplex(8192);

        let result = client_handshake(
            &mut client_side,
            Duration::from_millis(50),
            &Logger::new_disabled(),
        )
        .await;

        assert!(matches!(result, Err(RtmpError::TimeoutElapsed(_))));
    }
}
