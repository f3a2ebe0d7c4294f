// Session main loop

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::connection::{send_detached, spawn_writer, ConnectionCounters};
use crate::error::RtmpError;
use crate::log::Logger;
use crate::rtmp::{
    server_handshake, ChunkReader, ChunkWriter, RtmpMessage, UserControlEvent,
    CONTROL_MESSAGE_STREAM_ID, CSID_PROTOCOL_CONTROL,
};
use crate::server::{ServerConfig, SessionHandler};
use crate::{log_debug, log_trace};

use super::{handle_command, SessionContext};

/// Runs one accepted connection to completion: handshake, then the
/// read loop dispatching messages into the handler callbacks
pub async fn run_session<S, H>(
    mut stream: S,
    remote_address: String,
    session_id: u64,
    config: Arc<ServerConfig>,
    handler: Arc<H>,
    logger: Logger,
) -> Result<(), RtmpError>
where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    H: SessionHandler,
{
    server_handshake(&mut stream, config.handshake_timeout, &logger).await?;

    let (mut read_half, write_half) = tokio::io::split(stream);

    let (out_tx, out_rx) = mpsc::channel(64);
    let writer_handle = spawn_writer(
        write_half,
        out_rx,
        ChunkWriter::new(),
        logger.make_child_logger("[writer] "),
    );

    let mut context = SessionContext::new(session_id, remote_address);

    let result = session_loop(
        &mut read_half,
        &mut context,
        &handler,
        &out_tx,
        &config,
        &logger,
    )
    .await;

    handler.on_disconnect(&context.info);

    // Ending the queue lets the writer flush and close the transport
    drop(out_tx);
    let _ = writer_handle.await;

    result
}

async fn session_loop<R, H>(
    read_half: &mut R,
    context: &mut SessionContext,
    handler: &Arc<H>,
    out_tx: &mpsc::Sender<crate::connection::OutgoingMessage>,
    config: &Arc<ServerConfig>,
    logger: &Logger,
) -> Result<(), RtmpError>
where
    R: AsyncRead + Unpin,
    H: SessionHandler,
{
    let mut chunks = ChunkReader::new();
    let mut counters = ConnectionCounters::new(config.window_ack_size);

    loop {
        let message = match timeout(config.read_timeout, chunks.read_message(read_half)).await {
            Ok(Ok(message)) => message,
            Ok(Err(RtmpError::Io(e))) if e.kind() == ErrorKind::UnexpectedEof => {
                // Peer hung up; a normal end of session
                log_debug!(logger, "Connection closed by peer");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => return Err(RtmpError::TimeoutElapsed("session read".to_string())),
        };

        let message_stream_id = message.message_stream_id;
        let timestamp = message.timestamp;

        match RtmpMessage::decode(message.type_id, &message.payload)? {
            RtmpMessage::SetChunkSize(size) => {
                log_debug!(logger, format!("Peer set chunk size to {}", size));
                chunks.set_chunk_size(size as usize)?;
            }
            RtmpMessage::Abort(chunk_stream_id) => chunks.abort(chunk_stream_id),
            RtmpMessage::Ack(sequence) => {
                log_trace!(logger, format!("Peer acknowledged {} bytes", sequence));
            }
            RtmpMessage::WindowAckSize(size) => {
                counters.read_window_ack_size = size;
            }
            RtmpMessage::SetPeerBandwidth { size, limit_type } => {
                counters.peer_bandwidth = size;
                counters.peer_bandwidth_limit = limit_type;

                let _ = send_detached(
                    out_tx,
                    RtmpMessage::WindowAckSize(config.window_ack_size)
                        .into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
                )
                .await;
            }
            RtmpMessage::UserControl(UserControlEvent::PingRequest(data)) => {
                let _ = send_detached(
                    out_tx,
                    RtmpMessage::UserControl(UserControlEvent::PingResponse(data)).into_raw_on(
                        CSID_PROTOCOL_CONTROL,
                        CONTROL_MESSAGE_STREAM_ID,
                        0,
                    ),
                )
                .await;
            }
            RtmpMessage::UserControl(event) => {
                log_trace!(logger, format!("User control event: {:?}", event));
            }
            RtmpMessage::Audio(payload) => {
                handler.on_audio(&context.info, timestamp, &payload);
            }
            RtmpMessage::Video(payload) => {
                handler.on_video(&context.info, timestamp, &payload);
            }
            RtmpMessage::DataAmf0(data) => {
                if data.is_set_data_frame() {
                    handler.on_set_data_frame(&context.info, &data);
                } else {
                    handler.on_unknown_data(&context.info, &data);
                }
            }
            RtmpMessage::CommandAmf0(command) => {
                handle_command(
                    command,
                    message_stream_id,
                    context,
                    handler,
                    out_tx,
                    config.as_ref(),
                    logger,
                )
                .await?;
            }
            RtmpMessage::Unknown { type_id, payload } => {
                log_debug!(
                    logger,
                    format!("Unknown message type {} ({} bytes)", type_id, payload.len())
                );

                handler.on_unknown_message(
                    &context.info,
                    &crate::rtmp::RawMessage {
                        chunk_stream_id: message.chunk_stream_id,
                        message_stream_id,
                        timestamp,
                        type_id,
                        payload,
                    },
                );
            }
        }

        if let Some(ack) = counters.ack_due(chunks.total_bytes_read()) {
            let _ = send_detached(
                out_tx,
                RtmpMessage::Ack(ack).into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
            )
            .await;
        }
    }
}
