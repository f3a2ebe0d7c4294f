// Outgoing message queue

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use byteorder::{BigEndian, ByteOrder};

use crate::error::RtmpError;
use crate::log::Logger;
use crate::log_debug;
use crate::rtmp::{ChunkWriter, RawMessage, MSG_SET_CHUNK_SIZE};

/// A queued message and its completion signal
///
/// The producer hands the message over; the writer task owns it until
/// every chunk is on the transport, then completes the signal. A
/// message whose deadline has passed before it is written completes
/// with FrameDropped instead.
pub struct OutgoingMessage {
    pub message: RawMessage,
    pub completion: oneshot::Sender<Result<(), RtmpError>>,
    pub deadline: Option<Instant>,
}

/// Spawns the writer task for one connection
///
/// The task drains the queue, serializes messages through the chunk
/// writer and completes each signal. After a transport failure every
/// remaining message is failed with the original cause; the queue is
/// drained so producers never hang.
pub fn spawn_writer<W: AsyncWrite + Send + Unpin + 'static>(
    mut transport: W,
    mut queue: mpsc::Receiver<OutgoingMessage>,
    mut chunks: ChunkWriter,
    logger: Logger,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut failure: Option<String> = None;

        while let Some(outgoing) = queue.recv().await {
            if let Some(cause) = &failure {
                let _ = outgoing
                    .completion
                    .send(Err(RtmpError::closed(cause.clone())));
                continue;
            }

            if let Some(deadline) = outgoing.deadline {
                if Instant::now() >= deadline {
                    log_debug!(logger, "Dropping late message before write");
                    let _ = outgoing.completion.send(Err(RtmpError::FrameDropped));
                    continue;
                }
            }

            // A SET_CHUNK_SIZE we send applies to the messages after
            // it, so the new size is installed only once the
            // announcement is fully written
            let pending_chunk_size = if outgoing.message.type_id == MSG_SET_CHUNK_SIZE
                && outgoing.message.payload.len() >= 4
            {
                Some((BigEndian::read_u32(&outgoing.message.payload[0..4]) & 0x7FFF_FFFF) as usize)
            } else {
                None
            };

            let mut wire = Vec::new();

            if let Err(e) = chunks.encode(&outgoing.message, &logger, &mut wire) {
                let _ = outgoing.completion.send(Err(e));
                continue;
            }

            let result = async {
                transport.write_all(&wire).await?;
                transport.flush().await?;
                Ok::<(), std::io::Error>(())
            }
            .await;

            match result {
                Ok(()) => {
                    chunks.record_written(wire.len() as u64);

                    if let Some(size) = pending_chunk_size {
                        if let Err(e) = chunks.set_chunk_size(size) {
                            log_debug!(
                                logger,
                                format!("Ignoring invalid outgoing chunk size: {}", e)
                            );
                        }
                    }

                    let _ = outgoing.completion.send(Ok(()));
                }
                Err(e) => {
                    let cause = e.to_string();
                    let _ = outgoing.completion.send(Err(RtmpError::Io(e)));
                    failure = Some(cause);
                }
            }
        }

        // Producers dropped the queue; close the transport
        let _ = transport.shutdown().await;
    })
}

/// Enqueues a message and waits for it to reach the transport
pub async fn send_and_wait(
    queue: &mpsc::Sender<OutgoingMessage>,
    message: RawMessage,
    deadline: Option<Instant>,
) -> Result<(), RtmpError> {
    let (completion, done) = oneshot::channel();

    queue
        .send(OutgoingMessage {
            message,
            completion,
            deadline,
        })
        .await
        .map_err(|_| RtmpError::closed("writer task is gone"))?;

    done.await
        .map_err(|_| RtmpError::closed("writer task dropped the message"))?
}

/// Enqueues a message without waiting for delivery
pub async fn send_detached(
    queue: &mpsc::Sender<OutgoingMessage>,
    message: RawMessage,
) -> Result<(), RtmpError> {
    let (completion, _) = oneshot::channel();

    queue
        .send(OutgoingMessage {
            message,
            completion,
            deadline: None,
        })
        .await
        .map_err(|_| RtmpError::closed("writer task is gone"))
}
