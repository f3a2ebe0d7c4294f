// Connection reactor
//
// One reader task and one writer task per connection. The reader owns
// the chunk read state, the flow-control counters and the transaction
// table; callers reach the table through the reactor request channel,
// so the table is never locked. The writer owns the chunk write state
// and the outgoing queue.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Instant};

use crate::error::RtmpError;
use crate::log::Logger;
use crate::rtmp::{
    ChunkReader, ChunkWriter, RawMessage, RtmpCommand, RtmpData, RtmpMessage, UserControlEvent,
    CONTROL_MESSAGE_STREAM_ID, CSID_PROTOCOL_CONTROL, DEFAULT_WINDOW_ACK_SIZE,
};
use crate::{log_debug, log_trace};

use super::{
    send_and_wait, send_detached, spawn_writer, CommandCompletion, ConnectionCounters,
    OutgoingMessage, TransactionTable,
};

/// Media and unmatched traffic surfaced to the connection owner
#[derive(Debug)]
pub enum IncomingEvent {
    Audio {
        message_stream_id: u32,
        timestamp: u32,
        payload: Vec<u8>,
    },
    Video {
        message_stream_id: u32,
        timestamp: u32,
        payload: Vec<u8>,
    },
    Data {
        message_stream_id: u32,
        timestamp: u32,
        data: RtmpData,
    },
    /// Commands no waiter claimed
    Command {
        message_stream_id: u32,
        command: RtmpCommand,
    },
    /// Stream-state user control events
    UserControl(UserControlEvent),
    /// Message types outside the implemented set
    Unknown(RawMessage),
}

/// Requests into the reactor task
pub enum ReactorRequest {
    RegisterTransaction {
        transaction_id: u32,
        completion: CommandCompletion,
    },
    RegisterStatus {
        code_prefix: Option<String>,
        completion: CommandCompletion,
    },
}

/// Options fixed at connection construction
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Window acknowledgement size announced to the peer
    pub window_ack_size: u32,

    /// Outgoing queue depth
    pub queue_capacity: usize,

    /// Incoming event channel depth
    pub event_capacity: usize,
}

impl Default for ConnectionOptions {
    fn default() -> ConnectionOptions {
        ConnectionOptions {
            window_ack_size: DEFAULT_WINDOW_ACK_SIZE,
            queue_capacity: 64,
            event_capacity: 64,
        }
    }
}

/// Handle to a running connection
///
/// Cheap operations only: every await suspends on a channel, never on
/// the transport directly.
pub struct Connection {
    out_tx: mpsc::Sender<OutgoingMessage>,
    reactor_tx: mpsc::Sender<ReactorRequest>,
    terminal: Arc<Mutex<Option<String>>>,
    next_transaction_id: AtomicU32,
    reader_handle: JoinHandle<()>,
    writer_handle: JoinHandle<()>,
}

impl Connection {
    /// Starts the reader and writer tasks over a handshaken transport.
    /// Returns the handle and the incoming event stream.
    pub fn start<S>(
        transport: S,
        options: ConnectionOptions,
        logger: Logger,
    ) -> (Connection, mpsc::Receiver<IncomingEvent>)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(transport);

        let (out_tx, out_rx) = mpsc::channel(options.queue_capacity);
        let (reactor_tx, reactor_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(options.event_capacity);

        let terminal = Arc::new(Mutex::new(None));

        let writer_handle = spawn_writer(
            write_half,
            out_rx,
            ChunkWriter::new(),
            logger.make_child_logger("[writer] "),
        );

        let reader_handle = spawn_reader(
            read_half,
            reactor_rx,
            event_tx,
            out_tx.clone(),
            options.clone(),
            terminal.clone(),
            logger.make_child_logger("[reader] "),
        );

        let connection = Connection {
            out_tx,
            reactor_tx,
            terminal,
            next_transaction_id: AtomicU32::new(1),
            reader_handle,
            writer_handle,
        };

        (connection, event_rx)
    }

    /// Allocates the next transaction id; the first is 1, reserved
    /// for connect
    pub fn next_transaction_id(&self) -> f64 {
        self.next_transaction_id.fetch_add(1, Ordering::Relaxed) as f64
    }

    /// The terminal error cause, once the reactor has failed
    pub fn terminal_cause(&self) -> Option<String> {
        self.terminal.lock().ok().and_then(|cause| cause.clone())
    }

    fn closed_error(&self) -> RtmpError {
        RtmpError::closed(
            self.terminal_cause()
                .unwrap_or_else(|| "connection closed".to_string()),
        )
    }

    /// Sends a raw message and waits until it is fully written
    pub async fn send_raw(
        &self,
        message: RawMessage,
        deadline: Option<Instant>,
    ) -> Result<(), RtmpError> {
        if let Some(cause) = self.terminal_cause() {
            return Err(RtmpError::closed(cause));
        }

        send_and_wait(&self.out_tx, message, deadline)
            .await
            .map_err(|e| self.map_send_error(e))
    }

    /// Sends a typed message on its default chunk stream
    pub async fn send_message(
        &self,
        message: RtmpMessage,
        message_stream_id: u32,
        timestamp: u32,
        deadline: Option<Instant>,
    ) -> Result<(), RtmpError> {
        self.send_raw(message.into_raw(message_stream_id, timestamp), deadline)
            .await
    }

    /// Sends a command and waits for its `_result`, failing on
    /// `_error` or a timeout
    pub async fn call(
        &self,
        command: RtmpCommand,
        message_stream_id: u32,
        wait: Duration,
    ) -> Result<RtmpCommand, RtmpError> {
        let transaction_id = command.transaction_id as u32;
        let (completion, response) = oneshot::channel();

        self.reactor_tx
            .send(ReactorRequest::RegisterTransaction {
                transaction_id,
                completion,
            })
            .await
            .map_err(|_| self.closed_error())?;

        self.send_message(
            RtmpMessage::CommandAmf0(command),
            message_stream_id,
            0,
            None,
        )
        .await?;

        match timeout(wait, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => Err(RtmpError::TimeoutElapsed(format!(
                "transaction {}",
                transaction_id
            ))),
        }
    }

    /// Sends a command and waits for an onStatus whose code starts
    /// with the given prefix
    pub async fn call_expect_status(
        &self,
        command: RtmpCommand,
        message_stream_id: u32,
        code_prefix: &str,
        wait: Duration,
    ) -> Result<RtmpCommand, RtmpError> {
        let (completion, response) = oneshot::channel();

        // Register before sending so the response cannot win the race
        self.reactor_tx
            .send(ReactorRequest::RegisterStatus {
                code_prefix: Some(code_prefix.to_string()),
                completion,
            })
            .await
            .map_err(|_| self.closed_error())?;

        self.send_message(
            RtmpMessage::CommandAmf0(command),
            message_stream_id,
            0,
            None,
        )
        .await?;

        match timeout(wait, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(self.closed_error()),
            Err(_) => Err(RtmpError::TimeoutElapsed(format!(
                "onStatus {}",
                code_prefix
            ))),
        }
    }

    /// Closes the connection: cancels both tasks and fails anything
    /// still pending
    pub async fn close(self) {
        if let Ok(mut terminal) = self.terminal.lock() {
            terminal.get_or_insert_with(|| "connection closed locally".to_string());
        }

        // Dropping the queue sender ends the writer task, which shuts
        // the transport down; the reader is cancelled directly
        drop(self.out_tx);
        drop(self.reactor_tx);

        self.reader_handle.abort();
        let _ = self.writer_handle.await;
        let _ = self.reader_handle.await;
    }

    fn map_send_error(&self, error: RtmpError) -> RtmpError {
        match (&error, self.terminal_cause()) {
            (RtmpError::ConnectionClosed { .. }, Some(cause)) => RtmpError::closed(cause),
            _ => error,
        }
    }
}

fn spawn_reader<R: AsyncRead + Send + Unpin + 'static>(
    mut transport: R,
    mut reactor_rx: mpsc::Receiver<ReactorRequest>,
    event_tx: mpsc::Sender<IncomingEvent>,
    out_tx: mpsc::Sender<OutgoingMessage>,
    options: ConnectionOptions,
    terminal: Arc<Mutex<Option<String>>>,
    logger: Logger,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut chunks = ChunkReader::new();
        let mut counters = ConnectionCounters::default();
        let mut table = TransactionTable::new();

        let cause = loop {
            let message = match chunks.read_message(&mut transport).await {
                Ok(message) => message,
                Err(e) => break e.to_string(),
            };

            // Registrations enqueued before the peer could respond are
            // applied before the response is dispatched
            let mut handle_gone = false;

            loop {
                match reactor_rx.try_recv() {
                    Ok(request) => apply_request(&mut table, request),
                    Err(mpsc::error::TryRecvError::Empty) => break,
                    Err(mpsc::error::TryRecvError::Disconnected) => {
                        handle_gone = true;
                        break;
                    }
                }
            }

            if handle_gone {
                break "connection closed locally".to_string();
            }

            if let Err(e) = dispatch(
                message,
                &mut chunks,
                &mut counters,
                &mut table,
                &event_tx,
                &out_tx,
                &options,
                &logger,
            )
            .await
            {
                break e.to_string();
            }

            // Acknowledge at the window boundary
            if let Some(ack) = counters.ack_due(chunks.total_bytes_read()) {
                let _ = send_detached(
                    &out_tx,
                    RtmpMessage::Ack(ack).into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
                )
                .await;
            }
        };

        log_debug!(logger, format!("Reader finished: {}", cause));

        if let Ok(mut terminal) = terminal.lock() {
            terminal.get_or_insert(cause.clone());
        }

        table.fail_all(&cause);

        // Fail registrations still queued, then refuse new ones
        reactor_rx.close();

        while let Ok(request) = reactor_rx.try_recv() {
            let completion = match request {
                ReactorRequest::RegisterTransaction { completion, .. } => completion,
                ReactorRequest::RegisterStatus { completion, .. } => completion,
            };

            let _ = completion.send(Err(RtmpError::closed(cause.clone())));
        }
    })
}

fn apply_request(table: &mut TransactionTable, request: ReactorRequest) {
    match request {
        ReactorRequest::RegisterTransaction {
            transaction_id,
            completion,
        } => table.register(transaction_id, completion),
        ReactorRequest::RegisterStatus {
            code_prefix,
            completion,
        } => table.register_status(code_prefix, completion),
    }
}

#[allow(clippy::too_many_arguments)]
async fn dispatch(
    message: RawMessage,
    chunks: &mut ChunkReader,
    counters: &mut ConnectionCounters,
    table: &mut TransactionTable,
    event_tx: &mpsc::Sender<IncomingEvent>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
    options: &ConnectionOptions,
    logger: &Logger,
) -> Result<(), RtmpError> {
    let message_stream_id = message.message_stream_id;
    let timestamp = message.timestamp;

    match RtmpMessage::decode(message.type_id, &message.payload)? {
        RtmpMessage::SetChunkSize(size) => {
            log_debug!(logger, format!("Peer set chunk size to {}", size));
            chunks.set_chunk_size(size as usize)?;
        }
        RtmpMessage::Abort(chunk_stream_id) => {
            chunks.abort(chunk_stream_id);
        }
        RtmpMessage::Ack(sequence) => {
            log_trace!(logger, format!("Peer acknowledged {} bytes", sequence));
        }
        RtmpMessage::WindowAckSize(size) => {
            counters.read_window_ack_size = size;
        }
        RtmpMessage::SetPeerBandwidth { size, limit_type } => {
            counters.peer_bandwidth = size;
            counters.peer_bandwidth_limit = limit_type;

            // Answered with the locally chosen window size
            let _ = send_detached(
                out_tx,
                RtmpMessage::WindowAckSize(options.window_ack_size)
                    .into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
            )
            .await;
        }
        RtmpMessage::UserControl(UserControlEvent::PingRequest(data)) => {
            // Echoed on the protocol control chunk stream
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
            let _ = event_tx.send(IncomingEvent::UserControl(event)).await;
        }
        RtmpMessage::Audio(payload) => {
            let _ = event_tx
                .send(IncomingEvent::Audio {
                    message_stream_id,
                    timestamp,
                    payload,
                })
                .await;
        }
        RtmpMessage::Video(payload) => {
            let _ = event_tx
                .send(IncomingEvent::Video {
                    message_stream_id,
                    timestamp,
                    payload,
                })
                .await;
        }
        RtmpMessage::DataAmf0(data) => {
            let _ = event_tx
                .send(IncomingEvent::Data {
                    message_stream_id,
                    timestamp,
                    data,
                })
                .await;
        }
        RtmpMessage::CommandAmf0(command) => {
            let unclaimed = if command.is_result() || command.is_error() {
                table.complete(command)
            } else if command.is_on_status() {
                table.complete_status(command)
            } else {
                Some(command)
            };

            if let Some(command) = unclaimed {
                let _ = event_tx
                    .send(IncomingEvent::Command {
                        message_stream_id,
                        command,
                    })
                    .await;
            }
        }
        RtmpMessage::Unknown { type_id, payload } => {
            log_debug!(
                logger,
                format!("Routing unknown message type {} to the event stream", type_id)
            );

            let _ = event_tx
                .send(IncomingEvent::Unknown(RawMessage {
                    chunk_stream_id: message.chunk_stream_id,
                    message_stream_id,
                    timestamp,
                    type_id,
                    payload,
                }))
                .await;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::Amf0Value;
    use crate::log::Logger;
    use crate::rtmp::{MSG_COMMAND_AMF0, MSG_USER_CONTROL, MSG_WINDOW_ACK_SIZE};

    /// A scripted peer on the other end of a duplex pipe
    struct Peer {
        stream: tokio::io::DuplexStream,
        reader: ChunkReader,
        writer: ChunkWriter,
    }

    impl Peer {
        fn new(stream: tokio::io::DuplexStream) -> Peer {
            Peer {
                stream,
                reader: ChunkReader::new(),
                writer: ChunkWriter::new(),
            }
        }

        async fn read(&mut self) -> RawMessage {
            self.reader.read_message(&mut self.stream).await.unwrap()
        }

        async fn write(&mut self, message: RawMessage) {
            use tokio::io::AsyncWriteExt;

            let mut wire = Vec::new();
            self.writer
                .encode(&message, &Logger::new_disabled(), &mut wire)
                .unwrap();
            self.stream.write_all(&wire).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_call_matches_result_by_transaction_id() {
        let (local, remote) = tokio::io::duplex(1 << 20);
        let (connection, _events) =
            Connection::start(local, ConnectionOptions::default(), Logger::new_disabled());

        let mut peer = Peer::new(remote);

        let server = tokio::spawn(async move {
            let request = peer.read().await;
            assert_eq!(request.type_id, MSG_COMMAND_AMF0);

            let command = RtmpCommand::decode(&request.payload).unwrap();
            assert_eq!(command.name, "createStream");

            let reply = RtmpCommand::new("_result", command.transaction_id)
                .with_argument(Amf0Value::Number(5.0));

            peer.write(RtmpMessage::CommandAmf0(reply).into_raw(0, 0))
                .await;
        });

        let transaction_id = connection.next_transaction_id();
        let result = connection
            .call(
                RtmpCommand::new("createStream", transaction_id),
                0,
                Duration::from_secs(2),
            )
            .await
            .unwrap();

        assert_eq!(result.argument(0).and_then(|v| v.as_number()), Some(5.0));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_response_becomes_remote_error() {
        let (local, remote) = tokio::io::duplex(1 << 20);
        let (connection, _events) =
            Connection::start(local, ConnectionOptions::default(), Logger::new_disabled());

        let mut peer = Peer::new(remote);

        tokio::spawn(async move {
            let request = peer.read().await;
            let command = RtmpCommand::decode(&request.payload).unwrap();

            let reply = RtmpCommand::new("_error", command.transaction_id).with_argument(
                Amf0Value::object(vec![
                    ("level", Amf0Value::String("error".to_string())),
                    (
                        "code",
                        Amf0Value::String("NetConnection.Connect.Rejected".to_string()),
                    ),
                ]),
            );

            peer.write(RtmpMessage::CommandAmf0(reply).into_raw(0, 0))
                .await;
        });

        let transaction_id = connection.next_transaction_id();
        let result = connection
            .call(
                RtmpCommand::new("connect", transaction_id),
                0,
                Duration::from_secs(2),
            )
            .await;

        assert!(matches!(
            result,
            Err(RtmpError::RemoteServerError { .. })
        ));
    }

    #[tokio::test]
    async fn test_ping_request_answered_with_same_payload() {
        let (local, remote) = tokio::io::duplex(1 << 20);
        let (_connection, _events) =
            Connection::start(local, ConnectionOptions::default(), Logger::new_disabled());

        let mut peer = Peer::new(remote);

        peer.write(
            RtmpMessage::UserControl(UserControlEvent::PingRequest([1, 2, 3, 4])).into_raw_on(
                CSID_PROTOCOL_CONTROL,
                0,
                0,
            ),
        )
        .await;

        let response = peer.read().await;
        assert_eq!(response.type_id, MSG_USER_CONTROL);
        assert_eq!(response.chunk_stream_id, CSID_PROTOCOL_CONTROL);

        match UserControlEvent::decode(&response.payload).unwrap() {
            UserControlEvent::PingResponse(data) => assert_eq!(data, [1, 2, 3, 4]),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_peer_bandwidth_answered_with_window_ack() {
        let (local, remote) = tokio::io::duplex(1 << 20);

        let options = ConnectionOptions {
            window_ack_size: 1_000_000,
            ..ConnectionOptions::default()
        };

        let (_connection, _events) = Connection::start(local, options, Logger::new_disabled());

        let mut peer = Peer::new(remote);

        peer.write(
            RtmpMessage::SetPeerBandwidth {
                size: 2_500_000,
                limit_type: crate::rtmp::BandwidthLimitType::Dynamic,
            }
            .into_raw(0, 0),
        )
        .await;

        let response = peer.read().await;
        assert_eq!(response.type_id, MSG_WINDOW_ACK_SIZE);

        match RtmpMessage::decode(response.type_id, &response.payload).unwrap() {
            RtmpMessage::WindowAckSize(size) => assert_eq!(size, 1_000_000),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_acknowledgement_sent_after_window() {
        let (local, remote) = tokio::io::duplex(1 << 20);
        let (_connection, mut events) =
            Connection::start(local, ConnectionOptions::default(), Logger::new_disabled());

        let mut peer = Peer::new(remote);

        // Shrink the window so a few audio messages cross it
        peer.write(RtmpMessage::WindowAckSize(1024).into_raw(0, 0))
            .await;

        for i in 0..20 {
            peer.write(
                RtmpMessage::Audio(vec![0xAA; 100]).into_raw_on(4, 1, i * 20),
            )
            .await;
        }

        let ack = peer.read().await;
        assert_eq!(ack.type_id, crate::rtmp::MSG_ACK);

        // The events channel carries the audio through
        match events.recv().await.unwrap() {
            IncomingEvent::Audio { payload, .. } => assert_eq!(payload.len(), 100),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_teardown_fails_pending_call() {
        let (local, remote) = tokio::io::duplex(1 << 20);
        let (connection, _events) =
            Connection::start(local, ConnectionOptions::default(), Logger::new_disabled());

        let mut peer = Peer::new(remote);

        // A message must flow for the registration to be picked up,
        // then the transport drops without answering
        tokio::spawn(async move {
            peer.write(
                RtmpMessage::UserControl(UserControlEvent::StreamBegin(0)).into_raw(0, 0),
            )
            .await;

            tokio::time::sleep(Duration::from_millis(100)).await;
            drop(peer);
        });

        let transaction_id = connection.next_transaction_id();
        let result = connection
            .call(
                RtmpCommand::new("createStream", transaction_id),
                0,
                Duration::from_secs(5),
            )
            .await;

        assert!(matches!(
            result,
            Err(RtmpError::ConnectionClosed { .. })
        ));
    }
}
