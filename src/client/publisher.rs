// Publish client state machine

use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::amf::Amf0Value;
use crate::connection::{Connection, ConnectionOptions, IncomingEvent};
use crate::error::RtmpError;
use crate::log::Logger;
use crate::log_info;
use crate::rtmp::{
    client_handshake, RawMessage, RtmpCommand, RtmpData, RtmpMessage, CSID_AUDIO, CSID_VIDEO,
    MSG_AUDIO, MSG_VIDEO,
};
use crate::transport::{self, RtmpUrl};

use super::{ClientConfig, ConnectOptions, PublishType};

/// Client lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Disconnected,
    Handshaken,
    Connecting,
    Connected,
    CreatingStream,
    Ready,
    PublishingRequested,
    Publishing,
    Closing,
    Failed,
}

/// An RTMP publishing client
///
/// Walks the NetConnection/NetStream workflow: connect, createStream,
/// publish, then media writes. After the underlying reactor fails, the
/// next write surfaces a single terminal ConnectionClosed error.
pub struct PublishClient {
    config: ClientConfig,
    url: RtmpUrl,
    logger: Logger,
    state: ClientState,
    connection: Option<Connection>,
    events: Option<mpsc::Receiver<IncomingEvent>>,
    stream_id: u32,
    publish_epoch: Option<Instant>,
}

impl PublishClient {
    /// Creates a client from its configuration.
    /// Fails when the URL does not parse.
    pub fn new(config: ClientConfig) -> Result<PublishClient, RtmpError> {
        let url = RtmpUrl::parse(&config.url)?;
        let logger = Logger::new(config.log_config.clone());

        Ok(PublishClient {
            config,
            url,
            logger,
            state: ClientState::Disconnected,
            connection: None,
            events: None,
            stream_id: 0,
            publish_epoch: None,
        })
    }

    /// Current state
    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The parsed target URL
    pub fn url(&self) -> &RtmpUrl {
        &self.url
    }

    /// Takes the incoming event stream. Available after connect.
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<IncomingEvent>> {
        self.events.take()
    }

    fn expect_state(&self, expected: ClientState, doing: &str) -> Result<(), RtmpError> {
        if self.state != expected {
            return Err(RtmpError::protocol(format!(
                "cannot {} in state {:?}",
                doing, self.state
            )));
        }

        Ok(())
    }

    fn connection(&self) -> Result<&Connection, RtmpError> {
        self.connection
            .as_ref()
            .ok_or_else(|| RtmpError::closed("not connected"))
    }

    /// Dials the URL, handshakes and performs the connect transaction
    pub async fn connect(&mut self) -> Result<(), RtmpError> {
        self.expect_state(ClientState::Disconnected, "connect")?;

        let transport =
            transport::connect(&self.url, self.config.connect_timeout, &self.logger).await?;

        self.connect_over(transport).await
    }

    /// Runs the client over an already established transport.
    /// Used directly by tests and custom transports.
    pub async fn connect_over<S>(&mut self, mut transport: S) -> Result<(), RtmpError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.expect_state(ClientState::Disconnected, "connect")?;

        client_handshake(&mut transport, self.config.handshake_timeout, &self.logger).await?;
        self.state = ClientState::Handshaken;

        let options = ConnectionOptions {
            window_ack_size: self.config.window_ack_size,
            ..ConnectionOptions::default()
        };

        let (connection, events) =
            Connection::start(transport, options, self.logger.make_child_logger("[conn] "));

        // Transaction id 1 is reserved for connect
        let transaction_id = connection.next_transaction_id();

        let connect_object = ConnectOptions::new(self.url.app.clone())
            .with_flash_ver(self.config.flash_version.clone())
            .with_tc_url(self.url.tc_url())
            .with_audio_codecs(self.config.audio_codecs)
            .with_video_codecs(self.config.video_codecs)
            .with_four_cc_list(self.config.four_cc_list.clone())
            .to_command_object()?;

        let command = RtmpCommand::new("connect", transaction_id).with_object(connect_object);

        self.state = ClientState::Connecting;

        let result = connection
            .call(command, 0, self.config.command_timeout)
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.state = ClientState::Failed;
                connection.close().await;
                return Err(e);
            }
        };

        log_info!(
            self.logger,
            format!(
                "Connected to {} (app {}, code {})",
                self.url.host,
                self.url.app,
                response.info_code().unwrap_or("-")
            )
        );

        // Announce our window and switch to the configured chunk size
        connection
            .send_message(
                RtmpMessage::WindowAckSize(self.config.window_ack_size),
                0,
                0,
                None,
            )
            .await?;
        connection
            .send_message(
                RtmpMessage::SetChunkSize(self.config.chunk_size as u32),
                0,
                0,
                None,
            )
            .await?;

        self.connection = Some(connection);
        self.events = Some(events);
        self.state = ClientState::Connected;

        Ok(())
    }

    /// Announces the stream key and creates the message stream:
    /// releaseStream, FCPublish, then createStream whose result
    /// carries the new stream id
    pub async fn create_stream(&mut self) -> Result<u32, RtmpError> {
        self.expect_state(ClientState::Connected, "create a stream")?;

        let stream_key = self.url.stream_key.clone();

        {
            let connection = self.connection()?;

            let release = RtmpCommand::new("releaseStream", connection.next_transaction_id())
                .with_argument(Amf0Value::String(stream_key.clone()));
            connection
                .send_message(RtmpMessage::CommandAmf0(release), 0, 0, None)
                .await?;

            let fc_publish = RtmpCommand::new("FCPublish", connection.next_transaction_id())
                .with_argument(Amf0Value::String(stream_key));
            connection
                .send_message(RtmpMessage::CommandAmf0(fc_publish), 0, 0, None)
                .await?;
        }

        self.state = ClientState::CreatingStream;

        let result = {
            let connection = self.connection()?;
            let create = RtmpCommand::new("createStream", connection.next_transaction_id());
            connection.call(create, 0, self.config.command_timeout).await
        };

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                self.state = ClientState::Failed;
                return Err(e);
            }
        };

        let stream_id = response
            .argument(0)
            .and_then(|value| value.as_number())
            .ok_or_else(|| {
                RtmpError::protocol("createStream result carries no stream id")
            })? as u32;

        self.stream_id = stream_id;
        self.state = ClientState::Ready;

        Ok(stream_id)
    }

    /// Starts publishing on the created stream, waiting for the
    /// NetStream.Publish.Start status
    pub async fn publish(&mut self, publish_type: PublishType) -> Result<(), RtmpError> {
        self.expect_state(ClientState::Ready, "publish")?;

        let stream_key = self.url.stream_key.clone();
        let stream_id = self.stream_id;

        self.state = ClientState::PublishingRequested;

        let result = {
            let connection = self.connection()?;

            let command = RtmpCommand::new("publish", connection.next_transaction_id())
                .with_argument(Amf0Value::String(stream_key))
                .with_argument(Amf0Value::String(publish_type.as_str().to_string()));

            connection
                .call_expect_status(
                    command,
                    stream_id,
                    "NetStream.Publish",
                    self.config.command_timeout,
                )
                .await
        };

        let status = match result {
            Ok(status) => status,
            Err(e) => {
                self.state = ClientState::Failed;
                return Err(e);
            }
        };

        if status.info_code() != Some("NetStream.Publish.Start") {
            self.state = ClientState::Failed;
            return Err(RtmpError::remote(status));
        }

        log_info!(
            self.logger,
            format!("Publishing {} ({})", self.url.stream_key, publish_type.as_str())
        );

        self.publish_epoch = Some(Instant::now());
        self.state = ClientState::Publishing;

        Ok(())
    }

    /// Deadline for the drop-late policy, sharing the publish clock
    /// with the message timestamps
    fn late_deadline(&self, timestamp: u32) -> Option<Instant> {
        let max_age = self.config.drop_late_frames?;
        let epoch = self.publish_epoch?;

        Some(epoch + Duration::from_millis(timestamp as u64) + max_age)
    }

    /// Writes an audio message; the body is an FLV audio tag body
    pub async fn write_audio(&mut self, timestamp: u32, body: Vec<u8>) -> Result<(), RtmpError> {
        self.expect_state(ClientState::Publishing, "write audio")?;

        let deadline = self.late_deadline(timestamp);
        let message = RawMessage {
            chunk_stream_id: CSID_AUDIO,
            message_stream_id: self.stream_id,
            timestamp,
            type_id: MSG_AUDIO,
            payload: body,
        };

        self.connection()?.send_raw(message, deadline).await
    }

    /// Writes a video message; the body is an FLV video tag body
    pub async fn write_video(&mut self, timestamp: u32, body: Vec<u8>) -> Result<(), RtmpError> {
        self.expect_state(ClientState::Publishing, "write video")?;

        let deadline = self.late_deadline(timestamp);
        let message = RawMessage {
            chunk_stream_id: CSID_VIDEO,
            message_stream_id: self.stream_id,
            timestamp,
            type_id: MSG_VIDEO,
            payload: body,
        };

        self.connection()?.send_raw(message, deadline).await
    }

    /// Sends @setDataFrame(onMetaData) with the stream metadata
    pub async fn write_set_data_frame(&mut self, metadata: Amf0Value) -> Result<(), RtmpError> {
        self.expect_state(ClientState::Publishing, "write metadata")?;

        let data = RtmpData::set_data_frame(metadata);

        self.connection()?
            .send_message(RtmpMessage::DataAmf0(data), self.stream_id, 0, None)
            .await
    }

    /// Stops publishing and closes the connection: deleteStream,
    /// FCUnpublish, closeStream, then transport teardown
    pub async fn close(&mut self) -> Result<(), RtmpError> {
        if let (Some(connection), ClientState::Publishing) = (&self.connection, self.state) {
            self.state = ClientState::Closing;

            let delete = RtmpCommand::new("deleteStream", connection.next_transaction_id())
                .with_argument(Amf0Value::Number(self.stream_id as f64));
            let _ = connection
                .send_message(RtmpMessage::CommandAmf0(delete), 0, 0, None)
                .await;

            let unpublish = RtmpCommand::new("FCUnpublish", connection.next_transaction_id())
                .with_argument(Amf0Value::String(self.url.stream_key.clone()));
            let _ = connection
                .send_message(RtmpMessage::CommandAmf0(unpublish), 0, 0, None)
                .await;

            let close_stream =
                RtmpCommand::new("closeStream", connection.next_transaction_id());
            let _ = connection
                .send_message(
                    RtmpMessage::CommandAmf0(close_stream),
                    self.stream_id,
                    0,
                    None,
                )
                .await;
        }

        if let Some(connection) = self.connection.take() {
            connection.close().await;
        }

        self.events = None;
        self.stream_id = 0;
        self.publish_epoch = None;
        self.state = ClientState::Disconnected;

        Ok(())
    }
}
