// Command handling logic

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::connection::{send_and_wait, OutgoingMessage};
use crate::error::RtmpError;
use crate::log::Logger;
use crate::rtmp::{
    RtmpCommand, RtmpMessage, UserControlEvent, CONTROL_MESSAGE_STREAM_ID,
};
use crate::server::{ServerConfig, SessionHandler};
use crate::{log_debug, log_info};

use super::{
    connect_rejected, connect_success, create_stream_rejected, create_stream_result, on_fc_publish,
    play_failed, publish_failed, publish_start, release_stream_result, SessionContext,
};

async fn send_command(
    out_tx: &mpsc::Sender<OutgoingMessage>,
    command: RtmpCommand,
    message_stream_id: u32,
) -> Result<(), RtmpError> {
    send_and_wait(
        out_tx,
        RtmpMessage::CommandAmf0(command).into_raw(message_stream_id, 0),
        None,
    )
    .await
}

/// Handles one command message
/// command - The decoded command
/// message_stream_id - Stream the command arrived on
/// context - Session state
/// handler - User callbacks
/// out_tx - Outgoing queue
/// config - Server configuration
/// logger - Session logger
/// Returns Err to end the session on protocol violations.
#[allow(clippy::too_many_arguments)]
pub async fn handle_command<H: SessionHandler>(
    command: RtmpCommand,
    message_stream_id: u32,
    context: &mut SessionContext,
    handler: &Arc<H>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
    config: &ServerConfig,
    logger: &Logger,
) -> Result<(), RtmpError> {
    match command.name.as_str() {
        "connect" => handle_connect(command, context, handler, out_tx, config, logger).await,
        "createStream" => handle_create_stream(command, context, handler, out_tx, logger).await,
        "releaseStream" => {
            let stream_key = command
                .argument(0)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            handler.on_release_stream(&context.info, &stream_key);

            send_command(
                out_tx,
                release_stream_result(command.transaction_id),
                CONTROL_MESSAGE_STREAM_ID,
            )
            .await
        }
        "FCPublish" => {
            let stream_key = command
                .argument(0)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            handler.on_fc_publish(&context.info, &stream_key);

            send_command(
                out_tx,
                on_fc_publish(&stream_key),
                CONTROL_MESSAGE_STREAM_ID,
            )
            .await
        }
        "FCUnpublish" => {
            let stream_key = command
                .argument(0)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            handler.on_fc_unpublish(&context.info, &stream_key);
            Ok(())
        }
        "publish" => {
            handle_publish(command, message_stream_id, context, handler, out_tx, logger).await
        }
        "play" => {
            let stream_name = command
                .argument(0)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();

            // This server carries publishers only; the callback may
            // veto with its own reason but the answer is always a
            // play failure
            let description = match handler.on_play(&context.info, &stream_name) {
                Ok(()) => "playback is not supported".to_string(),
                Err(reason) => reason,
            };

            send_command(out_tx, play_failed(&description), message_stream_id).await
        }
        "closeStream" => {
            handler.on_close_stream(&context.info);

            if context.publishing_stream_id == Some(message_stream_id) {
                context.publishing_stream_id = None;
                context.info.stream_key = None;
            }

            Ok(())
        }
        "deleteStream" => {
            let stream_id = command
                .argument(0)
                .and_then(|v| v.as_number())
                .unwrap_or_default() as u32;

            context.stream_ids.release(stream_id);

            if context.publishing_stream_id == Some(stream_id) {
                context.publishing_stream_id = None;
                context.info.stream_key = None;
            }

            handler.on_delete_stream(&context.info, stream_id);
            Ok(())
        }
        other => {
            log_debug!(logger, format!("Unrecognized command: {}", other));
            handler.on_unknown_command(&context.info, &command);
            Ok(())
        }
    }
}

/// Handles connect: callback, then the canonical window, bandwidth,
/// stream-begin, chunk-size and _result sequence
async fn handle_connect<H: SessionHandler>(
    command: RtmpCommand,
    context: &mut SessionContext,
    handler: &Arc<H>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
    config: &ServerConfig,
    logger: &Logger,
) -> Result<(), RtmpError> {
    if context.connected {
        return Err(RtmpError::protocol(
            "connect received, but already connected",
        ));
    }

    let app = match command
        .command_object
        .get_property("app")
        .and_then(|v| v.as_str())
    {
        Some(app) => app.to_string(),
        None => {
            return Err(RtmpError::protocol(
                "connect command carries no app property",
            ))
        }
    };

    if let Err(reason) = handler.on_connect(&context.info, &app) {
        log_info!(
            logger,
            format!("Rejected connect to {}: {}", app, reason)
        );

        return send_command(
            out_tx,
            connect_rejected(command.transaction_id, &reason),
            CONTROL_MESSAGE_STREAM_ID,
        )
        .await;
    }

    context.connected = true;
    context.info.app = Some(app.clone());

    log_info!(logger, format!("CONNECT: {}", app));

    send_and_wait(
        out_tx,
        RtmpMessage::WindowAckSize(config.window_ack_size)
            .into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
        None,
    )
    .await?;

    send_and_wait(
        out_tx,
        RtmpMessage::SetPeerBandwidth {
            size: config.peer_bandwidth,
            limit_type: crate::rtmp::BandwidthLimitType::Dynamic,
        }
        .into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
        None,
    )
    .await?;

    send_and_wait(
        out_tx,
        RtmpMessage::UserControl(UserControlEvent::StreamBegin(0))
            .into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
        None,
    )
    .await?;

    send_and_wait(
        out_tx,
        RtmpMessage::SetChunkSize(config.chunk_size as u32).into_raw(CONTROL_MESSAGE_STREAM_ID, 0),
        None,
    )
    .await?;

    send_command(
        out_tx,
        connect_success(command.transaction_id),
        CONTROL_MESSAGE_STREAM_ID,
    )
    .await
}

async fn handle_create_stream<H: SessionHandler>(
    command: RtmpCommand,
    context: &mut SessionContext,
    handler: &Arc<H>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
    logger: &Logger,
) -> Result<(), RtmpError> {
    if !context.connected {
        return Err(RtmpError::protocol("createStream before connect"));
    }

    if let Err(reason) = handler.on_create_stream(&context.info) {
        return send_command(
            out_tx,
            create_stream_rejected(command.transaction_id, &reason),
            CONTROL_MESSAGE_STREAM_ID,
        )
        .await;
    }

    let stream_id = context.stream_ids.allocate();

    log_debug!(logger, format!("Created stream {}", stream_id));

    send_command(
        out_tx,
        create_stream_result(command.transaction_id, stream_id),
        CONTROL_MESSAGE_STREAM_ID,
    )
    .await
}

async fn handle_publish<H: SessionHandler>(
    command: RtmpCommand,
    message_stream_id: u32,
    context: &mut SessionContext,
    handler: &Arc<H>,
    out_tx: &mpsc::Sender<OutgoingMessage>,
    logger: &Logger,
) -> Result<(), RtmpError> {
    if !context.connected {
        return Err(RtmpError::protocol("publish before connect"));
    }

    let stream_key = match command.argument(0).and_then(|v| v.as_str()) {
        Some(key) if !key.is_empty() => key.to_string(),
        _ => {
            return send_command(
                out_tx,
                publish_failed("No stream key provided"),
                message_stream_id,
            )
            .await;
        }
    };

    let publish_type = command
        .argument(1)
        .and_then(|v| v.as_str())
        .unwrap_or("live")
        .to_string();

    if context.publishing_stream_id.is_some() {
        return send_command(
            out_tx,
            publish_failed("Connection is already publishing"),
            message_stream_id,
        )
        .await;
    }

    if let Err(reason) = handler.on_publish(&context.info, &stream_key, &publish_type) {
        log_info!(
            logger,
            format!("Rejected publish of {}: {}", stream_key, reason)
        );

        return send_command(out_tx, publish_failed(&reason), message_stream_id).await;
    }

    context.publishing_stream_id = Some(message_stream_id);
    context.info.stream_key = Some(stream_key.clone());

    let app = context.info.app.clone().unwrap_or_default();

    log_info!(
        logger,
        format!("PUBLISH ({}): /{}/{}", message_stream_id, app, stream_key)
    );

    send_command(
        out_tx,
        publish_start(&app, &stream_key),
        message_stream_id,
    )
    .await
}
