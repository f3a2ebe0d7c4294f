// TCP server

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::error::RtmpError;
use crate::log::Logger;
use crate::session::run_session;
use crate::{log_debug, log_info};

use super::{ServerConfig, SessionHandler};

/// Accepts RTMP connections and runs a session per publisher
pub struct RtmpServer<H: SessionHandler> {
    config: Arc<ServerConfig>,
    handler: Arc<H>,
    logger: Arc<Logger>,
    next_session_id: AtomicU64,
}

impl<H: SessionHandler> RtmpServer<H> {
    pub fn new(config: ServerConfig, handler: H) -> RtmpServer<H> {
        let logger = Arc::new(Logger::new(config.log_config.clone()));

        RtmpServer {
            config: Arc::new(config),
            handler: Arc::new(handler),
            logger,
            next_session_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) fn config(&self) -> &Arc<ServerConfig> {
        &self.config
    }

    pub(crate) fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    pub(crate) fn logger(&self) -> &Arc<Logger> {
        &self.logger
    }

    /// Runs the plain TCP accept loop (rtmp://)
    pub async fn listen(&self) -> Result<(), RtmpError> {
        let listener = TcpListener::bind(&self.config.bind_address).await?;

        log_info!(
            self.logger,
            format!("Listening on {}", self.config.bind_address)
        );

        loop {
            let (connection, address) = listener.accept().await?;

            let session_id = self.next_session_id();
            let config = self.config.clone();
            let handler = self.handler.clone();
            let logger = self
                .logger
                .make_child_logger(&format!("[Session #{} {}] ", session_id, address.ip()));

            tokio::spawn(async move {
                let _ = connection.set_nodelay(true);

                let result = run_session(
                    connection,
                    address.to_string(),
                    session_id,
                    config,
                    handler,
                    logger.clone(),
                )
                .await;

                if let Err(e) = result {
                    log_debug!(logger, format!("Session ended with error: {}", e));
                }
            });
        }
    }
}
