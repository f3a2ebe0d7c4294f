// TLS server

use std::sync::Arc;

use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio::net::TcpListener;
use tokio_rustls::{rustls, TlsAcceptor};

use crate::error::RtmpError;
use crate::session::run_session;
use crate::{log_debug, log_info};

use super::{RtmpServer, SessionHandler};

impl<H: SessionHandler> RtmpServer<H> {
    /// Runs the TLS accept loop (rtmps://) with a PEM certificate
    /// chain and private key
    pub async fn listen_tls(
        &self,
        certificate_path: &str,
        key_path: &str,
    ) -> Result<(), RtmpError> {
        let mut certificates: Vec<CertificateDer<'_>> = Vec::new();

        for certificate in CertificateDer::pem_file_iter(certificate_path)
            .map_err(|e| RtmpError::protocol(format!("could not load certificate: {}", e)))?
        {
            match certificate {
                Ok(certificate) => certificates.push(certificate),
                Err(e) => {
                    return Err(RtmpError::protocol(format!(
                        "could not load certificate: {}",
                        e
                    )))
                }
            }
        }

        let key = PrivateKeyDer::from_pem_file(key_path)
            .map_err(|e| RtmpError::protocol(format!("could not load private key: {}", e)))?;

        let tls_config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certificates, key)
            .map_err(|e| RtmpError::protocol(format!("invalid TLS configuration: {}", e)))?;

        let acceptor = TlsAcceptor::from(Arc::new(tls_config));

        let listener = TcpListener::bind(&self.config().bind_address).await?;

        log_info!(
            self.logger(),
            format!("Listening on {} (TLS)", self.config().bind_address)
        );

        loop {
            let (connection, address) = listener.accept().await?;

            let session_id = self.next_session_id();
            let config = self.config().clone();
            let handler = self.handler().clone();
            let acceptor = acceptor.clone();
            let logger = self
                .logger()
                .make_child_logger(&format!("[Session #{} {}] ", session_id, address.ip()));

            tokio::spawn(async move {
                let _ = connection.set_nodelay(true);

                let stream = match acceptor.accept(connection).await {
                    Ok(stream) => stream,
                    Err(e) => {
                        log_debug!(logger, format!("TLS accept failed: {}", e));
                        return;
                    }
                };

                let result = run_session(
                    stream,
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
