// TLS transport

use std::sync::Arc;
use std::time::Duration;

use rustls::pki_types::ServerName;
use rustls::RootCertStore;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::{rustls, TlsConnector};

use crate::error::RtmpError;
use crate::log::Logger;
use crate::{log_debug, log_warning};

use super::connect_tcp;

/// Connects a TLS-wrapped TCP transport (rtmps://), verifying the
/// server against the platform trust roots
pub async fn connect_tls(
    host: &str,
    port: u16,
    connect_timeout: Duration,
    logger: &Logger,
) -> Result<TlsStream<TcpStream>, RtmpError> {
    let tcp = connect_tcp(host, port, connect_timeout, logger).await?;

    let mut roots = RootCertStore::empty();
    let native = rustls_native_certs::load_native_certs();

    for error in &native.errors {
        log_warning!(logger, format!("Skipping unreadable root cert: {}", error));
    }

    let (added, ignored) = roots.add_parsable_certificates(native.certs);

    if added == 0 {
        return Err(RtmpError::protocol(
            "no usable TLS root certificates on this system",
        ));
    }

    log_debug!(
        logger,
        format!("Loaded {} root certs ({} ignored)", added, ignored)
    );

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();

    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| RtmpError::InvalidUrl(format!("invalid TLS server name: {}", host)))?;

    let connector = TlsConnector::from(Arc::new(config));
    let stream = connector.connect(server_name, tcp).await?;

    Ok(stream)
}
