//! # Connection Acceptor
//!
//! Binds the TCP listener and starts one independent [`Session`] task per
//! inbound connection. Sessions share nothing but the
//! [`DeviceStreamMap`] and the collaborator handles; a failing session
//! never takes down the listener.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, instrument, warn};

use crate::config::IngestConfig;
use crate::error::Result;
use crate::protocol::Session;
use crate::service::Collaborators;
use crate::transport::stream_map::DeviceStreamMap;
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::SHUTDOWN_TIMEOUT;

/// Start the ingest server, shutting down on CTRL+C.
#[instrument(skip(config, collaborators), fields(address = %config.server.address))]
pub async fn start_server(config: IngestConfig, collaborators: Collaborators) -> Result<()> {
    // Internal shutdown channel fed by the signal handler.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);

    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            info!("Received CTRL+C signal, shutting down");
            let _ = shutdown_tx.send(()).await;
        }
    });

    start_server_with_shutdown(config, collaborators, shutdown_rx).await
}

/// Start the ingest server with an external shutdown channel.
pub async fn start_server_with_shutdown(
    config: IngestConfig,
    collaborators: Collaborators,
    shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    config.validate_strict()?;
    let listener = TcpListener::bind(&config.server.address).await?;
    info!(address = %config.server.address, "Listening for device connections");
    serve(listener, config, collaborators, shutdown_rx).await
}

/// Accept loop over an already-bound listener.
///
/// Split out so tests can bind to an ephemeral port themselves.
pub async fn serve(
    listener: TcpListener,
    config: IngestConfig,
    collaborators: Collaborators,
    mut shutdown_rx: mpsc::Receiver<()>,
) -> Result<()> {
    let streams = DeviceStreamMap::new(config.server.buffer_cap_bytes);
    let active_connections = Arc::new(Mutex::new(0u32));

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("Shutting down server. Waiting for sessions to close...");

                let timeout = tokio::time::sleep(SHUTDOWN_TIMEOUT);
                tokio::pin!(timeout);

                loop {
                    tokio::select! {
                        _ = &mut timeout => {
                            warn!("Shutdown timeout reached, forcing exit");
                            break;
                        }
                        _ = tokio::time::sleep(Duration::from_millis(500)) => {
                            let connections = *active_connections.lock().await;
                            info!(connections = %connections, "Waiting for sessions to close");
                            if connections == 0 {
                                info!("All sessions closed, shutting down");
                                break;
                            }
                        }
                    }
                }

                global_metrics().log_metrics();
                return Ok(());
            }

            accept_result = listener.accept() => {
                match accept_result {
                    Ok((stream, addr)) => {
                        debug!(peer = %addr, "New device connection");
                        global_metrics().connection_established();

                        let mut session = Session::new(
                            addr.ip(),
                            streams.clone(),
                            collaborators.clone(),
                            config.server.idle_timeout,
                            config.server.checksum_mode,
                        );

                        let active_connections = active_connections.clone();
                        {
                            let mut count = active_connections.lock().await;
                            *count += 1;
                        }

                        tokio::spawn(async move {
                            if let Err(error) = session.run(stream).await {
                                // Fatal only to this connection; buffered
                                // reassembly bytes survive for a reconnect.
                                debug!(peer = %addr, imei = session.imei(), %error, "Session ended");
                            }
                            global_metrics().connection_closed();
                            let mut count = active_connections.lock().await;
                            *count -= 1;
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "Error accepting connection");
                    }
                }
            }
        }
    }
}
