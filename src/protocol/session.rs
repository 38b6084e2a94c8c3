//! Per-connection session state machine.
//!
//! A session moves `AwaitingIdentity -> Streaming -> Closed`. Identity is
//! established once per connection via the handshake in
//! [`identity`](crate::protocol::identity); every subsequent read is fed to
//! the device's reassembly buffer, complete frames are decoded, records are
//! handed to the collaborators, and a 4-byte big-endian count of the
//! records decoded from that read is written back. The count doubles as the
//! protocol's backpressure signal: devices wait for it before sending more.

use std::net::IpAddr;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, instrument, warn};

use crate::core::checksum::ChecksumMode;
use crate::core::codec::decode_frame;
use crate::error::{AvlError, Result};
use crate::protocol::identity::{self, ACCEPT, REJECT};
use crate::service::Collaborators;
use crate::transport::stream_map::DeviceStreamMap;
use crate::utils::metrics::global_metrics;
use crate::utils::timeout::with_idle_timeout;

/// Read buffer size per session. Device frames are small; 4 KB covers the
/// common case without per-read reallocation.
const READ_BUF_SIZE: usize = 4096;

/// Session lifecycle.
#[derive(Debug)]
enum SessionState {
    /// Waiting for the identity handshake.
    AwaitingIdentity,
    /// Identified; streaming AVL frames.
    Streaming(String),
    /// Terminal.
    Closed,
}

/// One device connection.
pub struct Session {
    peer_ip: IpAddr,
    streams: DeviceStreamMap,
    collaborators: Collaborators,
    idle_timeout: Duration,
    checksum_mode: ChecksumMode,
    state: SessionState,
}

impl Session {
    pub fn new(
        peer_ip: IpAddr,
        streams: DeviceStreamMap,
        collaborators: Collaborators,
        idle_timeout: Duration,
        checksum_mode: ChecksumMode,
    ) -> Self {
        Self {
            peer_ip,
            streams,
            collaborators,
            idle_timeout,
            checksum_mode,
            state: SessionState::AwaitingIdentity,
        }
    }

    /// IMEI of the identified device, if the handshake has completed.
    pub fn imei(&self) -> Option<&str> {
        match &self.state {
            SessionState::Streaming(imei) => Some(imei),
            _ => None,
        }
    }

    /// Drive the session until the peer disconnects, the idle timeout
    /// fires, or a connection-fatal protocol error occurs.
    ///
    /// Failure modes here are fatal only to this connection; buffered
    /// reassembly bytes for the device stay in the stream map so a
    /// reconnect can resume a half-received frame.
    #[instrument(skip(self, socket), fields(peer = %self.peer_ip))]
    pub async fn run<T>(&mut self, mut socket: T) -> Result<()>
    where
        T: AsyncRead + AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; READ_BUF_SIZE];

        loop {
            let n = with_idle_timeout(self.idle_timeout, socket.read(&mut buf)).await?;
            if n == 0 {
                debug!(imei = self.imei(), "Peer closed connection");
                self.state = SessionState::Closed;
                return Ok(());
            }
            global_metrics().bytes_read(n as u64);

            match std::mem::replace(&mut self.state, SessionState::Closed) {
                SessionState::AwaitingIdentity => {
                    self.handle_identity(&buf[..n], &mut socket).await?;
                }
                SessionState::Streaming(imei) => {
                    self.handle_data(&imei, &buf[..n], &mut socket).await?;
                    self.state = SessionState::Streaming(imei);
                }
                SessionState::Closed => return Ok(()),
            }
        }
    }

    /// Parse the identity handshake and answer with one byte: accept and
    /// move to streaming, or reject and close.
    async fn handle_identity<W>(&mut self, bytes: &[u8], socket: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let Some(imei) = identity::parse_imei(bytes) else {
            warn!(peer = %self.peer_ip, len = bytes.len(), "Malformed identity handshake");
            global_metrics().handshake_rejected();
            socket.write_all(&[REJECT]).await?;
            return Err(AvlError::MalformedIdentity);
        };

        if !self.collaborators.registry.is_allowed(&imei).await {
            warn!(imei = %imei, peer = %self.peer_ip, "Device not in allow-list, rejecting");
            global_metrics().handshake_rejected();
            socket.write_all(&[REJECT]).await?;
            return Err(AvlError::IdentityRejected(imei));
        }

        socket.write_all(&[ACCEPT]).await?;
        let is_new = self
            .collaborators
            .registry
            .register_connection(&imei, self.peer_ip)
            .await;
        info!(imei = %imei, peer = %self.peer_ip, is_new, "Device identified");
        global_metrics().handshake_accepted();
        self.state = SessionState::Streaming(imei);
        Ok(())
    }

    /// Feed one read's bytes through reassembly and decode, persist every
    /// fully decoded record, then acknowledge with the total record count
    /// across all frames completed by this read.
    async fn handle_data<W>(&mut self, imei: &str, bytes: &[u8], socket: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frames = self.streams.append_and_extract(imei, bytes).await;

        let mut decoded_total: u32 = 0;
        let mut frame_count: u64 = 0;

        for raw in &frames {
            match decode_frame(raw, self.checksum_mode) {
                Ok(frame) => {
                    frame_count += 1;
                    for anomaly in &frame.anomalies {
                        warn!(imei = %imei, codec = %frame.codec, %anomaly, "Decode anomaly");
                        global_metrics().decode_anomaly();
                    }
                    for record in &frame.records {
                        if let Err(error) =
                            self.collaborators.sink.append_record(imei, record).await
                        {
                            warn!(imei = %imei, %error, "Record sink failed, record dropped");
                        }
                    }
                    debug!(
                        imei = %imei,
                        codec = %frame.codec,
                        records = frame.records.len(),
                        "Frame decoded"
                    );
                    decoded_total += frame.records.len() as u32;
                }
                Err(error) => {
                    warn!(imei = %imei, %error, "Undecodable frame dropped");
                    global_metrics().decode_anomaly();
                }
            }
        }

        if decoded_total > 0 {
            self.collaborators
                .registry
                .register_records(imei, u64::from(decoded_total))
                .await;
        }
        global_metrics().frames_decoded(frame_count, u64::from(decoded_total));

        // Records are persisted before the ack goes out, so a write failure
        // here never loses decoded data.
        socket.write_all(&decoded_total.to_be_bytes()).await?;
        Ok(())
    }
}
