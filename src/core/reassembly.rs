//! Frame extraction over a per-device byte accumulator.
//!
//! Devices write frames onto a TCP stream with no alignment guarantees: a
//! read may carry half a frame, three frames, or a frame split across two
//! connections. [`FrameExtractor`] bridges the byte-stream and the
//! message-oriented framing; [`DeviceStream`] is the durable accumulator it
//! runs against, keyed by IMEI rather than by socket so a disconnect
//! mid-frame loses nothing.
//!
//! ## Extraction algorithm
//! 1. Fewer than 8 bytes buffered: wait for more.
//! 2. Preamble at the current offset not all-zero: scan forward for the
//!    next all-zero 4-byte window (recovers from protocol desync); if none
//!    exists, discard the scanned bytes.
//! 3. Declared data length outside 4..=100,000: skip 4 bytes, retry from 2.
//!    Guards against a misaligned read being taken for a huge length.
//! 4. Fewer than `8 + length + 4` bytes buffered: wait for more.
//! 5. Split off exactly one frame and repeat.

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Decoder;
use tracing::{debug, warn};

use crate::core::codec::{CHECKSUM_LEN, HEADER_LEN, MAX_DATA_LENGTH, MIN_DATA_LENGTH, PREAMBLE};
use crate::error::AvlError;
use crate::utils::metrics::global_metrics;

/// Stateless frame splitter. Implements [`Decoder`] so it can run against
/// any `BytesMut`, not just a socket.
pub struct FrameExtractor;

impl Decoder for FrameExtractor {
    type Item = Bytes;
    type Error = AvlError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Bytes>, AvlError> {
        loop {
            if src.len() < HEADER_LEN {
                return Ok(None);
            }

            if src[..PREAMBLE.len()] != PREAMBLE {
                match find_preamble(src) {
                    Some(pos) => {
                        debug!(skipped = pos, "Resynchronized to next preamble");
                        global_metrics().resync();
                        src.advance(pos);
                        continue;
                    }
                    None => {
                        // A preamble may straddle the read boundary, so the
                        // last 3 bytes stay; everything before them is
                        // unrecoverable.
                        let keep = PREAMBLE.len() - 1;
                        let dropped = src.len().saturating_sub(keep);
                        debug!(dropped, "No preamble found, discarding scanned bytes");
                        global_metrics().resync();
                        src.advance(dropped);
                        return Ok(None);
                    }
                }
            }

            let declared =
                u32::from_be_bytes([src[4], src[5], src[6], src[7]]);
            if !(MIN_DATA_LENGTH..=MAX_DATA_LENGTH).contains(&declared) {
                debug!(declared, "Implausible data length, skipping 4 bytes");
                src.advance(4);
                continue;
            }

            let total = HEADER_LEN + declared as usize + CHECKSUM_LEN;
            if src.len() < total {
                // Incomplete frame, wait for more data (possibly from a
                // future reconnect).
                return Ok(None);
            }

            return Ok(Some(src.split_to(total).freeze()));
        }
    }
}

/// Position of the next all-zero 4-byte window after the current offset.
fn find_preamble(src: &BytesMut) -> Option<usize> {
    src.windows(PREAMBLE.len())
        .skip(1)
        .position(|window| window == PREAMBLE)
        .map(|pos| pos + 1)
}

/// Per-device reassembly state.
///
/// One instance exists per IMEI (see
/// [`DeviceStreamMap`](crate::transport::stream_map::DeviceStreamMap)), not
/// per TCP connection; it is created on the device's first handshake and
/// survives reconnects. `pending` holds only bytes that have not yet
/// resolved into a complete frame.
#[derive(Debug)]
pub struct DeviceStream {
    imei: String,
    pending: BytesMut,
}

impl DeviceStream {
    pub fn new(imei: impl Into<String>) -> Self {
        Self {
            imei: imei.into(),
            pending: BytesMut::new(),
        }
    }

    pub fn imei(&self) -> &str {
        &self.imei
    }

    /// Bytes buffered but not yet resolved into a frame.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Append newly arrived bytes and extract every frame now complete.
    ///
    /// If the append pushes the buffer past `cap` the whole buffer is
    /// dropped and no frames are returned; the device must resend from
    /// scratch. The cap protects against malformed or runaway streams.
    pub fn ingest(&mut self, bytes: &[u8], cap: usize) -> Vec<Bytes> {
        self.pending.extend_from_slice(bytes);

        if self.pending.len() > cap {
            warn!(
                imei = %self.imei,
                buffered = self.pending.len(),
                cap,
                "Reassembly buffer exceeded cap, dropping"
            );
            global_metrics().buffer_dropped();
            self.pending.clear();
            return Vec::new();
        }

        let mut extractor = FrameExtractor;
        let mut frames = Vec::new();
        while let Ok(Some(frame)) = extractor.decode(&mut self.pending) {
            frames.push(frame);
        }
        frames
    }
}
