//! # Device Stream Map
//!
//! Concurrency-safe store of per-IMEI reassembly state. This is the only
//! mutable state shared across sessions: two connections claiming the same
//! IMEI (reconnect races, misbehaving devices) must not interleave their
//! appends, so the whole append-extract pass runs under one lock.
//!
//! Streams outlive sockets by design: a device that drops mid-frame and
//! reconnects resumes reassembly where it left off.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::trace;

use crate::core::reassembly::DeviceStream;

/// Thread-safe map of IMEI to [`DeviceStream`].
#[derive(Clone)]
pub struct DeviceStreamMap {
    /// Per-device buffer cap in bytes.
    buffer_cap: usize,
    inner: Arc<Mutex<HashMap<String, DeviceStream>>>,
}

impl DeviceStreamMap {
    pub fn new(buffer_cap: usize) -> Self {
        Self {
            buffer_cap,
            inner: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Append `bytes` to the device's buffer and pull out every complete
    /// frame. Atomic per IMEI: get-or-create, append, and extraction happen
    /// under a single lock acquisition.
    pub async fn append_and_extract(&self, imei: &str, bytes: &[u8]) -> Vec<Bytes> {
        let mut inner = self.inner.lock().await;
        let stream = inner
            .entry(imei.to_string())
            .or_insert_with(|| DeviceStream::new(imei));
        let frames = stream.ingest(bytes, self.buffer_cap);
        trace!(
            imei = %imei,
            frames = frames.len(),
            pending = stream.pending_len(),
            "Extraction pass"
        );
        frames
    }

    /// Bytes currently buffered for `imei` (0 if unknown).
    pub async fn pending_len(&self, imei: &str) -> usize {
        let inner = self.inner.lock().await;
        inner.get(imei).map_or(0, DeviceStream::pending_len)
    }

    /// Drop the buffered bytes for one device.
    pub async fn clear(&self, imei: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(stream) = inner.get_mut(imei) {
            stream.clear();
        }
    }

    /// Number of devices with reassembly state.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
