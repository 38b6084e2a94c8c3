//! Observability counters for the ingest pipeline.
//!
//! Thread-safe atomic counters, incremented from session tasks and readable
//! as a consistent-enough snapshot for logging or a future scrape endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Ingest-wide metrics collector.
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active connections
    pub connections_active: AtomicU64,
    /// Identity handshakes accepted
    pub handshakes_accepted: AtomicU64,
    /// Identity handshakes rejected (malformed or not allowed)
    pub handshakes_rejected: AtomicU64,
    /// Complete frames extracted
    pub frames_total: AtomicU64,
    /// Fully decoded records
    pub records_total: AtomicU64,
    /// Decode anomalies observed (per anomaly, not per frame)
    pub decode_anomalies: AtomicU64,
    /// Framing resynchronization scans
    pub resyncs: AtomicU64,
    /// Reassembly buffers dropped for exceeding the cap
    pub buffers_dropped: AtomicU64,
    /// Raw bytes read from devices
    pub bytes_received: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_accepted: AtomicU64::new(0),
            handshakes_rejected: AtomicU64::new(0),
            frames_total: AtomicU64::new(0),
            records_total: AtomicU64::new(0),
            decode_anomalies: AtomicU64::new(0),
            resyncs: AtomicU64::new(0),
            buffers_dropped: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_accepted(&self) {
        self.handshakes_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn handshake_rejected(&self) {
        self.handshakes_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_decoded(&self, frames: u64, records: u64) {
        self.frames_total.fetch_add(frames, Ordering::Relaxed);
        self.records_total.fetch_add(records, Ordering::Relaxed);
    }

    pub fn decode_anomaly(&self) {
        self.decode_anomalies.fetch_add(1, Ordering::Relaxed);
    }

    pub fn resync(&self) {
        self.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn buffer_dropped(&self) {
        self.buffers_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: u64) {
        self.bytes_received.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_accepted: self.handshakes_accepted.load(Ordering::Relaxed),
            handshakes_rejected: self.handshakes_rejected.load(Ordering::Relaxed),
            frames_total: self.frames_total.load(Ordering::Relaxed),
            records_total: self.records_total.load(Ordering::Relaxed),
            decode_anomalies: self.decode_anomalies.load(Ordering::Relaxed),
            resyncs: self.resyncs.load(Ordering::Relaxed),
            buffers_dropped: self.buffers_dropped.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            handshakes_accepted = snapshot.handshakes_accepted,
            handshakes_rejected = snapshot.handshakes_rejected,
            frames_total = snapshot.frames_total,
            records_total = snapshot.records_total,
            decode_anomalies = snapshot.decode_anomalies,
            resyncs = snapshot.resyncs,
            buffers_dropped = snapshot.buffers_dropped,
            bytes_received = snapshot.bytes_received,
            uptime_seconds = snapshot.uptime_seconds,
            "Ingest metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_accepted: u64,
    pub handshakes_rejected: u64,
    pub frames_total: u64,
    pub records_total: u64,
    pub decode_anomalies: u64,
    pub resyncs: u64,
    pub buffers_dropped: u64,
    pub bytes_received: u64,
    pub uptime_seconds: u64,
}

/// Global metrics instance (lazy static for simplicity)
static METRICS: once_cell::sync::Lazy<Metrics> = once_cell::sync::Lazy::new(Metrics::new);

/// Get the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    &METRICS
}
