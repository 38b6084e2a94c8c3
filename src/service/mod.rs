//! # Collaborator Interfaces
//!
//! Narrow contracts to the two external collaborators the core depends on:
//! a device registry (who has connected, is it allowed) and a record sink
//! (where decoded telemetry goes). Real deployments back these with
//! persistent stores; the in-memory implementations here are the default
//! wiring and the test doubles.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;

use crate::core::record::Record;
use crate::error::Result;

/// How many recent source IPs a registry entry retains.
const MAX_TRACKED_IPS: usize = 10;

/// Device registry collaborator.
///
/// Called on every handshake and after every decode batch; implementations
/// must be safe for concurrent sessions.
#[async_trait]
pub trait DeviceRegistry: Send + Sync {
    /// Record a connection from `imei`. Returns true if this is the first
    /// time the device has been seen.
    async fn register_connection(&self, imei: &str, source_ip: IpAddr) -> bool;

    /// Record `count` successfully decoded records for `imei`.
    async fn register_records(&self, imei: &str, count: u64);

    /// Whether `imei` may stream. An empty allow-list accepts everything.
    async fn is_allowed(&self, imei: &str) -> bool;
}

/// Persistence collaborator consuming one decoded record at a time.
///
/// Must not block the session indefinitely; buffering and flushing are the
/// implementation's concern.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn append_record(&self, imei: &str, record: &Record) -> Result<()>;
}

/// What the registry knows about one device.
#[derive(Debug, Clone)]
pub struct RegistryEntry {
    pub first_seen: SystemTime,
    pub last_seen: SystemTime,
    pub total_connections: u64,
    pub total_records: u64,
    /// Most recent source IPs, oldest first, at most [`MAX_TRACKED_IPS`].
    pub ip_addresses: Vec<IpAddr>,
    pub last_ip: IpAddr,
}

/// In-memory [`DeviceRegistry`] with an optional allow-list.
pub struct MemoryRegistry {
    allowed: Vec<String>,
    entries: Mutex<HashMap<String, RegistryEntry>>,
}

impl MemoryRegistry {
    /// Registry accepting every device.
    pub fn new() -> Self {
        Self::with_allow_list(Vec::new())
    }

    /// Registry accepting only the listed IMEIs (empty list accepts all).
    pub fn with_allow_list(allowed: Vec<String>) -> Self {
        Self {
            allowed,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Snapshot of one device's entry.
    pub async fn entry(&self, imei: &str) -> Option<RegistryEntry> {
        self.entries.lock().await.get(imei).cloned()
    }

    /// Device count, total connections, total records.
    pub async fn stats(&self) -> (usize, u64, u64) {
        let entries = self.entries.lock().await;
        let connections = entries.values().map(|e| e.total_connections).sum();
        let records = entries.values().map(|e| e.total_records).sum();
        (entries.len(), connections, records)
    }
}

impl Default for MemoryRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRegistry for MemoryRegistry {
    async fn register_connection(&self, imei: &str, source_ip: IpAddr) -> bool {
        let mut entries = self.entries.lock().await;
        let now = SystemTime::now();

        match entries.get_mut(imei) {
            Some(entry) => {
                entry.last_seen = now;
                entry.total_connections += 1;
                entry.last_ip = source_ip;
                if !entry.ip_addresses.contains(&source_ip) {
                    entry.ip_addresses.push(source_ip);
                    if entry.ip_addresses.len() > MAX_TRACKED_IPS {
                        let excess = entry.ip_addresses.len() - MAX_TRACKED_IPS;
                        entry.ip_addresses.drain(..excess);
                    }
                }
                false
            }
            None => {
                info!(imei = %imei, ip = %source_ip, "New device registered");
                entries.insert(
                    imei.to_string(),
                    RegistryEntry {
                        first_seen: now,
                        last_seen: now,
                        total_connections: 1,
                        total_records: 0,
                        ip_addresses: vec![source_ip],
                        last_ip: source_ip,
                    },
                );
                true
            }
        }
    }

    async fn register_records(&self, imei: &str, count: u64) {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get_mut(imei) {
            entry.total_records += count;
            entry.last_seen = SystemTime::now();
        }
    }

    async fn is_allowed(&self, imei: &str) -> bool {
        self.allowed.is_empty() || self.allowed.iter().any(|a| a == imei)
    }
}

/// In-memory [`RecordSink`] collecting records per device.
pub struct MemorySink {
    records: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }

    /// All records appended for `imei`, in append order.
    pub async fn records_for(&self, imei: &str) -> Vec<Record> {
        self.records
            .lock()
            .await
            .get(imei)
            .cloned()
            .unwrap_or_default()
    }

    /// Total records across all devices.
    pub async fn total(&self) -> usize {
        self.records.lock().await.values().map(Vec::len).sum()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn append_record(&self, imei: &str, record: &Record) -> Result<()> {
        self.records
            .lock()
            .await
            .entry(imei.to_string())
            .or_default()
            .push(record.clone());
        Ok(())
    }
}

/// Shared handles the acceptor passes to every session.
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn DeviceRegistry>,
    pub sink: Arc<dyn RecordSink>,
}

impl Collaborators {
    /// In-memory wiring: a [`MemoryRegistry`] enforcing `allowed` (empty =
    /// accept all) and a [`MemorySink`].
    pub fn in_memory(allowed: Vec<String>) -> Self {
        Self {
            registry: Arc::new(MemoryRegistry::with_allow_list(allowed)),
            sink: Arc::new(MemorySink::new()),
        }
    }
}
