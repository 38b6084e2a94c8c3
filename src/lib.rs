//! # avl-ingest
//!
//! TCP ingest server for the Teltonika AVL binary telemetry protocol.
//!
//! GPS trackers connect over raw TCP, identify themselves with a 15-digit
//! IMEI, then stream binary frames in one of two codec variants (Codec8,
//! tag 0x08; Codec8 Extended, tag 0x8E). This crate implements the
//! per-connection session protocol, the binary decoder, and the per-device
//! reassembly buffer that tolerates TCP fragmentation and mid-frame
//! disconnects.
//!
//! ## Architecture
//! ```text
//! Acceptor -> Session (per connection) -> Reassembly (per IMEI)
//!          -> Decoder -> collaborators (registry + record sink) -> ack
//! ```
//!
//! - [`transport`]: TCP acceptor and the shared per-IMEI stream map
//! - [`protocol`]: identity handshake and the session state machine
//! - [`core`]: frame extraction, the codec decoder, optional checksums
//! - [`service`]: narrow interfaces to the registry and persistence
//!   collaborators
//!
//! ## Example
//! ```no_run
//! use avl_ingest::config::IngestConfig;
//! use avl_ingest::service::Collaborators;
//!
//! #[tokio::main]
//! async fn main() -> avl_ingest::error::Result<()> {
//!     let config = IngestConfig::default();
//!     avl_ingest::utils::logging::init(&config.logging);
//!     let collaborators = Collaborators::in_memory(config.server.allowed_imeis.clone());
//!     avl_ingest::transport::start_server(config, collaborators).await
//! }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod protocol;
pub mod service;
pub mod transport;
pub mod utils;

pub use config::IngestConfig;
pub use core::checksum::ChecksumMode;
pub use core::record::{Codec, DecodeAnomaly, Frame, GpsPosition, IoValue, Record};
pub use error::{AvlError, Result};
pub use protocol::Session;
pub use service::{Collaborators, DeviceRegistry, MemoryRegistry, MemorySink, RecordSink};
pub use transport::DeviceStreamMap;
