//! # Error Types
//!
//! Error handling for the AVL ingest server.
//!
//! This module defines all error variants that can occur while serving
//! device connections, from low-level I/O failures to protocol violations.
//!
//! ## Error Categories
//! - **I/O Errors**: socket read/write failures
//! - **Protocol Errors**: malformed identity handshake, unknown codec tags,
//!   frames that cannot be decoded at all
//! - **Session Errors**: idle timeouts, rejected devices
//! - **Configuration Errors**: invalid TOML or out-of-range settings
//!
//! Recoverable conditions (framing desync, partial frames, anomalous
//! records) are deliberately *not* errors: the extractor resynchronizes and
//! the decoder degrades per-record, reporting anomalies through
//! [`DecodeAnomaly`](crate::core::record::DecodeAnomaly) instead of failing
//! the whole frame.

use std::io;
use thiserror::Error;

/// Primary error type for all ingest operations.
#[derive(Error, Debug)]
pub enum AvlError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed identity handshake")]
    MalformedIdentity,

    #[error("Device {0} rejected by allow-list")]
    IdentityRejected(String),

    #[error("Connection timed out (no activity)")]
    ConnectionTimeout,

    #[error("Unknown codec tag: 0x{0:02X}")]
    UnknownCodec(u8),

    #[error("Frame too short: {len} bytes")]
    FrameTooShort { len: usize },

    #[error("Frame length field inconsistent: declared {declared}, slice is {actual} bytes")]
    FrameLengthMismatch { declared: usize, actual: usize },

    #[error("Record sink error: {0}")]
    Sink(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Type alias for Results using AvlError
pub type Result<T> = std::result::Result<T, AvlError>;
