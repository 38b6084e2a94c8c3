//! Decoded data model for AVL frames and telemetry records.
//!
//! Everything in here is produced by [`crate::core::codec::decode_frame`]
//! and is immutable once built. Decode problems that do not prevent a frame
//! from being used are carried alongside the data as [`DecodeAnomaly`]
//! values rather than surfaced as errors.

use std::collections::BTreeMap;
use std::fmt;

/// Lower bound of the sane device-clock window: 2000-01-01 in ms since epoch.
pub const TIMESTAMP_MIN_MS: u64 = 946_684_800_000;
/// Upper bound of the sane device-clock window: 2100-01-01 in ms since epoch.
pub const TIMESTAMP_MAX_MS: u64 = 4_102_444_800_000;

/// The two wire-format variants of the vendor protocol.
///
/// Codec8 Extended widens IO event ids, IO group counts, and IO element ids
/// from 1 to 2 bytes and adds a fifth, variable-length IO group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Codec8,
    Codec8Extended,
}

impl Codec {
    /// Wire tag identifying Codec8.
    pub const TAG_CODEC8: u8 = 0x08;
    /// Wire tag identifying Codec8 Extended.
    pub const TAG_CODEC8_EXT: u8 = 0x8E;

    /// Map a wire tag to a codec variant, if known.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            Self::TAG_CODEC8 => Some(Codec::Codec8),
            Self::TAG_CODEC8_EXT => Some(Codec::Codec8Extended),
            _ => None,
        }
    }

    /// The wire tag for this variant.
    pub fn tag(self) -> u8 {
        match self {
            Codec::Codec8 => Self::TAG_CODEC8,
            Codec::Codec8Extended => Self::TAG_CODEC8_EXT,
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Codec8 => write!(f, "codec8"),
            Codec::Codec8Extended => write!(f, "codec8_extended"),
        }
    }
}

/// GPS block shared by both codec variants (fixed 15 bytes on the wire).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPosition {
    /// Degrees, signed; wire value is `round(deg * 1e7)` as i32.
    pub longitude: f64,
    /// Degrees, signed; wire value is `round(deg * 1e7)` as i32.
    pub latitude: f64,
    /// Meters above sea level.
    pub altitude: u16,
    /// Heading in degrees (0-359).
    pub heading: u16,
    /// Number of visible satellites.
    pub satellites: u8,
    /// Speed in km/h.
    pub speed_kmh: u16,
}

/// One IO element value. Width is fixed by the group the element arrived
/// in; `Bytes` values only occur in the Codec8 Extended variable-length
/// group and are stored opaque (vendor-specific payloads).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IoValue {
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    Bytes(Vec<u8>),
}

/// One telemetry sample.
///
/// Absent IO ids mean "not reported", never zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Device clock, milliseconds since Unix epoch, as sent.
    pub timestamp_ms: u64,
    /// Whether `timestamp_ms` falls inside the 2000-2100 sanity window.
    pub timestamp_valid: bool,
    /// Record priority (0-2 in practice, not enforced).
    pub priority: u8,
    pub position: GpsPosition,
    /// IO id that triggered this record; 0 means time-based.
    pub io_event_id: u16,
    /// Reported IO elements keyed by id. Unique per record.
    pub io: BTreeMap<u16, IoValue>,
}

/// Non-fatal problems observed while decoding a frame.
///
/// Anomalous records are still emitted with whatever fields parsed; the
/// anomaly is reported for observability only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeAnomaly {
    /// Device clock outside the 2000-2100 window.
    InvalidTimestamp { record_index: usize, timestamp_ms: u64 },
    /// Ran out of bytes before the record's fixed fields were complete.
    /// The record was dropped and decoding of the frame stopped.
    TruncatedRecord { record_index: usize },
    /// An IO group's declared element count implied reading past the frame
    /// boundary; the group was cut at the available data.
    TruncatedIoGroup { record_index: usize, width: u16 },
    /// Codec8 Extended group count beyond any plausible device output;
    /// clamped before iterating.
    ImplausibleIoCount { record_index: usize, declared: u16 },
    /// Record-level declared IO count disagrees with the sum of the group
    /// counts actually present.
    IoCountMismatch {
        record_index: usize,
        declared: u16,
        actual: u16,
    },
    /// Header advertised more records than could be decoded.
    RecordCountMismatch { declared: u8, decoded: usize },
    /// Trailing checksum did not match (only with verification enabled).
    ChecksumMismatch { expected: u32, computed: u16 },
}

impl fmt::Display for DecodeAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeAnomaly::InvalidTimestamp {
                record_index,
                timestamp_ms,
            } => write!(
                f,
                "record {record_index}: timestamp {timestamp_ms} outside 2000-2100"
            ),
            DecodeAnomaly::TruncatedRecord { record_index } => {
                write!(f, "record {record_index}: truncated before fixed fields ended")
            }
            DecodeAnomaly::TruncatedIoGroup {
                record_index,
                width,
            } => write!(f, "record {record_index}: {width}-byte IO group truncated"),
            DecodeAnomaly::ImplausibleIoCount {
                record_index,
                declared,
            } => write!(
                f,
                "record {record_index}: implausible IO group count {declared}, clamped"
            ),
            DecodeAnomaly::IoCountMismatch {
                record_index,
                declared,
                actual,
            } => write!(
                f,
                "record {record_index}: declared {declared} IO elements, found {actual}"
            ),
            DecodeAnomaly::RecordCountMismatch { declared, decoded } => {
                write!(f, "header declared {declared} records, decoded {decoded}")
            }
            DecodeAnomaly::ChecksumMismatch { expected, computed } => {
                write!(f, "checksum mismatch: wire 0x{expected:08X}, computed 0x{computed:04X}")
            }
        }
    }
}

/// One decoded wire-level frame.
///
/// Built only once the extractor has assembled a complete wire slice;
/// record order is arrival order.
#[derive(Debug, Clone)]
pub struct Frame {
    pub codec: Codec,
    /// Record count from the frame header. A hint, not an invariant:
    /// `records.len()` is the authoritative count.
    pub declared_record_count: u8,
    pub records: Vec<Record>,
    pub anomalies: Vec<DecodeAnomaly>,
}
