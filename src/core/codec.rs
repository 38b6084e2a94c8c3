//! Binary decoder for the two AVL codec variants.
//!
//! Input is one complete wire frame as assembled by the
//! [reassembly](crate::core::reassembly) layer:
//!
//! ```text
//! [Preamble(4) = 0x00000000] [DataLength(4)] [Codec(1)] [Count(1)] [Records...] [Checksum(4)]
//! ```
//!
//! `DataLength` spans the codec byte through the last record byte. All
//! integers are big-endian.
//!
//! ## Decode policy
//! Header counts are hints, not invariants. Every loop is bounded by the
//! remaining payload, never solely by a declared count; running out of
//! bytes stops the current record (and the frame's record loop), surfaces a
//! [`DecodeAnomaly`], and keeps everything already decoded. Only a frame
//! whose header itself is unusable (unknown codec tag, inconsistent length
//! field) fails outright.

use std::collections::BTreeMap;

use crate::core::checksum::{self, ChecksumMode};
use crate::core::record::{
    Codec, DecodeAnomaly, Frame, GpsPosition, IoValue, Record, TIMESTAMP_MAX_MS, TIMESTAMP_MIN_MS,
};
use crate::error::{AvlError, Result};

/// Every frame opens with four zero bytes.
pub const PREAMBLE: [u8; 4] = [0x00, 0x00, 0x00, 0x00];
/// Preamble + data-length field.
pub const HEADER_LEN: usize = 8;
/// Trailing checksum field.
pub const CHECKSUM_LEN: usize = 4;
/// Smallest data length worth considering (codec + count + anything).
pub const MIN_DATA_LENGTH: u32 = 4;
/// Largest plausible data length; anything above this is a misaligned read.
pub const MAX_DATA_LENGTH: u32 = 100_000;

/// Codec8 Extended group counts above this are treated as stream corruption.
const CODEC8E_COUNT_LIMIT: u16 = 100;
/// Clamp applied to corrupt fixed-width group counts before iterating.
const CODEC8E_FIXED_CLAMP: u16 = 20;
/// Clamp applied to corrupt variable-length group counts before iterating.
const CODEC8E_VAR_CLAMP: u16 = 10;

/// Decode one complete wire frame into records.
///
/// `raw` must be exactly one frame (the extractor guarantees this). The
/// returned [`Frame`] carries all fully decoded records plus any anomalies
/// observed; `Err` is reserved for frames whose header makes decoding
/// impossible.
pub fn decode_frame(raw: &[u8], checksum_mode: ChecksumMode) -> Result<Frame> {
    if raw.len() < HEADER_LEN + MIN_DATA_LENGTH as usize + CHECKSUM_LEN {
        return Err(AvlError::FrameTooShort { len: raw.len() });
    }

    let declared_len = u32::from_be_bytes([raw[4], raw[5], raw[6], raw[7]]) as usize;
    let expected_total = HEADER_LEN + declared_len + CHECKSUM_LEN;
    if raw.len() != expected_total {
        return Err(AvlError::FrameLengthMismatch {
            declared: expected_total,
            actual: raw.len(),
        });
    }

    let payload = &raw[HEADER_LEN..HEADER_LEN + declared_len];
    let codec = Codec::from_tag(payload[0]).ok_or(AvlError::UnknownCodec(payload[0]))?;
    let declared_record_count = payload[1];

    let mut anomalies = Vec::new();

    if let Some(computed) = checksum::compute(checksum_mode, payload) {
        let tail = &raw[raw.len() - CHECKSUM_LEN..];
        let wire = u32::from_be_bytes([tail[0], tail[1], tail[2], tail[3]]);
        if u32::from(computed) != wire {
            anomalies.push(DecodeAnomaly::ChecksumMismatch {
                expected: wire,
                computed,
            });
        }
    }

    let mut reader = Reader::new(&payload[2..]);
    let mut records = Vec::with_capacity(declared_record_count as usize);

    for index in 0..declared_record_count as usize {
        if reader.remaining() == 0 {
            break;
        }
        match decode_record(codec, &mut reader, index, &mut anomalies) {
            Decoded::Complete(record) => records.push(record),
            Decoded::Partial(record) => {
                // Offsets past a cut group are unreliable, stop here.
                records.push(record);
                break;
            }
            Decoded::Truncated => break,
        }
    }

    if records.len() != declared_record_count as usize {
        anomalies.push(DecodeAnomaly::RecordCountMismatch {
            declared: declared_record_count,
            decoded: records.len(),
        });
    }

    Ok(Frame {
        codec,
        declared_record_count,
        records,
        anomalies,
    })
}

/// Outcome of decoding a single record.
enum Decoded {
    /// Fully decoded; the reader sits at the next record boundary.
    Complete(Record),
    /// Usable but an IO group was cut short; the reader position is no
    /// longer trustworthy.
    Partial(Record),
    /// Fixed fields incomplete; nothing usable.
    Truncated,
}

enum GroupStatus {
    Complete,
    Truncated,
}

fn decode_record(
    codec: Codec,
    reader: &mut Reader<'_>,
    index: usize,
    anomalies: &mut Vec<DecodeAnomaly>,
) -> Decoded {
    // Timestamp through GPS block is byte-identical in both variants.
    let fixed = (|| {
        let timestamp_ms = reader.u64()?;
        let priority = reader.u8()?;
        let longitude = reader.i32()?;
        let latitude = reader.i32()?;
        let altitude = reader.u16()?;
        let heading = reader.u16()?;
        let satellites = reader.u8()?;
        let speed_kmh = reader.u16()?;
        Some((
            timestamp_ms,
            priority,
            GpsPosition {
                longitude: f64::from(longitude) / 1e7,
                latitude: f64::from(latitude) / 1e7,
                altitude,
                heading,
                satellites,
                speed_kmh,
            },
        ))
    })();
    let Some((timestamp_ms, priority, position)) = fixed else {
        anomalies.push(DecodeAnomaly::TruncatedRecord {
            record_index: index,
        });
        return Decoded::Truncated;
    };

    let header = match codec {
        Codec::Codec8 => reader
            .u8()
            .and_then(|event| reader.u8().map(|count| (u16::from(event), u16::from(count)))),
        Codec::Codec8Extended => reader
            .u16()
            .and_then(|event| reader.u16().map(|count| (event, count))),
    };
    let Some((io_event_id, declared_io_count)) = header else {
        anomalies.push(DecodeAnomaly::TruncatedRecord {
            record_index: index,
        });
        return Decoded::Truncated;
    };

    let timestamp_valid = (TIMESTAMP_MIN_MS..=TIMESTAMP_MAX_MS).contains(&timestamp_ms);
    if !timestamp_valid {
        anomalies.push(DecodeAnomaly::InvalidTimestamp {
            record_index: index,
            timestamp_ms,
        });
    }

    let mut io = BTreeMap::new();
    let mut cut = false;
    for width in [1u16, 2, 4, 8] {
        let status = match codec {
            Codec::Codec8 => fixed_group_codec8(reader, width, &mut io),
            Codec::Codec8Extended => fixed_group_codec8e(reader, width, index, &mut io, anomalies),
        };
        if matches!(status, GroupStatus::Truncated) {
            anomalies.push(DecodeAnomaly::TruncatedIoGroup {
                record_index: index,
                width,
            });
            cut = true;
            break;
        }
    }
    if !cut && codec == Codec::Codec8Extended {
        if matches!(
            variable_group_codec8e(reader, index, &mut io, anomalies),
            GroupStatus::Truncated
        ) {
            anomalies.push(DecodeAnomaly::TruncatedIoGroup {
                record_index: index,
                width: 0,
            });
            cut = true;
        }
    }

    if !cut && io.len() as u16 != declared_io_count {
        anomalies.push(DecodeAnomaly::IoCountMismatch {
            record_index: index,
            declared: declared_io_count,
            actual: io.len() as u16,
        });
    }

    let record = Record {
        timestamp_ms,
        timestamp_valid,
        priority,
        position,
        io_event_id,
        io,
    };
    if cut {
        Decoded::Partial(record)
    } else {
        Decoded::Complete(record)
    }
}

/// Codec8 fixed-width group: 1-byte count, then 1-byte id + value per element.
fn fixed_group_codec8(
    reader: &mut Reader<'_>,
    width: u16,
    io: &mut BTreeMap<u16, IoValue>,
) -> GroupStatus {
    let Some(count) = reader.u8() else {
        return GroupStatus::Truncated;
    };
    for _ in 0..count {
        let element = reader
            .u8()
            .and_then(|id| read_fixed_value(reader, width).map(|value| (u16::from(id), value)));
        let Some((id, value)) = element else {
            return GroupStatus::Truncated;
        };
        io.insert(id, value);
    }
    GroupStatus::Complete
}

/// Codec8 Extended fixed-width group: 2-byte count, then 2-byte id + value.
fn fixed_group_codec8e(
    reader: &mut Reader<'_>,
    width: u16,
    index: usize,
    io: &mut BTreeMap<u16, IoValue>,
    anomalies: &mut Vec<DecodeAnomaly>,
) -> GroupStatus {
    let Some(mut count) = reader.u16() else {
        return GroupStatus::Truncated;
    };
    if count > CODEC8E_COUNT_LIMIT {
        anomalies.push(DecodeAnomaly::ImplausibleIoCount {
            record_index: index,
            declared: count,
        });
        count = count.min(CODEC8E_FIXED_CLAMP);
    }
    for _ in 0..count {
        let element = reader
            .u16()
            .and_then(|id| read_fixed_value(reader, width).map(|value| (id, value)));
        let Some((id, value)) = element else {
            return GroupStatus::Truncated;
        };
        io.insert(id, value);
    }
    GroupStatus::Complete
}

/// Codec8 Extended "X" group: 2-byte count, then per element a 2-byte id,
/// a 2-byte length, and that many opaque bytes.
fn variable_group_codec8e(
    reader: &mut Reader<'_>,
    index: usize,
    io: &mut BTreeMap<u16, IoValue>,
    anomalies: &mut Vec<DecodeAnomaly>,
) -> GroupStatus {
    let Some(mut count) = reader.u16() else {
        return GroupStatus::Truncated;
    };
    if count > CODEC8E_COUNT_LIMIT {
        anomalies.push(DecodeAnomaly::ImplausibleIoCount {
            record_index: index,
            declared: count,
        });
        count = count.min(CODEC8E_VAR_CLAMP);
    }
    for _ in 0..count {
        let element = (|| {
            let id = reader.u16()?;
            let len = reader.u16()?;
            let bytes = reader.take(usize::from(len))?;
            Some((id, IoValue::Bytes(bytes.to_vec())))
        })();
        let Some((id, value)) = element else {
            return GroupStatus::Truncated;
        };
        io.insert(id, value);
    }
    GroupStatus::Complete
}

fn read_fixed_value(reader: &mut Reader<'_>, width: u16) -> Option<IoValue> {
    match width {
        1 => reader.u8().map(IoValue::U8),
        2 => reader.u16().map(IoValue::U16),
        4 => reader.u32().map(IoValue::U32),
        8 => reader.u64().map(IoValue::U64),
        _ => None,
    }
}

/// Bounds-checked big-endian cursor over a record payload. Every accessor
/// returns `None` instead of reading past the end.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.remaining() < n {
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_be_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.u32().map(|v| v as i32)
    }

    fn u64(&mut self) -> Option<u64> {
        self.take(8).map(|b| {
            u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
        })
    }
}
