//! Shared wire-format fixtures: encoders building byte-exact frames the
//! way real devices do, so tests exercise the decoder against realistic
//! input instead of hand-typed hex.

#![allow(dead_code)]

use avl_ingest::core::checksum::crc16_ccitt;
use avl_ingest::Codec;

/// Everything needed to encode one record in either codec variant.
#[derive(Debug, Clone)]
pub struct TestRecord {
    pub timestamp_ms: u64,
    pub priority: u8,
    pub lon_deg: f64,
    pub lat_deg: f64,
    pub altitude: u16,
    pub heading: u16,
    pub satellites: u8,
    pub speed_kmh: u16,
    pub io_event_id: u16,
    pub io_u8: Vec<(u16, u8)>,
    pub io_u16: Vec<(u16, u16)>,
    pub io_u32: Vec<(u16, u32)>,
    pub io_u64: Vec<(u16, u64)>,
    /// Codec8 Extended only.
    pub io_var: Vec<(u16, Vec<u8>)>,
}

impl Default for TestRecord {
    fn default() -> Self {
        Self {
            // 2021-05-01T12:00:00Z
            timestamp_ms: 1_619_870_400_000,
            priority: 0,
            lon_deg: 14.438_000_0,
            lat_deg: 50.075_500_0,
            altitude: 200,
            heading: 90,
            satellites: 7,
            speed_kmh: 54,
            io_event_id: 0,
            io_u8: vec![(21, 4), (239, 1)],
            io_u16: vec![(66, 12543)],
            io_u32: vec![],
            io_u64: vec![],
            io_var: vec![],
        }
    }
}

impl TestRecord {
    fn io_count(&self) -> usize {
        self.io_u8.len()
            + self.io_u16.len()
            + self.io_u32.len()
            + self.io_u64.len()
            + self.io_var.len()
    }

    fn encode_fixed_part(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.timestamp_ms.to_be_bytes());
        out.push(self.priority);
        out.extend_from_slice(&(scale_coord(self.lon_deg)).to_be_bytes());
        out.extend_from_slice(&(scale_coord(self.lat_deg)).to_be_bytes());
        out.extend_from_slice(&self.altitude.to_be_bytes());
        out.extend_from_slice(&self.heading.to_be_bytes());
        out.push(self.satellites);
        out.extend_from_slice(&self.speed_kmh.to_be_bytes());
    }

    pub fn encode(&self, codec: Codec) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode_fixed_part(&mut out);

        match codec {
            Codec::Codec8 => {
                out.push(self.io_event_id as u8);
                out.push(self.io_count() as u8);

                out.push(self.io_u8.len() as u8);
                for (id, v) in &self.io_u8 {
                    out.push(*id as u8);
                    out.push(*v);
                }
                out.push(self.io_u16.len() as u8);
                for (id, v) in &self.io_u16 {
                    out.push(*id as u8);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out.push(self.io_u32.len() as u8);
                for (id, v) in &self.io_u32 {
                    out.push(*id as u8);
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out.push(self.io_u64.len() as u8);
                for (id, v) in &self.io_u64 {
                    out.push(*id as u8);
                    out.extend_from_slice(&v.to_be_bytes());
                }
            }
            Codec::Codec8Extended => {
                out.extend_from_slice(&self.io_event_id.to_be_bytes());
                out.extend_from_slice(&(self.io_count() as u16).to_be_bytes());

                out.extend_from_slice(&(self.io_u8.len() as u16).to_be_bytes());
                for (id, v) in &self.io_u8 {
                    out.extend_from_slice(&id.to_be_bytes());
                    out.push(*v);
                }
                out.extend_from_slice(&(self.io_u16.len() as u16).to_be_bytes());
                for (id, v) in &self.io_u16 {
                    out.extend_from_slice(&id.to_be_bytes());
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out.extend_from_slice(&(self.io_u32.len() as u16).to_be_bytes());
                for (id, v) in &self.io_u32 {
                    out.extend_from_slice(&id.to_be_bytes());
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out.extend_from_slice(&(self.io_u64.len() as u16).to_be_bytes());
                for (id, v) in &self.io_u64 {
                    out.extend_from_slice(&id.to_be_bytes());
                    out.extend_from_slice(&v.to_be_bytes());
                }
                out.extend_from_slice(&(self.io_var.len() as u16).to_be_bytes());
                for (id, bytes) in &self.io_var {
                    out.extend_from_slice(&id.to_be_bytes());
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
            }
        }
        out
    }
}

/// Wire encoding of a coordinate: `round(deg * 1e7)` as signed 32-bit.
pub fn scale_coord(deg: f64) -> i32 {
    (deg * 1e7).round() as i32
}

/// Wrap encoded records into one complete frame with a zeroed checksum
/// field (matching devices observed to not populate it meaningfully).
pub fn encode_frame(codec: Codec, records: &[TestRecord]) -> Vec<u8> {
    encode_frame_with_checksum(codec, records, None)
}

/// Wrap encoded records into one complete frame, optionally with a CRC-16
/// (CCITT) checksum computed over the payload.
pub fn encode_frame_with_checksum(
    codec: Codec,
    records: &[TestRecord],
    checksum: Option<u32>,
) -> Vec<u8> {
    let mut payload = vec![codec.tag(), records.len() as u8];
    for record in records {
        payload.extend_from_slice(&record.encode(codec));
    }
    frame_from_payload(&payload, checksum)
}

/// Wrap an arbitrary payload (codec byte onward) into a frame. Lets tests
/// craft malformed payloads while keeping the outer framing valid.
pub fn frame_from_payload(payload: &[u8], checksum: Option<u32>) -> Vec<u8> {
    let mut raw = vec![0u8; 4];
    raw.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    raw.extend_from_slice(payload);
    raw.extend_from_slice(&checksum.unwrap_or(0).to_be_bytes());
    raw
}

/// Frame with the correct CRC-16/CCITT in the trailing field.
pub fn encode_frame_crc_ccitt(codec: Codec, records: &[TestRecord]) -> Vec<u8> {
    let mut payload = vec![codec.tag(), records.len() as u8];
    for record in records {
        payload.extend_from_slice(&record.encode(codec));
    }
    let crc = u32::from(crc16_ccitt(&payload));
    frame_from_payload(&payload, Some(crc))
}
