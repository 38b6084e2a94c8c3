//! Optional frame checksum verification.
//!
//! The wire format reserves a trailing 4-byte field historically meant as a
//! CRC-16 over the payload (codec byte through last record byte). Deployed
//! firmware has been observed with two mutually inconsistent algorithms, so
//! verification is pluggable and off by default; a mismatch is reported as
//! a [`DecodeAnomaly`](crate::core::record::DecodeAnomaly), never used to
//! reject a frame.

use serde::{Deserialize, Serialize};

/// Which checksum algorithm, if any, to verify against the trailing field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumMode {
    /// No verification (matches observed production device behavior).
    #[default]
    Off,
    /// CRC-CCITT, polynomial 0x1021, init 0.
    Crc16Ccitt,
    /// Reflected CRC-16/ARC, polynomial 0xA001, init 0.
    Crc16Arc,
}

/// CRC-CCITT (polynomial 0x1021, init 0) over `data`.
pub fn crc16_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Reflected CRC-16/ARC (polynomial 0xA001, init 0) over `data`.
pub fn crc16_arc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= byte as u16;
        for _ in 0..8 {
            if crc & 0x0001 != 0 {
                crc = (crc >> 1) ^ 0xA001;
            } else {
                crc >>= 1;
            }
        }
    }
    crc
}

/// Compute the checksum `mode` selects, or None when verification is off.
pub fn compute(mode: ChecksumMode, payload: &[u8]) -> Option<u16> {
    match mode {
        ChecksumMode::Off => None,
        ChecksumMode::Crc16Ccitt => Some(crc16_ccitt(payload)),
        ChecksumMode::Crc16Arc => Some(crc16_arc(payload)),
    }
}
