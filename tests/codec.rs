//! Decoder tests for both codec variants: field widths, scaled
//! coordinates, anomaly reporting, and bounds behavior on malformed input.

mod common;

use avl_ingest::core::codec::decode_frame;
use avl_ingest::{ChecksumMode, Codec, DecodeAnomaly, IoValue};
use common::{encode_frame, encode_frame_crc_ccitt, frame_from_payload, TestRecord};

// ============================================================================
// HAPPY PATH
// ============================================================================

#[test]
fn codec8_two_records_decode_in_order() {
    let first = TestRecord {
        timestamp_ms: 1_619_870_400_000,
        speed_kmh: 42,
        io_event_id: 1,
        ..TestRecord::default()
    };
    let second = TestRecord {
        timestamp_ms: 1_619_870_405_000,
        speed_kmh: 45,
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8, &[first, second]);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert_eq!(frame.codec, Codec::Codec8);
    assert_eq!(frame.declared_record_count, 2);
    assert_eq!(frame.records.len(), 2);
    assert!(frame.anomalies.is_empty());

    assert_eq!(frame.records[0].timestamp_ms, 1_619_870_400_000);
    assert_eq!(frame.records[0].position.speed_kmh, 42);
    assert_eq!(frame.records[0].io_event_id, 1);
    assert_eq!(frame.records[1].timestamp_ms, 1_619_870_405_000);
    assert_eq!(frame.records[1].position.speed_kmh, 45);

    // IO widths from the default fixture.
    assert_eq!(frame.records[0].io.get(&21), Some(&IoValue::U8(4)));
    assert_eq!(frame.records[0].io.get(&66), Some(&IoValue::U16(12543)));
    // Absent ids mean "not reported".
    assert_eq!(frame.records[0].io.get(&200), None);
}

#[test]
fn scaled_coordinates_round_trip_to_1e7() {
    let record = TestRecord {
        lon_deg: 14.438_000_0,
        lat_deg: 50.075_500_0,
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8, &[record]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");

    let position = frame.records[0].position;
    assert!((position.longitude - 14.438_000_0).abs() < 1e-7);
    assert!((position.latitude - 50.075_500_0).abs() < 1e-7);
}

#[test]
fn negative_coordinates_decode_signed() {
    let record = TestRecord {
        lon_deg: -70.648_270_0, // Santiago de Chile
        lat_deg: -33.456_890_0,
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8, &[record]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");

    let position = frame.records[0].position;
    assert!((position.longitude - -70.648_270_0).abs() < 1e-7);
    assert!((position.latitude - -33.456_890_0).abs() < 1e-7);
}

#[test]
fn codec8_extended_all_five_groups() {
    let record = TestRecord {
        io_event_id: 385,
        io_u8: vec![(21, 4)],
        io_u16: vec![(66, 12800)],
        io_u32: vec![(241, 159_648)],
        io_u64: vec![(16, 1_234_567_890)],
        io_var: vec![(385, vec![0xDE, 0xAD, 0xBE, 0xEF])],
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8Extended, &[record]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");

    assert_eq!(frame.codec, Codec::Codec8Extended);
    assert_eq!(frame.records.len(), 1);
    assert!(frame.anomalies.is_empty());

    let io = &frame.records[0].io;
    assert_eq!(io.get(&21), Some(&IoValue::U8(4)));
    assert_eq!(io.get(&66), Some(&IoValue::U16(12800)));
    assert_eq!(io.get(&241), Some(&IoValue::U32(159_648)));
    assert_eq!(io.get(&16), Some(&IoValue::U64(1_234_567_890)));
    assert_eq!(
        io.get(&385),
        Some(&IoValue::Bytes(vec![0xDE, 0xAD, 0xBE, 0xEF]))
    );
    assert_eq!(frame.records[0].io_event_id, 385);
}

#[test]
fn codec8_extended_carries_wide_io_ids() {
    // Id 385 does not fit in Codec8's 1-byte id space; only the Extended
    // variant can express it.
    let record = TestRecord {
        io_u8: vec![(385, 1)],
        io_u16: vec![],
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8Extended, &[record]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert_eq!(frame.records[0].io.get(&385), Some(&IoValue::U8(1)));
}

#[test]
fn decodes_documented_vendor_capture() {
    // Codec8 frame from the vendor's protocol documentation: one record,
    // zeroed GPS, five IO elements, CRC-16 (ARC) in the trailing field.
    let raw = hex::decode(
        "000000000000003608010000016B40D8EA30010000000000000000000000000000000105021503010101425E0F01F10000601A014E0000000000000000010000C7CF",
    )
    .expect("hex");

    let frame = decode_frame(&raw, ChecksumMode::Crc16Arc).expect("decode");
    assert!(frame.anomalies.is_empty());
    assert_eq!(frame.codec, Codec::Codec8);
    assert_eq!(frame.records.len(), 1);

    let record = &frame.records[0];
    assert_eq!(record.timestamp_ms, 0x0000_016B_40D8_EA30);
    assert!(record.timestamp_valid);
    assert_eq!(record.priority, 1);
    assert_eq!(record.io_event_id, 1);
    assert_eq!(record.io.len(), 5);
    assert_eq!(record.io.get(&0x15), Some(&IoValue::U8(3)));
    assert_eq!(record.io.get(&0x42), Some(&IoValue::U16(0x5E0F)));
    assert_eq!(record.io.get(&0xF1), Some(&IoValue::U32(0x0000_601A)));
    assert_eq!(record.io.get(&0x4E), Some(&IoValue::U64(0)));
}

// ============================================================================
// ANOMALIES
// ============================================================================

#[test]
fn out_of_range_timestamp_flagged_not_fatal() {
    let record = TestRecord {
        timestamp_ms: 42, // 1970, long before the 2000 floor
        ..TestRecord::default()
    };
    let raw = encode_frame(Codec::Codec8, &[record]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");

    assert_eq!(frame.records.len(), 1);
    assert!(!frame.records[0].timestamp_valid);
    assert_eq!(frame.records[0].timestamp_ms, 42);
    assert!(frame
        .anomalies
        .iter()
        .any(|a| matches!(a, DecodeAnomaly::InvalidTimestamp { timestamp_ms: 42, .. })));
}

#[test]
fn truncated_io_group_emits_partial_record() {
    // Codec8 record whose 1-byte group declares 5 elements but the payload
    // ends after one.
    let record = TestRecord {
        io_u8: vec![(21, 4)],
        io_u16: vec![],
        ..TestRecord::default()
    };
    let mut body = record.encode(Codec::Codec8);
    // Rewrite the 1-byte group count (offset: fixed part 24 + event 1 +
    // total 1 = byte 26) and cut everything after its first element.
    body[26] = 5;
    body.truncate(26 + 1 + 2);

    let mut payload = vec![Codec::Codec8.tag(), 1];
    payload.extend_from_slice(&body);
    let raw = frame_from_payload(&payload, None);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert_eq!(frame.records.len(), 1, "partial record is still emitted");
    assert_eq!(frame.records[0].io.get(&21), Some(&IoValue::U8(4)));
    assert!(frame
        .anomalies
        .iter()
        .any(|a| matches!(a, DecodeAnomaly::TruncatedIoGroup { width: 1, .. })));
}

#[test]
fn header_count_is_a_hint_not_an_invariant() {
    // Header advertises 3 records, payload carries 2.
    let records = [TestRecord::default(), TestRecord::default()];
    let mut payload = vec![Codec::Codec8.tag(), 3];
    for record in &records {
        payload.extend_from_slice(&record.encode(Codec::Codec8));
    }
    let raw = frame_from_payload(&payload, None);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert_eq!(frame.records.len(), 2);
    assert!(frame.anomalies.iter().any(|a| matches!(
        a,
        DecodeAnomaly::RecordCountMismatch {
            declared: 3,
            decoded: 2
        }
    )));
}

#[test]
fn declared_io_count_mismatch_flagged() {
    let record = TestRecord::default();
    let mut body = record.encode(Codec::Codec8);
    body[25] = 9; // record-level total IO count, actual groups carry 3
    let mut payload = vec![Codec::Codec8.tag(), 1];
    payload.extend_from_slice(&body);
    let raw = frame_from_payload(&payload, None);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert_eq!(frame.records.len(), 1);
    assert!(frame.anomalies.iter().any(|a| matches!(
        a,
        DecodeAnomaly::IoCountMismatch {
            declared: 9,
            actual: 3,
            ..
        }
    )));
}

#[test]
fn implausible_codec8e_group_count_clamped() {
    let record = TestRecord {
        io_u8: vec![],
        io_u16: vec![],
        ..TestRecord::default()
    };
    let mut body = record.encode(Codec::Codec8Extended);
    // First group count sits right after the 2-byte event id and 2-byte
    // total count: fixed part 24 + 4 = offset 28..30.
    body[28..30].copy_from_slice(&50_000u16.to_be_bytes());

    let mut payload = vec![Codec::Codec8Extended.tag(), 1];
    payload.extend_from_slice(&body);
    let raw = frame_from_payload(&payload, None);

    // Must terminate (the clamp bounds the loop) and must not panic.
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert!(frame.anomalies.iter().any(|a| matches!(
        a,
        DecodeAnomaly::ImplausibleIoCount {
            declared: 50_000,
            ..
        }
    )));
}

// ============================================================================
// CROSS-TAGGED AND MALFORMED INPUT
// ============================================================================

#[test]
fn codec8e_bytes_tagged_as_codec8_fail_gracefully() {
    let record = TestRecord {
        io_var: vec![(385, vec![1, 2, 3])],
        ..TestRecord::default()
    };
    let mut payload = vec![Codec::Codec8.tag(), 1]; // lying tag
    payload.extend_from_slice(&record.encode(Codec::Codec8Extended));
    let raw = frame_from_payload(&payload, None);

    // Garbage is confined to the record: no panic, no out-of-bounds read,
    // and nothing decoded beyond the single declared record.
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert!(frame.records.len() <= 1);
}

#[test]
fn codec8_bytes_tagged_as_codec8e_fail_gracefully() {
    let record = TestRecord::default();
    let mut payload = vec![Codec::Codec8Extended.tag(), 1];
    payload.extend_from_slice(&record.encode(Codec::Codec8));
    let raw = frame_from_payload(&payload, None);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert!(frame.records.len() <= 1);
}

#[test]
fn record_truncated_mid_gps_is_dropped() {
    let record = TestRecord::default();
    let mut body = record.encode(Codec::Codec8);
    body.truncate(12); // ends inside the GPS block

    let mut payload = vec![Codec::Codec8.tag(), 1];
    payload.extend_from_slice(&body);
    let raw = frame_from_payload(&payload, None);

    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert!(frame.records.is_empty());
    assert!(frame
        .anomalies
        .iter()
        .any(|a| matches!(a, DecodeAnomaly::TruncatedRecord { record_index: 0 })));
}

// ============================================================================
// CHECKSUM MODES
// ============================================================================

#[test]
fn matching_crc_ccitt_passes_clean() {
    let raw = encode_frame_crc_ccitt(Codec::Codec8, &[TestRecord::default()]);
    let frame = decode_frame(&raw, ChecksumMode::Crc16Ccitt).expect("decode");
    assert!(frame.anomalies.is_empty());
}

#[test]
fn mismatching_checksum_is_anomaly_not_rejection() {
    let raw = encode_frame(Codec::Codec8, &[TestRecord::default()]); // zeroed field
    let frame = decode_frame(&raw, ChecksumMode::Crc16Ccitt).expect("decode");
    assert_eq!(frame.records.len(), 1, "frame still decodes");
    assert!(frame
        .anomalies
        .iter()
        .any(|a| matches!(a, DecodeAnomaly::ChecksumMismatch { .. })));
}

#[test]
fn checksum_off_ignores_the_field() {
    let raw = encode_frame(Codec::Codec8, &[TestRecord::default()]);
    let frame = decode_frame(&raw, ChecksumMode::Off).expect("decode");
    assert!(frame.anomalies.is_empty());
}
