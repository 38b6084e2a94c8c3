//! Device identity handshake.
//!
//! The first thing a device sends after connecting is its identity:
//!
//! ```text
//! [Length(2, big-endian)] [Length bytes of ASCII digits]
//! ```
//!
//! The server answers with a single byte: [`ACCEPT`] to start streaming,
//! [`REJECT`] before closing the connection. An identity is valid only if
//! the length field matches the remaining bytes exactly and the decoded
//! string is exactly 15 numeric characters.

/// Handshake response byte telling the device to start streaming.
pub const ACCEPT: u8 = 0x01;
/// Handshake response byte telling the device it was refused.
pub const REJECT: u8 = 0x00;
/// An IMEI is always 15 digits.
pub const IMEI_LEN: usize = 15;

/// Parse an identity handshake packet into an IMEI.
///
/// Returns `None` for anything malformed: short input, a length field that
/// disagrees with the actual byte count, a non-15-digit identity, or
/// non-numeric characters.
pub fn parse_imei(data: &[u8]) -> Option<String> {
    if data.len() < 2 {
        return None;
    }

    let declared = u16::from_be_bytes([data[0], data[1]]) as usize;
    let body = &data[2..];
    if body.len() != declared || declared != IMEI_LEN {
        return None;
    }
    if !body.iter().all(u8::is_ascii_digit) {
        return None;
    }

    // All-ASCII-digit bytes are valid UTF-8.
    String::from_utf8(body.to_vec()).ok()
}

/// Encode an identity handshake packet (used by tests and tooling).
pub fn encode_imei(imei: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + imei.len());
    out.extend_from_slice(&(imei.len() as u16).to_be_bytes());
    out.extend_from_slice(imei.as_bytes());
    out
}
