//! # Session Protocol
//!
//! The per-connection conversation with a device: identity handshake,
//! then the decode-acknowledge cycle.
//!
//! ## Wire exchanges
//! - Handshake: `[Length(2)][ASCII digits]` -> `0x01` accept / `0x00` reject
//! - Data: one or more frames -> `[4B BE record count]` acknowledgement

pub mod identity;
pub mod session;

pub use session::Session;
