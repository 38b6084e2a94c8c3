//! # Codec Core
//!
//! Wire-format handling for the AVL protocol: frame reassembly, binary
//! decoding, and optional checksum verification.
//!
//! ## Components
//! - **Record**: decoded data model (frames, records, IO values, anomalies)
//! - **Codec**: decoder for the Codec8 / Codec8 Extended variants
//! - **Reassembly**: per-device accumulator turning arbitrary TCP reads
//!   into whole frames
//! - **Checksum**: pluggable CRC-16 verification, off by default
//!
//! ## Wire Format
//! ```text
//! [Preamble(4)] [DataLength(4)] [Codec(1)] [Count(1)] [Records...] [Checksum(4)]
//! ```

pub mod checksum;
pub mod codec;
pub mod reassembly;
pub mod record;
