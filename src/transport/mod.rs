//! # Transport Layer
//!
//! TCP listening and the cross-session device stream store.

pub mod stream_map;
pub mod tcp;

pub use stream_map::DeviceStreamMap;
pub use tcp::{serve, start_server, start_server_with_shutdown};
