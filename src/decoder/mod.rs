//! Frame decoding module.
//!
//! Turns raw link-layer frames into packet records (SRP).

mod frame_decoder;

pub use frame_decoder::FrameDecoder;
