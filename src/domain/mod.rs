//! Domain models for packet monitoring.
//!
//! These types are shared by the capture tier and the ingestion tier and
//! carry no infrastructure concerns.

mod packet;

pub use packet::{PacketRecord, Protocol, StoredPacket};
