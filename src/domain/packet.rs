//! Packet metadata records.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Transport protocol of an observed packet.
///
/// Only TCP and UDP packets are ever represented; frames carrying any
/// other IP protocol are dropped by the decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    /// Wire name of the protocol.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TCP" => Ok(Protocol::Tcp),
            "UDP" => Ok(Protocol::Udp),
            _ => Err(s.to_string()),
        }
    }
}

/// One observed network packet.
///
/// Records are immutable once constructed. The serialized field names
/// match the JSON shape exchanged between the capture tier, the packet
/// store and the visualization front-end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    length: u32,
    #[serde(rename = "srcaddr")]
    source_address: Ipv4Addr,
    #[serde(rename = "dstaddr")]
    destination_address: Ipv4Addr,
    protocol: Protocol,
    #[serde(rename = "srcport")]
    source_port: u16,
    #[serde(rename = "dstport")]
    destination_port: u16,
}

impl PacketRecord {
    /// Create a new packet record.
    pub fn new(
        length: u32,
        source_address: Ipv4Addr,
        destination_address: Ipv4Addr,
        protocol: Protocol,
        source_port: u16,
        destination_port: u16,
    ) -> Self {
        Self {
            length,
            source_address,
            destination_address,
            protocol,
            source_port,
            destination_port,
        }
    }

    /// Total captured byte count of the frame.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn source_address(&self) -> Ipv4Addr {
        self.source_address
    }

    pub fn destination_address(&self) -> Ipv4Addr {
        self.destination_address
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn source_port(&self) -> u16 {
        self.source_port
    }

    pub fn destination_port(&self) -> u16 {
        self.destination_port
    }
}

impl fmt::Display for PacketRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}:{} -> {}:{} ({} bytes)",
            self.protocol,
            self.source_address,
            self.source_port,
            self.destination_address,
            self.destination_port,
            self.length
        )
    }
}

/// A packet record committed to the packet store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPacket {
    /// Store-assigned identity.
    pub id: u32,
    #[serde(flatten)]
    pub record: PacketRecord,
}

impl StoredPacket {
    pub fn new(id: u32, record: PacketRecord) -> Self {
        Self { id, record }
    }
}
