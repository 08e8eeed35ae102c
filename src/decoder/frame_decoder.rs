//! Ethernet/IPv4/TCP/UDP header decoding.

use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ip::{IpNextHeaderProtocol, IpNextHeaderProtocols};
use pnet::packet::ipv4::Ipv4Packet;
use pnet::packet::tcp::TcpPacket;
use pnet::packet::udp::UdpPacket;
use pnet::packet::Packet;

use crate::capture::RawFrame;
use crate::domain::{PacketRecord, Protocol};

/// Minimum IPv4 header length in 32-bit words.
const MIN_IPV4_IHL: u8 = 5;

/// Decoder for captured frames.
///
/// Decoding never fails loudly: frames that are not IPv4, carry a protocol
/// other than TCP or UDP, or have truncated or inconsistent headers all
/// yield `None`, so a single corrupt frame cannot halt capture.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameDecoder;

impl FrameDecoder {
    /// Create a new frame decoder.
    pub fn new() -> Self {
        Self
    }

    /// Decode a captured frame into a packet record.
    pub fn decode(&self, frame: &RawFrame) -> Option<PacketRecord> {
        if frame.ethertype != EtherTypes::Ipv4 {
            return None;
        }

        let length = u32::try_from(frame.data.len()).ok()?;
        let ethernet = EthernetPacket::new(&frame.data)?;
        let ipv4 = checked_ipv4(ethernet.payload())?;

        let protocol = transport_protocol(ipv4.get_next_level_protocol())?;
        let (source_port, destination_port) = match protocol {
            Protocol::Tcp => {
                let tcp = TcpPacket::new(ipv4.payload())?;
                (tcp.get_source(), tcp.get_destination())
            }
            Protocol::Udp => {
                let udp = UdpPacket::new(ipv4.payload())?;
                (udp.get_source(), udp.get_destination())
            }
        };

        Some(PacketRecord::new(
            length,
            ipv4.get_source(),
            ipv4.get_destination(),
            protocol,
            source_port,
            destination_port,
        ))
    }
}

/// Parse an IPv4 header, rejecting headers whose declared lengths do not
/// fit the captured bytes.
fn checked_ipv4(data: &[u8]) -> Option<Ipv4Packet<'_>> {
    let ipv4 = Ipv4Packet::new(data)?;

    if ipv4.get_version() != 4 {
        return None;
    }

    let ihl = ipv4.get_header_length();
    if ihl < MIN_IPV4_IHL {
        return None;
    }

    let header_len = usize::from(ihl) * 4;
    if header_len > data.len() || usize::from(ipv4.get_total_length()) < header_len {
        return None;
    }

    // Only the first fragment carries the transport header
    if ipv4.get_fragment_offset() != 0 {
        return None;
    }

    Some(ipv4)
}

fn transport_protocol(next: IpNextHeaderProtocol) -> Option<Protocol> {
    if next == IpNextHeaderProtocols::Tcp {
        Some(Protocol::Tcp)
    } else if next == IpNextHeaderProtocols::Udp {
        Some(Protocol::Udp)
    } else {
        None
    }
}
