//! ## portvakt-capture::decode
//! **Frame → [`Packet`] decoding**
//!
//! Frames that are not IPv4/IPv6 decode to `Ok(None)`; frames that claim to be
//! IP but cannot be sliced are a [`DecodeError`]. Neither is fatal to the
//! capture loop.

use std::net::IpAddr;
use std::time::SystemTime;

use etherparse::{NetSlice, SlicedPacket, TransportSlice};
use portvakt_core::{Packet, TcpFlags, Transport};
use thiserror::Error;

const ETHERTYPE_IPV4: u16 = 0x0800;
const ETHERTYPE_IPV6: u16 = 0x86dd;
const LINUX_SLL_HEADER: usize = 16;
const BSD_LOOPBACK_HEADER: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame truncated: {0} bytes")]
    Truncated(usize),
    #[error("malformed frame: {0}")]
    Malformed(String),
}

/// Link-layer framing in front of the IP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    Ethernet,
    /// No link header, the frame starts with the IP header.
    RawIp,
    /// BSD `DLT_NULL` / `DLT_LOOP`: 4-byte address family.
    Loopback,
    /// Linux cooked capture (`any` pseudo-interface).
    LinuxCooked,
}

impl LinkKind {
    /// Maps a pcap data link type number.
    pub fn from_dlt(dlt: i32) -> Option<Self> {
        match dlt {
            1 => Some(Self::Ethernet),
            0 | 108 => Some(Self::Loopback),
            12 | 14 | 101 | 228 | 229 => Some(Self::RawIp),
            113 => Some(Self::LinuxCooked),
            _ => None,
        }
    }
}

pub fn decode(
    link: LinkKind,
    frame: &[u8],
    timestamp: SystemTime,
) -> Result<Option<Packet>, DecodeError> {
    let sliced = match link {
        LinkKind::Ethernet => SlicedPacket::from_ethernet(frame).map_err(malformed)?,
        LinkKind::RawIp => SlicedPacket::from_ip(frame).map_err(malformed)?,
        LinkKind::Loopback => {
            let ip = frame
                .get(BSD_LOOPBACK_HEADER..)
                .ok_or(DecodeError::Truncated(frame.len()))?;
            SlicedPacket::from_ip(ip).map_err(malformed)?
        }
        LinkKind::LinuxCooked => {
            let protocol = frame
                .get(14..LINUX_SLL_HEADER)
                .map(|b| u16::from_be_bytes([b[0], b[1]]))
                .ok_or(DecodeError::Truncated(frame.len()))?;
            if protocol != ETHERTYPE_IPV4 && protocol != ETHERTYPE_IPV6 {
                return Ok(None);
            }
            SlicedPacket::from_ip(&frame[LINUX_SLL_HEADER..]).map_err(malformed)?
        }
    };

    let (source, destination, protocol) = match &sliced.net {
        Some(NetSlice::Ipv4(ip)) => (
            IpAddr::V4(ip.header().source_addr()),
            IpAddr::V4(ip.header().destination_addr()),
            ip.payload().ip_number.0,
        ),
        Some(NetSlice::Ipv6(ip)) => (
            IpAddr::V6(ip.header().source_addr()),
            IpAddr::V6(ip.header().destination_addr()),
            ip.payload().ip_number.0,
        ),
        #[allow(unreachable_patterns)]
        _ => return Ok(None),
    };

    let (transport, source_port, destination_port) = match &sliced.transport {
        Some(TransportSlice::Tcp(tcp)) => (
            Transport::Tcp(TcpFlags {
                syn: tcp.syn(),
                ack: tcp.ack(),
                fin: tcp.fin(),
                rst: tcp.rst(),
                psh: tcp.psh(),
                urg: tcp.urg(),
            }),
            Some(tcp.source_port()),
            Some(tcp.destination_port()),
        ),
        Some(TransportSlice::Udp(udp)) => (
            Transport::Udp,
            Some(udp.source_port()),
            Some(udp.destination_port()),
        ),
        _ => (Transport::Other(protocol), None, None),
    };

    Ok(Some(Packet {
        timestamp,
        source,
        destination,
        transport,
        source_port,
        destination_port,
    }))
}

fn malformed<E: std::fmt::Display>(err: E) -> DecodeError {
    DecodeError::Malformed(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use etherparse::PacketBuilder;

    const MAC_A: [u8; 6] = [0x02, 0, 0, 0, 0, 0x01];
    const MAC_B: [u8; 6] = [0x02, 0, 0, 0, 0, 0x02];

    fn at() -> SystemTime {
        SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000)
    }

    fn ethernet_syn(ack: bool) -> Vec<u8> {
        let builder = PacketBuilder::ethernet2(MAC_A, MAC_B)
            .ipv4([10, 0, 0, 5], [10, 0, 0, 1], 64)
            .tcp(40000, 22, 1, 1024)
            .syn();
        let builder = if ack { builder.ack(1) } else { builder };
        let mut frame = Vec::with_capacity(builder.size(0));
        builder.write(&mut frame, &[]).unwrap();
        frame
    }

    #[test]
    fn ethernet_syn_is_a_connection_attempt() {
        let packet = decode(LinkKind::Ethernet, &ethernet_syn(false), at())
            .unwrap()
            .unwrap();

        assert_eq!(packet.source, "10.0.0.5".parse::<IpAddr>().unwrap());
        assert_eq!(packet.destination, "10.0.0.1".parse::<IpAddr>().unwrap());
        assert_eq!(packet.source_port, Some(40000));
        assert_eq!(packet.destination_port, Some(22));
        assert_eq!(packet.timestamp, at());
        assert!(packet.tcp_flags().unwrap().is_connection_attempt());
    }

    #[test]
    fn syn_ack_flags_survive_decode() {
        let packet = decode(LinkKind::Ethernet, &ethernet_syn(true), at())
            .unwrap()
            .unwrap();
        let flags = packet.tcp_flags().unwrap();
        assert!(flags.syn && flags.ack);
        assert!(!flags.is_connection_attempt());
    }

    #[test]
    fn raw_ipv6_udp() {
        let builder = PacketBuilder::ipv6([0xfe; 16], [0xfd; 16], 32).udp(5353, 5353);
        let mut frame = Vec::new();
        builder.write(&mut frame, b"hi").unwrap();

        let packet = decode(LinkKind::RawIp, &frame, at()).unwrap().unwrap();
        assert_eq!(packet.transport, Transport::Udp);
        assert!(packet.source.is_ipv6());
        assert_eq!(packet.destination_port, Some(5353));
    }

    #[test]
    fn loopback_skips_family_header() {
        let builder = PacketBuilder::ipv4([127, 0, 0, 1], [127, 0, 0, 1], 64)
            .tcp(50000, 8080, 7, 1024)
            .syn();
        let mut frame = vec![2, 0, 0, 0];
        builder.write(&mut frame, &[]).unwrap();

        let packet = decode(LinkKind::Loopback, &frame, at()).unwrap().unwrap();
        assert_eq!(packet.destination_port, Some(8080));
        assert!(packet.tcp_flags().unwrap().syn);
    }

    #[test]
    fn non_ip_ethernet_is_skipped() {
        // ARP ethertype, zero payload.
        let mut frame = Vec::new();
        frame.extend_from_slice(&MAC_B);
        frame.extend_from_slice(&MAC_A);
        frame.extend_from_slice(&0x0806u16.to_be_bytes());
        frame.extend_from_slice(&[0u8; 28]);

        assert_eq!(decode(LinkKind::Ethernet, &frame, at()), Ok(None));
    }

    #[test]
    fn cooked_capture_non_ip_is_skipped() {
        let mut frame = vec![0u8; LINUX_SLL_HEADER];
        frame[14..16].copy_from_slice(&0x0806u16.to_be_bytes());
        assert_eq!(decode(LinkKind::LinuxCooked, &frame, at()), Ok(None));
    }

    #[test]
    fn truncated_frames_are_errors() {
        assert_eq!(
            decode(LinkKind::Loopback, &[2, 0], at()),
            Err(DecodeError::Truncated(2))
        );

        let mut frame = ethernet_syn(false);
        frame.truncate(20);
        assert!(matches!(
            decode(LinkKind::Ethernet, &frame, at()),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn known_link_types() {
        assert_eq!(LinkKind::from_dlt(1), Some(LinkKind::Ethernet));
        assert_eq!(LinkKind::from_dlt(0), Some(LinkKind::Loopback));
        assert_eq!(LinkKind::from_dlt(101), Some(LinkKind::RawIp));
        assert_eq!(LinkKind::from_dlt(113), Some(LinkKind::LinuxCooked));
        assert_eq!(LinkKind::from_dlt(127), None);
    }
}
