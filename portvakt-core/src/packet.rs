//! ## portvakt-core::packet
//! **Normalized packet events**
//!
//! Only what detection needs: addresses, ports, TCP flags and the capture
//! timestamp. Produced by the capture loop, borrowed by each detector for
//! one processing pass, then dropped.

use std::net::IpAddr;
use std::time::SystemTime;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TcpFlags {
    pub syn: bool,
    pub ack: bool,
    pub fin: bool,
    pub rst: bool,
    pub psh: bool,
    pub urg: bool,
}

impl TcpFlags {
    pub const SYN: TcpFlags = TcpFlags {
        syn: true,
        ack: false,
        fin: false,
        rst: false,
        psh: false,
        urg: false,
    };

    pub const SYN_ACK: TcpFlags = TcpFlags {
        ack: true,
        ..TcpFlags::SYN
    };

    /// SYN set, ACK clear: the opening segment of a handshake.
    pub fn is_connection_attempt(&self) -> bool {
        self.syn && !self.ack
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp(TcpFlags),
    Udp,
    /// Any other IP protocol, by number.
    Other(u8),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub timestamp: SystemTime,
    pub source: IpAddr,
    pub destination: IpAddr,
    pub transport: Transport,
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
}

impl Packet {
    pub fn tcp(
        timestamp: SystemTime,
        source: IpAddr,
        source_port: u16,
        destination: IpAddr,
        destination_port: u16,
        flags: TcpFlags,
    ) -> Self {
        Self {
            timestamp,
            source,
            destination,
            transport: Transport::Tcp(flags),
            source_port: Some(source_port),
            destination_port: Some(destination_port),
        }
    }

    pub fn tcp_flags(&self) -> Option<TcpFlags> {
        match self.transport {
            Transport::Tcp(flags) => Some(flags),
            _ => None,
        }
    }
}
