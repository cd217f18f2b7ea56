//! Addressing and header handling for [Internet Protocol version
//! 4](https://datatracker.ietf.org/doc/html/rfc791).

pub mod ipv4_parsing;
pub use ipv4_parsing::{Ipv4Header, Ipv4HeaderBuilder};

mod ipv4_address;
pub use ipv4_address::Ipv4Address;

mod subnetting;
pub use subnetting::{cidr_to_ip, CidrParseError, Ipv4Mask, Ipv4Net};

/// Upper layer protocol numbers carried in the IPv4 header.
/// See <https://en.wikipedia.org/wiki/List_of_IP_protocol_numbers>
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy)]
#[repr(u8)]
pub enum ProtocolNumber {
    TCP = 6,
    UDP = 17,
    DEFAULT = 0,
}

impl From<u8> for ProtocolNumber {
    fn from(value: u8) -> Self {
        match value {
            6 => ProtocolNumber::TCP,
            17 => ProtocolNumber::UDP,
            _ => ProtocolNumber::DEFAULT,
        }
    }
}
