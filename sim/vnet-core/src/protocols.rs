//! Codecs for the headers a router and a switch have to read and write.

pub mod ethernet;
pub use ethernet::EthernetFrame;

pub mod ipv4;
pub use ipv4::{Ipv4Address, Ipv4Header};

pub mod udp;
pub use udp::UdpHeader;

pub mod rip;
pub use rip::RipPacket;

pub mod utility;
