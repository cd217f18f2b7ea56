//! Header handling for the [User Datagram
//! Protocol](https://www.ietf.org/rfc/rfc768.txt).

use super::{
    ethernet::{self, ETHER_TYPE_IPV4},
    ipv4::{ipv4_parsing::HeaderBuildError, Ipv4Address, Ipv4HeaderBuilder, ProtocolNumber},
};
use crate::network::Mac;
use thiserror::Error as ThisError;

mod udp_parsing;
pub use udp_parsing::{build_udp_header, BuildHeaderError, ParseError, UdpHeader, HEADER_OCTETS};

/// The link and network layer addressing of a datagram a device originates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub source_mac: Mac,
    pub destination_mac: Mac,
    pub source_ip: Ipv4Address,
    pub destination_ip: Ipv4Address,
    pub time_to_live: u8,
}

/// Encapsulates a UDP payload into a complete Ethernet frame.
pub fn build_udp_frame(
    route: Route,
    source_port: u16,
    destination_port: u16,
    payload: &[u8],
) -> Result<Vec<u8>, FrameBuildError> {
    let udp_header = build_udp_header(
        route.source_ip,
        source_port,
        route.destination_ip,
        destination_port,
        payload,
    )?;
    let ip_header = Ipv4HeaderBuilder::new(
        route.source_ip,
        route.destination_ip,
        ProtocolNumber::UDP as u8,
        (udp_header.len() + payload.len()) as u16,
    )
    .time_to_live(route.time_to_live)
    .build()?;
    Ok(ethernet::build_frame(
        route.destination_mac,
        route.source_mac,
        ETHER_TYPE_IPV4,
        [ip_header.as_slice(), &udp_header, payload],
    ))
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum FrameBuildError {
    #[error("{0}")]
    Udp(#[from] BuildHeaderError),
    #[error("{0}")]
    Ipv4(#[from] HeaderBuildError),
}
