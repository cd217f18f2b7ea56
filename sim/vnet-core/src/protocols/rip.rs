//! Wire support for the [Routing Information Protocol version
//! 2](https://www.rfc-editor.org/rfc/rfc2453).
//!
//! RIP messages travel in UDP datagrams from port 520 to port 520. Table
//! broadcasts go to the multicast group `224.0.0.9` in Ethernet broadcast
//! frames; answers to requests are unicast.

use super::{
    ipv4::Ipv4Address,
    udp::{build_udp_frame, FrameBuildError, Route},
};
use crate::network::Mac;

mod rip_parsing;
pub use rip_parsing::{
    Command, ParseError, RipEntry, RipPacket, ADDRESS_FAMILY_IPV4, MAX_ENTRIES, VERSION,
};

/// The UDP port RIP listens and sends on.
pub const RIP_PORT: u16 = 520;
/// The metric of an unreachable network.
pub const INFINITY: u32 = 16;
/// The TTL of every datagram RIP sends.
pub const TIME_TO_LIVE: u8 = 255;

/// Encapsulates a RIP message into a complete Ethernet frame.
pub fn build_rip_frame(
    source_mac: Mac,
    destination_mac: Mac,
    source_ip: Ipv4Address,
    destination_ip: Ipv4Address,
    packet: &RipPacket,
) -> Result<Vec<u8>, FrameBuildError> {
    let route = Route {
        source_mac,
        destination_mac,
        source_ip,
        destination_ip,
        time_to_live: TIME_TO_LIVE,
    };
    build_udp_frame(route, RIP_PORT, RIP_PORT, &packet.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocols::ipv4::{Ipv4Mask, Ipv4Net};

    #[test]
    fn frames_parse_with_etherparse() -> anyhow::Result<()> {
        let packet = RipPacket::new_responses(&[RipEntry::new(
            Ipv4Net::new([10, 0, 1, 0].into(), Ipv4Mask::from_bitcount(24)),
            Ipv4Address::CURRENT_NETWORK,
            1,
        )])
        .remove(0);
        let source_mac = Mac::new([2, 0, 0, 0, 0, 1]);
        let frame = build_rip_frame(
            source_mac,
            Mac::BROADCAST,
            [10, 0, 1, 1].into(),
            Ipv4Address::RIP_MULTICAST,
            &packet,
        )?;

        let parsed = etherparse::PacketHeaders::from_ethernet_slice(&frame)?;
        let link = parsed.link.expect("an Ethernet header");
        assert_eq!(link.destination, [0xff; 6]);
        assert_eq!(link.source, source_mac.to_bytes());
        match parsed.ip {
            Some(etherparse::IpHeader::Version4(ip, ..)) => {
                assert_eq!(ip.time_to_live, 255);
                assert_eq!(ip.destination, [224, 0, 0, 9]);
                assert_eq!(ip.calc_header_checksum()?, ip.header_checksum);
            }
            other => panic!("unexpected network layer {other:?}"),
        }
        match parsed.transport {
            Some(etherparse::TransportHeader::Udp(udp)) => {
                assert_eq!(udp.source_port, RIP_PORT);
                assert_eq!(udp.destination_port, RIP_PORT);
            }
            other => panic!("unexpected transport layer {other:?}"),
        }
        assert_eq!(RipPacket::from_bytes(parsed.payload)?, packet);
        Ok(())
    }
}
