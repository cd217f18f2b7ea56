//! Drives routers directly with frames built by etherparse.
use etherparse::{IpHeader, PacketBuilder, PacketHeaders, TransportHeader};
use std::sync::Arc;
use tracing_test::traced_test;
use vnet::applications::{rip::Update, Capture, Router, Verdict};
use vnet_core::{
    ifaces,
    logging::DropReason,
    protocols::ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net},
    AddressTable, Device, ForwardingTable, Iface, Mac,
};

const NEXT_MAC: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x01];
const SENDER_MAC: [u8; 6] = [2, 0, 0, 0, 9, 9];

fn router_ifaces() -> Vec<Iface> {
    ifaces(
        [("eth0", [10, 0, 0, 1], 24), ("eth1", [10, 0, 1, 1], 24)],
        [2, 0, 0, 0, 1, 0],
    )
}

fn static_router() -> (Router, Arc<Capture>) {
    let ifaces = router_ifaces();
    let routes = ForwardingTable::parse(
        "10.0.0.0 0.0.0.0 255.255.255.0 eth0\n10.0.1.0 0.0.0.0 255.255.255.0 eth1",
        &ifaces,
    )
    .unwrap();
    let arp = AddressTable::parse("10.0.0.5 AA:BB:CC:DD:EE:01").unwrap();
    let capture = Arc::new(Capture::new(ifaces.len()));
    (
        Router::new_static(ifaces, routes, arp, capture.clone()),
        capture,
    )
}

/// A UDP datagram from 10.0.1.9 arriving at the router's eth1.
fn datagram(destination: [u8; 4], time_to_live: u8, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2(SENDER_MAC, [2, 0, 0, 0, 1, 1])
        .ipv4([10, 0, 1, 9], destination, time_to_live)
        .udp(4000, 5000);
    let mut frame = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut frame, payload).unwrap();
    frame
}

#[test]
#[traced_test]
fn forwards_with_decremented_ttl() -> anyhow::Result<()> {
    let (router, capture) = static_router();
    let frame = datagram([10, 0, 0, 5], 2, b"payload");
    assert_eq!(router.process(&frame, 1), Ok(Verdict::Forwarded(0)));

    let sent = capture.take();
    assert_eq!(sent.len(), 1);
    let (egress, out) = &sent[0];
    assert_eq!(*egress, 0);
    let parsed = PacketHeaders::from_ethernet_slice(out)?;
    let link = parsed.link.expect("an Ethernet header");
    assert_eq!(link.destination, NEXT_MAC);
    assert_eq!(link.source, router.ifaces()[0].mac.to_bytes());
    let Some(IpHeader::Version4(ip, ..)) = parsed.ip else {
        panic!("expected an IPv4 header");
    };
    assert_eq!(ip.time_to_live, 1);
    assert_eq!(ip.calc_header_checksum()?, ip.header_checksum);
    assert_eq!(ip.source, [10, 0, 1, 9]);
    assert_eq!(parsed.payload, b"payload");
    assert!(logs_contain("forwarded packet"));
    Ok(())
}

#[test]
fn drops_expiring_ttl() {
    let (router, capture) = static_router();
    for time_to_live in [0, 1] {
        let frame = datagram([10, 0, 0, 5], time_to_live, b"payload");
        assert_eq!(router.process(&frame, 1), Err(DropReason::TtlExpired));
    }
    assert!(capture.is_empty());
}

#[test]
fn drops_corrupted_headers() {
    let (router, capture) = static_router();
    let frame = datagram([10, 0, 0, 5], 2, b"payload");
    // Every byte of the IPv4 header ahead of the checksum field
    for offset in 14..24 {
        let mut corrupted = frame.clone();
        corrupted[offset] ^= 0x04;
        assert!(router.process(&corrupted, 1).is_err(), "byte {offset}");
    }
    let mut bad_checksum = frame;
    bad_checksum[24] ^= 0xff;
    assert_eq!(router.process(&bad_checksum, 1), Err(DropReason::BadChecksum));
    assert!(capture.is_empty());
}

#[test]
#[traced_test]
fn never_forwards_to_itself() {
    let (router, capture) = static_router();
    for address in [[10, 0, 0, 1], [10, 0, 1, 1]] {
        let frame = datagram(address, 64, b"hello router");
        assert_eq!(router.process(&frame, 1), Err(DropReason::ForRouter));
        router.handle_packet(&frame, 1);
    }
    assert!(capture.is_empty());
    assert!(logs_contain("addressed to the router"));
}

#[test]
fn needs_a_route_and_an_arp_entry() {
    let (router, capture) = static_router();
    assert_eq!(
        router.process(&datagram([192, 168, 0, 1], 64, b""), 1),
        Err(DropReason::NoRoute)
    );
    assert_eq!(
        router.process(&datagram([10, 0, 0, 6], 64, b""), 1),
        Err(DropReason::NoArpEntry)
    );
    assert!(capture.is_empty());
}

#[test]
fn prefers_longer_prefixes() {
    let ifaces = router_ifaces();
    let routes = ForwardingTable::parse(
        "10.0.0.0 0.0.0.0 255.255.0.0 eth1\n10.0.0.0 0.0.0.0 255.255.255.0 eth0",
        &ifaces,
    )
    .unwrap();
    let arp: AddressTable = [
        (Ipv4Address::new([10, 0, 0, 5]), Mac::new(NEXT_MAC)),
        (Ipv4Address::new([10, 0, 7, 5]), Mac::new(NEXT_MAC)),
    ]
    .into_iter()
    .collect();
    let capture = Arc::new(Capture::new(2));
    let router = Router::new_static(ifaces, routes, arp, capture);
    assert_eq!(
        router.process(&datagram([10, 0, 0, 5], 64, b""), 1),
        Ok(Verdict::Forwarded(0))
    );
    assert_eq!(
        router.process(&datagram([10, 0, 7, 5], 64, b""), 1),
        Ok(Verdict::Forwarded(1))
    );
}

/// A router running RIP on 172.16.0.0/24 (eth0) and 10.0.0.0/24 (eth1).
fn rip_router() -> (Router, Arc<Capture>) {
    let ifaces = ifaces(
        [("eth0", [172, 16, 0, 1], 24), ("eth1", [10, 0, 0, 1], 24)],
        [2, 0, 0, 0, 1, 0],
    );
    let arp = AddressTable::parse("192.168.1.9 aa:bb:cc:dd:ee:01").unwrap();
    let capture = Arc::new(Capture::new(ifaces.len()));
    let router = Router::new_rip(ifaces, arp, capture.clone());
    router.rip().unwrap().activate();
    capture.take();
    (router, capture)
}

/// A RIP response from 172.16.0.2 advertising 192.168.1.0/24.
fn rip_response(metric: u8) -> Vec<u8> {
    #[rustfmt::skip]
    let message = [
        2, 2, 0, 0,
        0, 2, 0, 0,
        192, 168, 1, 0,
        255, 255, 255, 0,
        0, 0, 0, 0,
        0, 0, 0, metric,
    ];
    let builder = PacketBuilder::ethernet2(SENDER_MAC, [0xff; 6])
        .ipv4([172, 16, 0, 2], [224, 0, 0, 9], 255)
        .udp(520, 520);
    let mut frame = Vec::with_capacity(builder.size(message.len()));
    builder.write(&mut frame, &message).unwrap();
    frame
}

#[test]
fn learns_advertised_networks() -> anyhow::Result<()> {
    let (router, capture) = rip_router();
    assert_eq!(
        router.process(&rip_response(0), 0),
        Ok(Verdict::Rip(Update::Changed))
    );

    let table = router.rip().unwrap().table();
    let net = Ipv4Net::new([192, 168, 1, 0].into(), Ipv4Mask::from_bitcount(24));
    let route = table.get(net).expect("a learned route");
    assert_eq!(route.metric, 1);
    assert_eq!(route.next_hop, Ipv4Address::new([172, 16, 0, 2]));

    // A triggered update goes out of both interfaces
    let sent = capture.take();
    assert_eq!(sent.iter().map(|(egress, _)| *egress).collect::<Vec<_>>(), vec![0, 1]);
    for (_, frame) in sent {
        let parsed = PacketHeaders::from_ethernet_slice(&frame)?;
        assert_eq!(parsed.link.expect("an Ethernet header").destination, [0xff; 6]);
        let Some(IpHeader::Version4(ip, ..)) = parsed.ip else {
            panic!("expected an IPv4 header");
        };
        assert_eq!(ip.destination, [224, 0, 0, 9]);
        assert_eq!(ip.time_to_live, 255);
        let Some(TransportHeader::Udp(udp)) = parsed.transport else {
            panic!("expected a UDP header");
        };
        assert_eq!((udp.source_port, udp.destination_port), (520, 520));
        assert_eq!(udp.calc_checksum_ipv4(&ip, parsed.payload)?, udp.checksum);
        // Response, version 2, then three 20 byte entries
        assert_eq!(&parsed.payload[..2], &[2, 2]);
        assert_eq!(parsed.payload.len(), 4 + 3 * 20);
    }
    Ok(())
}

#[test]
fn forwards_over_learned_routes() {
    let (router, capture) = rip_router();
    router.process(&rip_response(3), 0).unwrap();
    capture.take();

    let frame = datagram([192, 168, 1, 9], 64, b"far away");
    assert_eq!(router.process(&frame, 1), Ok(Verdict::Forwarded(0)));
    assert_eq!(capture.len(), 1);
    // Shares no leading byte with any known network
    assert_eq!(
        router.process(&datagram([11, 0, 0, 1], 64, b""), 1),
        Err(DropReason::NoRoute)
    );
}

#[test]
fn drops_malformed_rip() {
    let (router, capture) = rip_router();
    let builder = PacketBuilder::ethernet2(SENDER_MAC, [0xff; 6])
        .ipv4([172, 16, 0, 2], [224, 0, 0, 9], 255)
        .udp(520, 520);
    let message = [2, 1, 0, 0];
    let mut frame = Vec::new();
    builder.write(&mut frame, &message).unwrap();
    assert_eq!(router.process(&frame, 0), Err(DropReason::MalformedRip));
    assert!(capture.is_empty());
}

#[test]
fn poisoned_routes_stop_forwarding() {
    let (router, capture) = rip_router();
    router.process(&rip_response(0), 0).unwrap();
    assert_eq!(
        router.process(&rip_response(16), 0),
        Ok(Verdict::Rip(Update::Changed))
    );
    capture.take();
    assert_eq!(
        router.process(&datagram([192, 168, 1, 9], 64, b""), 1),
        Err(DropReason::NoRoute)
    );
}
