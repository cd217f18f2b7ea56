use super::{SimulationError, SimulationOptions};
use crate::applications::{Router, Station};
use std::sync::Arc;
use vnet_core::{
    ifaces,
    internet::Sim,
    protocols::ipv4::{Ipv4Address, Ipv4Mask},
    AddressTable, ForwardingTable, Iface, Machine, Mac, Network, Nic,
};

// Sends one datagram across a statically configured router
// ----------------------------------------------------------------------
// Networks:
// N1 = 10.0.0.0/24
// N2 = 10.0.1.0/24
// ----------------------------------------------------------------------
// M(SENDER) -- N(N1) -- R(STATIC) -- N(N2) -- M(RECEIVER)

const SENDER_IP: Ipv4Address = Ipv4Address::new([10, 0, 0, 10]);
const SENDER_MAC: Mac = Mac::new([2, 0, 0, 0, 0, 0x0a]);
const RECEIVER_IP: Ipv4Address = Ipv4Address::new([10, 0, 1, 20]);
const RECEIVER_MAC: Mac = Mac::new([2, 0, 0, 0, 0, 0x14]);
const PORT: u16 = 0xbeef;
const MESSAGE: &[u8] = b"Hello World!";

const ROUTES: &str = "\
# destination  gateway  mask           interface
10.0.0.0       0.0.0.0  255.255.255.0  eth0
10.0.1.0       0.0.0.0  255.255.255.0  eth1
";

const ARP_CACHE: &str = "\
10.0.0.10  02:00:00:00:00:0a
10.0.1.20  02:00:00:00:00:14
";

/// Runs the static router simulation.
pub async fn static_router(options: SimulationOptions) -> Result<(), SimulationError> {
    let router_ifaces = ifaces(
        [("eth0", [10, 0, 0, 1], 24), ("eth1", [10, 0, 1, 1], 24)],
        [2, 0, 0, 0, 1, 0],
    );
    let routes = match &options.route_table {
        Some(path) => ForwardingTable::load(path, &router_ifaces)?,
        None => ForwardingTable::parse(ROUTES, &router_ifaces)?,
    };
    let arp = match &options.arp_cache {
        Some(path) => AddressTable::load(path)?,
        None => AddressTable::parse(ARP_CACHE)?,
    };
    let gateway = router_ifaces[0].mac;

    let networks = [Network::basic(), Network::basic()];
    let mut sim = Sim::new();

    let nic = Arc::new(Nic::new(&networks));
    let router = Router::new_static(router_ifaces, routes, arp, nic.clone());
    sim.spawn(Machine::new("router", Arc::new(router), nic));

    let mask = Ipv4Mask::from_bitcount(24);
    let nic = Arc::new(Nic::new([&networks[0]]));
    let (sender, _) = Station::new(Iface::new("eth0", SENDER_IP, mask, SENDER_MAC), nic.clone());
    let sender = Arc::new(sender);
    sim.spawn(Machine::new("sender", sender.clone(), nic));

    let nic = Arc::new(Nic::new([&networks[1]]));
    let (receiver, mut inbox) =
        Station::new(Iface::new("eth0", RECEIVER_IP, mask, RECEIVER_MAC), nic.clone());
    sim.spawn(Machine::new("receiver", Arc::new(receiver), nic));

    sender.send_udp(RECEIVER_IP, gateway, PORT, PORT, MESSAGE)?;
    let datagram = tokio::time::timeout(options.duration, inbox.recv_udp())
        .await
        .or(Err(SimulationError::Timeout))?
        .ok_or(SimulationError::Timeout)?;
    sim.finish().await?;

    if datagram.payload != MESSAGE || datagram.source != SENDER_IP {
        return Err(SimulationError::Unexpected(format!(
            "received {:?} from {}",
            datagram.payload, datagram.source
        )));
    }
    if datagram.time_to_live != 63 {
        return Err(SimulationError::Unexpected(format!(
            "expected TTL 63, got {}",
            datagram.time_to_live
        )));
    }
    Ok(())
}
