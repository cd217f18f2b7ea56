use super::{SimulationError, SimulationOptions};
use crate::applications::{RipEngine, Router, Station};
use std::{sync::Arc, time::Duration};
use vnet_core::{
    ifaces,
    internet::Sim,
    protocols::ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net},
    AddressTable, Iface, Machine, Mac, Network, Nic,
};

// Sends a datagram across three RIP routers once they have learned each
// other's networks
// ----------------------------------------------------------------------
// Networks:
// N1 = 10.0.1.0/24
// N2 = 10.0.12.0/24
// N3 = 10.0.23.0/24
// N4 = 10.0.3.0/24
// ----------------------------------------------------------------------
// M(SENDER) -- N(N1) -- R(RIP1) -- N(N2) -- R(RIP2) -- N(N3) -- R(RIP3) -- N(N4) -- M(RECEIVER)

const SENDER_IP: Ipv4Address = Ipv4Address::new([10, 0, 1, 10]);
const SENDER_MAC: Mac = Mac::new([2, 0, 0, 0, 0, 0x0a]);
const RECEIVER_IP: Ipv4Address = Ipv4Address::new([10, 0, 3, 30]);
const RECEIVER_MAC: Mac = Mac::new([2, 0, 0, 0, 0, 0x1e]);
const PORT: u16 = 0xdeeb;
const MESSAGE: &[u8] = b"Over three hops";

/// How often the routers' tables are checked for convergence.
const POLL: Duration = Duration::from_millis(50);

/// Runs the RIP chain simulation.
pub async fn rip_chain(options: SimulationOptions) -> Result<(), SimulationError> {
    let networks = [
        Network::basic(),
        Network::basic(),
        Network::basic(),
        Network::basic(),
    ];
    let router_ifaces = [
        ifaces(
            [("eth0", [10, 0, 1, 1], 24), ("eth1", [10, 0, 12, 1], 24)],
            [2, 0, 0, 0, 1, 0],
        ),
        ifaces(
            [("eth0", [10, 0, 12, 2], 24), ("eth1", [10, 0, 23, 2], 24)],
            [2, 0, 0, 0, 2, 0],
        ),
        ifaces(
            [("eth0", [10, 0, 23, 3], 24), ("eth1", [10, 0, 3, 3], 24)],
            [2, 0, 0, 0, 3, 0],
        ),
    ];

    // Next-hop MACs are looked up by the final destination, so each router
    // maps both hosts to its neighbor in that direction
    let arp_caches: [AddressTable; 3] = [
        [
            (SENDER_IP, SENDER_MAC),
            (RECEIVER_IP, router_ifaces[1][0].mac),
        ]
        .into_iter()
        .collect(),
        [
            (SENDER_IP, router_ifaces[0][1].mac),
            (RECEIVER_IP, router_ifaces[2][0].mac),
        ]
        .into_iter()
        .collect(),
        [
            (SENDER_IP, router_ifaces[1][1].mac),
            (RECEIVER_IP, RECEIVER_MAC),
        ]
        .into_iter()
        .collect(),
    ];
    let gateway = router_ifaces[0][0].mac;

    let mut sim = Sim::new();
    let mut engines = vec![];
    for (i, (ifaces, arp)) in router_ifaces.into_iter().zip(arp_caches).enumerate() {
        let nic = Arc::new(Nic::new([&networks[i], &networks[i + 1]]));
        let router = Router::new_rip(ifaces, arp, nic.clone());
        if let Some(engine) = router.rip() {
            engines.push(engine.clone());
        }
        sim.spawn(Machine::new(format!("rip{}", i + 1), Arc::new(router), nic));
    }

    let mask = Ipv4Mask::from_bitcount(24);
    let nic = Arc::new(Nic::new([&networks[0]]));
    let (sender, _) = Station::new(Iface::new("eth0", SENDER_IP, mask, SENDER_MAC), nic.clone());
    let sender = Arc::new(sender);
    sim.spawn(Machine::new("sender", sender.clone(), nic));

    let nic = Arc::new(Nic::new([&networks[3]]));
    let (receiver, mut inbox) =
        Station::new(Iface::new("eth0", RECEIVER_IP, mask, RECEIVER_MAC), nic.clone());
    sim.spawn(Machine::new("receiver", Arc::new(receiver), nic));

    let exchange = async {
        converge(&engines).await;
        sender.send_udp(RECEIVER_IP, gateway, PORT, PORT, MESSAGE)?;
        Ok::<_, SimulationError>(inbox.recv_udp().await)
    };
    let datagram = tokio::time::timeout(options.duration, exchange)
        .await
        .or(Err(SimulationError::Timeout))??
        .ok_or(SimulationError::Timeout)?;
    sim.finish().await?;

    if datagram.payload != MESSAGE {
        return Err(SimulationError::Unexpected(format!(
            "received {:?}",
            datagram.payload
        )));
    }
    if datagram.time_to_live != 61 {
        return Err(SimulationError::Unexpected(format!(
            "expected TTL 61, got {}",
            datagram.time_to_live
        )));
    }
    Ok(())
}

/// Waits until the routers at either end reach each other's far network in
/// two hops.
async fn converge(engines: &[Arc<RipEngine>]) {
    let mask = Ipv4Mask::from_bitcount(24);
    let sender_net = Ipv4Net::new(SENDER_IP, mask);
    let receiver_net = Ipv4Net::new(RECEIVER_IP, mask);
    loop {
        if let [first, .., last] = engines {
            if metric(first, receiver_net) == Some(2) && metric(last, sender_net) == Some(2) {
                tracing::info!("RIP converged");
                return;
            }
        }
        tokio::time::sleep(POLL).await;
    }
}

fn metric(engine: &RipEngine, net: Ipv4Net) -> Option<u32> {
    engine.table().get(net).map(|route| route.metric)
}
