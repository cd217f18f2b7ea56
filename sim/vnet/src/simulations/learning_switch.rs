use super::{SimulationError, SimulationOptions};
use crate::applications::{Datagram, Station, Switch};
use std::sync::Arc;
use vnet_core::{
    internet::Sim,
    protocols::ipv4::{Ipv4Address, Ipv4Mask},
    Iface, Machine, Mac, Network, Nic,
};

// Three hosts exchange a request and a reply through a learning switch
// ----------------------------------------------------------------------
// Every host sits on its own segment to one switch port, all in 10.0.0.0/24
// ----------------------------------------------------------------------
// M(H1) -- N(N1) --\
// M(H2) -- N(N2) --- S(SWITCH)
// M(H3) -- N(N3) --/

const HOSTS: [(Ipv4Address, Mac); 3] = [
    (Ipv4Address::new([10, 0, 0, 1]), Mac::new([2, 0, 0, 0, 0, 1])),
    (Ipv4Address::new([10, 0, 0, 2]), Mac::new([2, 0, 0, 0, 0, 2])),
    (Ipv4Address::new([10, 0, 0, 3]), Mac::new([2, 0, 0, 0, 0, 3])),
];
const PORT: u16 = 0xcafe;

/// Runs the learning switch simulation.
pub async fn learning_switch(options: SimulationOptions) -> Result<(), SimulationError> {
    let networks = [Network::basic(), Network::basic(), Network::basic()];
    let mut sim = Sim::new();

    let nic = Arc::new(Nic::new(&networks));
    sim.spawn(Machine::new("switch", Arc::new(Switch::new(nic.clone())), nic));

    let mut stations = vec![];
    let mut inboxes = vec![];
    for (i, (ip, mac)) in HOSTS.into_iter().enumerate() {
        let nic = Arc::new(Nic::new([&networks[i]]));
        let iface = Iface::new("eth0", ip, Ipv4Mask::from_bitcount(24), mac);
        let (station, inbox) = Station::new(iface, nic.clone());
        let station = Arc::new(station);
        sim.spawn(Machine::new(format!("h{}", i + 1), station.clone(), nic));
        stations.push(station);
        inboxes.push(inbox);
    }
    let [(h1_ip, h1_mac), (h2_ip, h2_mac), _] = HOSTS;

    let exchange = async {
        // H2 is unknown to the switch, so H3 hears the request too
        stations[0].send_udp(h2_ip, h2_mac, PORT, PORT, b"request")?;
        let request = inboxes[1].recv_udp().await;
        let flooded = inboxes[2].recv().await;

        stations[1].send_udp(h1_ip, h1_mac, PORT, PORT, b"reply")?;
        let reply = inboxes[0].recv_udp().await;
        Ok::<_, SimulationError>((request, flooded, reply))
    };
    let (request, flooded, reply) = tokio::time::timeout(options.duration, exchange)
        .await
        .or(Err(SimulationError::Timeout))??;

    let payload = |datagram: Option<Datagram>| datagram.map(|datagram| datagram.payload);
    if payload(request).as_deref() != Some(b"request".as_slice()) {
        return Err(SimulationError::Unexpected("H2 missed the request".into()));
    }
    let flooded_to = flooded
        .and_then(|frame| Datagram::parse(&frame))
        .map(|datagram| datagram.destination);
    if flooded_to != Some(h2_ip) {
        return Err(SimulationError::Unexpected("the request was not flooded".into()));
    }
    if payload(reply).as_deref() != Some(b"reply".as_slice()) {
        return Err(SimulationError::Unexpected("H1 missed the reply".into()));
    }
    sim.finish().await?;

    // The switch had learned H1 by the time H2 replied
    if !inboxes[2].drain().is_empty() {
        return Err(SimulationError::Unexpected("the reply was flooded".into()));
    }
    Ok(())
}
