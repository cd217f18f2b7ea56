use super::rip_table::{RipTable, Update};
use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};
use tokio::{
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};
use vnet_core::{
    device::transmit,
    logging::{rip_broadcast_event, rip_ignored_event},
    network::IfaceId,
    protocols::{
        ipv4::Ipv4Address,
        rip::{build_rip_frame, Command, RipEntry, RipPacket},
    },
    Iface, Mac, Shutdown, Transport,
};

/// How often an active router advertises its whole table unprompted.
pub const BROADCAST_INTERVAL: Duration = Duration::from_secs(10);

/// How often the timer task ages the table.
pub const TICK: Duration = Duration::from_millis(100);

/// The RIPv2 side of a router.
///
/// The engine owns the router's dynamic routing table. It is driven from two
/// places: [`RipEngine::handle_message`] on the receive path and
/// [`RipEngine::tick`] from the timer task started with
/// [`RipEngine::spawn_timer`]. All state sits behind one lock that is never
/// held while frames are sent.
pub struct RipEngine {
    ifaces: Vec<Iface>,
    transport: Arc<dyn Transport>,
    state: Mutex<State>,
}

struct State {
    active: bool,
    table: RipTable,
    last_broadcast: Instant,
}

impl RipEngine {
    /// Creates a disabled engine for a router with the given interfaces.
    pub fn new(ifaces: Vec<Iface>, transport: Arc<dyn Transport>) -> Self {
        Self::with_table(ifaces, transport, RipTable::new())
    }

    /// Creates a disabled engine that will keep its routes in `table`.
    pub fn with_table(ifaces: Vec<Iface>, transport: Arc<dyn Transport>, table: RipTable) -> Self {
        Self {
            ifaces,
            transport,
            state: Mutex::new(State {
                active: false,
                table,
                last_broadcast: Instant::now(),
            }),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state().active
    }

    /// Turns RIP on: adds the router's own networks to the table and asks
    /// every neighbor for its table. Does nothing if RIP is already on.
    pub fn activate(&self) {
        self.activate_at(Instant::now())
    }

    pub fn activate_at(&self, now: Instant) {
        {
            let mut state = self.state();
            if state.active {
                return;
            }
            state.active = true;
            state.last_broadcast = now;
            for (id, iface) in self.ifaces.iter().enumerate() {
                state.table.add_direct(iface, id as IfaceId, now);
            }
        }
        let request = RipPacket::new_request();
        for (id, iface) in self.ifaces.iter().enumerate() {
            self.send(iface, id as IfaceId, Mac::BROADCAST, Ipv4Address::RIP_MULTICAST, &request);
        }
    }

    /// Ages the table and sends whatever broadcast is due.
    pub fn tick(&self) {
        self.tick_at(Instant::now())
    }

    pub fn tick_at(&self, now: Instant) {
        let (kind, entries) = {
            let mut state = self.state();
            if !state.active {
                return;
            }
            let poisoned = state.table.expire(now);
            let kind = if now.saturating_duration_since(state.last_broadcast) >= BROADCAST_INTERVAL {
                state.last_broadcast = now;
                "periodic"
            } else if !poisoned.is_empty() {
                "triggered"
            } else {
                return;
            };
            (kind, state.table.entries())
        };
        self.broadcast(kind, &entries);
    }

    /// Processes a RIP message that arrived on `ingress` from the neighbor at
    /// `source_ip`/`source_mac`. Returns the biggest change any of its entries
    /// made to the table.
    pub fn handle_message(
        &self,
        packet: &RipPacket,
        source_ip: Ipv4Address,
        source_mac: Mac,
        ingress: IfaceId,
    ) -> Update {
        self.handle_message_at(packet, source_ip, source_mac, ingress, Instant::now())
    }

    pub fn handle_message_at(
        &self,
        packet: &RipPacket,
        source_ip: Ipv4Address,
        source_mac: Mac,
        ingress: IfaceId,
        now: Instant,
    ) -> Update {
        let (update, entries) = {
            let mut state = self.state();
            if !state.active {
                rip_ignored_event(ingress, source_ip, "RIP is not running");
                return Update::Ignored;
            }
            let update = packet
                .entries
                .iter()
                .map(|entry| state.table.apply(entry, source_ip, ingress, now))
                .max()
                .unwrap_or(Update::Ignored);
            (update, state.table.entries())
        };

        match packet.command {
            Command::Request => {
                let egress = self.resolve(source_ip).unwrap_or(ingress);
                let Some(iface) = self.ifaces.get(egress as usize) else {
                    rip_ignored_event(ingress, source_ip, "no interface to answer on");
                    return update;
                };
                for response in RipPacket::new_responses(&entries) {
                    self.send(iface, egress, source_mac, source_ip, &response);
                }
            }
            Command::Response if update == Update::Changed => {
                self.broadcast("triggered", &entries);
            }
            Command::Response => {}
        }
        update
    }

    /// Finds the interface to send traffic for `destination` out of. Returns
    /// `None` when no reachable route covers it.
    ///
    /// A directly connected network resolves to the interface on that
    /// network. A learned route resolves to the interface whose network
    /// contains the next hop, or the interface it was learned on if none
    /// does.
    pub fn resolve(&self, destination: Ipv4Address) -> Option<IfaceId> {
        let route = *self.state().table.resolve(destination)?;
        let position = if route.is_direct() {
            self.ifaces.iter().position(|iface| iface.net() == route.net)
        } else {
            self.ifaces
                .iter()
                .position(|iface| iface.net().contains(route.next_hop))
        };
        Some(position.map_or(route.iface, |i| i as IfaceId))
    }

    /// A copy of the routing table as it is now.
    pub fn table(&self) -> RipTable {
        self.state().table.clone()
    }

    /// Spawns the task that calls [`RipEngine::tick`] every [`TICK`] until
    /// `shutdown` fires.
    pub fn spawn_timer(self: Arc<Self>, mut shutdown: Shutdown) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticks = interval(TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    _ = ticks.tick() => self.tick(),
                }
            }
        })
    }

    fn broadcast(&self, kind: &str, entries: &[RipEntry]) {
        rip_broadcast_event(kind, entries.len());
        let responses = RipPacket::new_responses(entries);
        for (id, iface) in self.ifaces.iter().enumerate() {
            for response in &responses {
                self.send(
                    iface,
                    id as IfaceId,
                    Mac::BROADCAST,
                    Ipv4Address::RIP_MULTICAST,
                    response,
                );
            }
        }
    }

    fn send(
        &self,
        iface: &Iface,
        egress: IfaceId,
        destination_mac: Mac,
        destination_ip: Ipv4Address,
        packet: &RipPacket,
    ) {
        match build_rip_frame(iface.mac, destination_mac, iface.ip, destination_ip, packet) {
            Ok(frame) => {
                transmit(self.transport.as_ref(), &frame, egress);
            }
            Err(error) => {
                tracing::error!(target: "RIP", egress, error = %error, "failed to build RIP frame")
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::Capture;
    use vnet_core::{
        ifaces,
        protocols::{
            ipv4::{Ipv4Mask, Ipv4Net},
            rip::{INFINITY, MAX_ENTRIES},
            udp, EthernetFrame, Ipv4Header,
        },
    };

    const NEIGHBOR: Ipv4Address = Ipv4Address::new([172, 16, 0, 2]);
    const NEIGHBOR_MAC: Mac = Mac::new([2, 0, 0, 0, 9, 9]);

    fn engine() -> (RipEngine, Arc<Capture>) {
        let ifaces = ifaces(
            [("eth0", [172, 16, 0, 1], 24), ("eth1", [10, 0, 0, 1], 24)],
            [2, 0, 0, 0, 1, 0],
        );
        let capture = Arc::new(Capture::new(ifaces.len()));
        (RipEngine::new(ifaces, capture.clone()), capture)
    }

    /// Unwraps the RIP message in a frame the engine sent.
    fn rip_of(frame: &[u8]) -> (Mac, Ipv4Header, RipPacket) {
        let ethernet = EthernetFrame::from_bytes(frame).unwrap();
        let (ip, datagram) = Ipv4Header::from_bytes(ethernet.payload).unwrap();
        let (_, payload) =
            udp::UdpHeader::from_bytes_ipv4(datagram, ip.source, ip.destination).unwrap();
        let packet = RipPacket::from_bytes(payload).unwrap();
        (ethernet.destination, ip, packet)
    }

    fn response(net: Ipv4Net, metric: u32) -> RipPacket {
        RipPacket {
            command: Command::Response,
            entries: vec![RipEntry::new(net, Ipv4Address::CURRENT_NETWORK, metric)],
        }
    }

    fn remote() -> Ipv4Net {
        Ipv4Net::new([192, 168, 1, 0].into(), Ipv4Mask::from_bitcount(24))
    }

    #[tokio::test]
    async fn activation_requests_tables_everywhere() {
        let (engine, capture) = engine();
        engine.activate();
        assert!(engine.is_active());
        assert_eq!(engine.table().len(), 2);

        let sent = capture.take();
        assert_eq!(sent.len(), 2);
        for (egress, frame) in sent {
            let (mac, ip, packet) = rip_of(&frame);
            assert_eq!(mac, Mac::BROADCAST);
            assert_eq!(ip.destination, Ipv4Address::RIP_MULTICAST);
            assert_eq!(ip.source, engine.ifaces[egress as usize].ip);
            assert_eq!(ip.time_to_live, 255);
            assert_eq!(packet, RipPacket::new_request());
        }

        engine.activate();
        assert!(capture.is_empty());
    }

    #[tokio::test]
    async fn learned_routes_trigger_a_broadcast() {
        let (engine, capture) = engine();
        engine.activate();
        capture.take();

        let update = engine.handle_message(&response(remote(), 0), NEIGHBOR, NEIGHBOR_MAC, 0);
        assert_eq!(update, Update::Changed);
        let sent = capture.take();
        assert_eq!(sent.len(), 2);
        let (_, _, packet) = rip_of(&sent[0].1);
        assert_eq!(packet.command, Command::Response);
        assert_eq!(packet.entries.len(), 3);

        // Hearing the same thing again changes nothing
        let update = engine.handle_message(&response(remote(), 0), NEIGHBOR, NEIGHBOR_MAC, 0);
        assert_eq!(update, Update::Refreshed);
        assert!(capture.is_empty());
    }

    #[tokio::test]
    async fn requests_are_answered_directly() {
        let (engine, capture) = engine();
        engine.activate();
        capture.take();

        let update = engine.handle_message(&RipPacket::new_request(), NEIGHBOR, NEIGHBOR_MAC, 1);
        assert_eq!(update, Update::Ignored);
        let sent = capture.take();
        assert_eq!(sent.len(), 1);
        // The requester lives on eth0's network even though it asked on eth1
        assert_eq!(sent[0].0, 0);
        let (mac, ip, packet) = rip_of(&sent[0].1);
        assert_eq!(mac, NEIGHBOR_MAC);
        assert_eq!(ip.destination, NEIGHBOR);
        assert_eq!(packet.command, Command::Response);
        assert_eq!(packet.entries.len(), 2);
    }

    #[tokio::test]
    async fn unknown_requesters_are_answered_on_the_ingress() {
        let (engine, capture) = engine();
        engine.activate();
        capture.take();
        engine.handle_message(
            &RipPacket::new_request(),
            [8, 8, 8, 8].into(),
            NEIGHBOR_MAC,
            1,
        );
        assert_eq!(capture.take()[0].0, 1);
    }

    #[tokio::test]
    async fn ignores_messages_until_active() {
        let (engine, capture) = engine();
        let update = engine.handle_message(&response(remote(), 0), NEIGHBOR, NEIGHBOR_MAC, 0);
        assert_eq!(update, Update::Ignored);
        assert!(engine.table().is_empty());
        assert!(capture.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn broadcasts_periodically() {
        let (engine, capture) = engine();
        let start = Instant::now();
        engine.activate_at(start);
        capture.take();

        engine.tick_at(start + Duration::from_secs(9));
        assert!(capture.is_empty());
        engine.tick_at(start + BROADCAST_INTERVAL);
        assert_eq!(capture.len(), 2);
        capture.take();
        engine.tick_at(start + BROADCAST_INTERVAL + TICK);
        assert!(capture.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stale_routes_are_poisoned_and_advertised() {
        let (engine, capture) = engine();
        let start = Instant::now();
        engine.activate_at(start);
        engine.handle_message_at(&response(remote(), 0), NEIGHBOR, NEIGHBOR_MAC, 0, start);

        // Keep the periodic broadcast out of the way
        let stale = start + Duration::from_millis(30_100);
        {
            let mut state = engine.state();
            state.last_broadcast = stale;
        }
        capture.take();

        engine.tick_at(stale);
        let sent = capture.take();
        assert_eq!(sent.len(), 2);
        let (_, _, packet) = rip_of(&sent[0].1);
        let poisoned = packet
            .entries
            .iter()
            .find(|entry| entry.net() == Some(remote()))
            .unwrap();
        assert_eq!(poisoned.metric, INFINITY);
        assert_eq!(engine.resolve([192, 168, 1, 1].into()), None);

        // Poisoned once, so the next tick is quiet
        engine.tick_at(stale + TICK);
        assert!(capture.is_empty());
    }

    #[tokio::test]
    async fn resolves_to_interfaces() {
        let (engine, _capture) = engine();
        engine.activate();
        engine.handle_message(&response(remote(), 0), NEIGHBOR, NEIGHBOR_MAC, 1);
        assert_eq!(engine.resolve([10, 0, 0, 7].into()), Some(1));
        // Learned on eth1, but the next hop is on eth0's network
        assert_eq!(engine.resolve([192, 168, 1, 7].into()), Some(0));
        assert_eq!(engine.resolve([99, 0, 0, 1].into()), None);
    }

    #[tokio::test]
    async fn large_tables_are_split() {
        let ifaces = ifaces([("eth0", [172, 16, 0, 1], 24)], [2, 0, 0, 0, 1, 0]);
        let capture = Arc::new(Capture::new(1));
        let engine = RipEngine::new(ifaces, capture.clone());
        engine.activate();
        let entries = (0..30)
            .map(|i| {
                let net = Ipv4Net::new([10, i, 0, 0].into(), Ipv4Mask::from_bitcount(16));
                RipEntry::new(net, Ipv4Address::CURRENT_NETWORK, 1)
            })
            .collect();
        let packet = RipPacket {
            command: Command::Response,
            entries,
        };
        capture.take();
        engine.handle_message(&packet, NEIGHBOR, NEIGHBOR_MAC, 0);

        let sizes: Vec<_> = capture
            .take()
            .iter()
            .map(|(_, frame)| rip_of(frame).2.entries.len())
            .collect();
        assert_eq!(sizes, vec![MAX_ENTRIES, 31 - MAX_ENTRIES]);
    }

    #[tokio::test(start_paused = true)]
    async fn timer_stops_on_shutdown() {
        let (engine, capture) = engine();
        let engine = Arc::new(engine);
        engine.activate();
        capture.take();

        let shutdown = Shutdown::new();
        let timer = engine.clone().spawn_timer(shutdown.clone());
        tokio::time::sleep(BROADCAST_INTERVAL + TICK).await;
        assert_eq!(capture.take().len(), 2);

        shutdown.shut_down();
        timer.await.unwrap();
    }
}
