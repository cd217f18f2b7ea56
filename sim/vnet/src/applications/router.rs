use super::rip::{RipEngine, Update};
use async_trait::async_trait;
use std::sync::Arc;
use vnet_core::{
    device::transmit,
    logging::{drop_event, forward_event, DropReason},
    network::IfaceId,
    protocols::{
        ethernet::{build_frame, ETHER_TYPE_IPV4},
        ipv4::ProtocolNumber,
        rip::RIP_PORT,
        EthernetFrame, Ipv4Header, RipPacket, UdpHeader,
    },
    AddressTable, Device, ForwardingTable, Iface, Shutdown, Transport,
};

/// Where a router gets its routes from.
pub enum Routing {
    /// A table loaded once at start-up.
    Static(ForwardingTable),
    /// Routes learned from neighbors over RIPv2.
    Rip(Arc<RipEngine>),
}

/// What the router did with a frame it did not drop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// The datagram went out of the given interface.
    Forwarded(IfaceId),
    /// The datagram was a RIP message and was consumed by the routing engine.
    Rip(Update),
}

/// An IPv4 router.
///
/// Every frame that arrives is validated, has its TTL decremented, and is
/// sent on towards its destination with rewritten MAC addresses. Next-hop MAC
/// addresses come from a static [`AddressTable`], looked up by the
/// datagram's destination.
pub struct Router {
    ifaces: Vec<Iface>,
    routing: Routing,
    arp: AddressTable,
    transport: Arc<dyn Transport>,
}

impl Router {
    /// Creates a router that forwards by a static table.
    pub fn new_static(
        ifaces: Vec<Iface>,
        routes: ForwardingTable,
        arp: AddressTable,
        transport: Arc<dyn Transport>,
    ) -> Self {
        tracing::info!(target: "ROUTER", "loaded static routes\n{routes}");
        Self::new(ifaces, Routing::Static(routes), arp, transport)
    }

    /// Creates a router that learns its routes with RIP. RIP starts when the
    /// router does.
    pub fn new_rip(ifaces: Vec<Iface>, arp: AddressTable, transport: Arc<dyn Transport>) -> Self {
        let engine = RipEngine::new(ifaces.clone(), transport.clone());
        Self::new(ifaces, Routing::Rip(Arc::new(engine)), arp, transport)
    }

    pub fn new(
        ifaces: Vec<Iface>,
        routing: Routing,
        arp: AddressTable,
        transport: Arc<dyn Transport>,
    ) -> Self {
        tracing::info!(target: "ROUTER", "loaded ARP cache\n{arp}");
        Self {
            ifaces,
            routing,
            arp,
            transport,
        }
    }

    pub fn ifaces(&self) -> &[Iface] {
        &self.ifaces
    }

    /// The RIP engine, if the router runs RIP.
    pub fn rip(&self) -> Option<&Arc<RipEngine>> {
        match &self.routing {
            Routing::Rip(engine) => Some(engine),
            Routing::Static(_) => None,
        }
    }

    /// Runs one frame through the forwarding pipeline.
    pub fn process(&self, frame: &[u8], ingress: IfaceId) -> Result<Verdict, DropReason> {
        let ethernet = EthernetFrame::from_bytes(frame).or(Err(DropReason::Malformed))?;
        if !ethernet.is_ipv4() {
            return Err(DropReason::NotIpv4);
        }
        let (header, payload) =
            Ipv4Header::from_bytes(ethernet.payload).or(Err(DropReason::Malformed))?;
        if !header.has_valid_checksum() {
            return Err(DropReason::BadChecksum);
        }
        let header = header
            .with_decremented_ttl()
            .ok_or(DropReason::TtlExpired)?;

        if let Routing::Rip(engine) = &self.routing {
            if let Some(packet) = rip_message(&header, payload)? {
                let update = engine.handle_message(&packet, header.source, ethernet.source, ingress);
                return Ok(Verdict::Rip(update));
            }
        }

        if self.ifaces.iter().any(|iface| iface.ip == header.destination) {
            return Err(DropReason::ForRouter);
        }

        let egress = match &self.routing {
            Routing::Static(table) => table.lookup(header.destination).map(|route| route.iface),
            Routing::Rip(engine) => engine.resolve(header.destination),
        }
        .ok_or(DropReason::NoRoute)?;
        let iface = self
            .ifaces
            .get(egress as usize)
            .ok_or(DropReason::NoRoute)?;
        let next_mac = self
            .arp
            .lookup(header.destination)
            .ok_or(DropReason::NoArpEntry)?;

        let out = build_frame(
            next_mac,
            iface.mac,
            ETHER_TYPE_IPV4,
            [header.serialize().as_slice(), payload],
        );
        if transmit(self.transport.as_ref(), &out, egress) {
            forward_event(ingress, egress, header.source, header.destination, next_mac);
        }
        Ok(Verdict::Forwarded(egress))
    }
}

/// Picks out RIP messages: UDP datagrams to the RIP port. Datagrams that are
/// not valid UDP are left to be forwarded.
fn rip_message(header: &Ipv4Header, payload: &[u8]) -> Result<Option<RipPacket>, DropReason> {
    if ProtocolNumber::from(header.protocol) != ProtocolNumber::UDP {
        return Ok(None);
    }
    let Ok((udp, data)) = UdpHeader::from_bytes_ipv4(payload, header.source, header.destination)
    else {
        return Ok(None);
    };
    if udp.destination != RIP_PORT {
        return Ok(None);
    }
    RipPacket::from_bytes(data)
        .map(Some)
        .or(Err(DropReason::MalformedRip))
}

#[async_trait]
impl Device for Router {
    fn handle_packet(&self, frame: &[u8], ingress: IfaceId) {
        if let Err(reason) = self.process(frame, ingress) {
            drop_event(ingress, reason);
        }
    }

    async fn start(self: Arc<Self>, shutdown: Shutdown) {
        if let Routing::Rip(engine) = &self.routing {
            engine.activate();
            engine.clone().spawn_timer(shutdown);
        }
    }
}
