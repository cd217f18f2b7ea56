use std::{sync::Arc, time::Duration};
use tokio::time::Instant;
use vnet_core::{
    device::transmit,
    logging::{mac_expire_event, mac_learn_event, switch_event},
    network::IfaceId,
    protocols::EthernetFrame,
    Device, FxDashMap, Mac, Transport,
};

/// The most addresses a switch will remember at once.
pub const TABLE_CAPACITY: usize = 1024;

/// How long a learned address stays bound to its interface without being
/// seen again.
pub const BINDING_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacBinding {
    pub iface: IfaceId,
    pub expires_at: Instant,
}

/// Where the switch sent a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forwarding {
    /// Out of the one interface the destination is bound to.
    Unicast(IfaceId),
    /// Out of every interface except the one it came in on.
    Flooded,
}

/// A self-learning Ethernet switch.
///
/// The switch binds each source address it sees to the interface it was
/// seen on, and uses those bindings to send frames only where their
/// destination is. Bindings expire after [`BINDING_TIMEOUT`]; expired ones
/// are cleared out as frames arrive. Once the table is full, new addresses
/// are not learned until old ones expire.
pub struct Switch {
    table: FxDashMap<Mac, MacBinding>,
    capacity: usize,
    transport: Arc<dyn Transport>,
}

impl Switch {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_capacity(transport, TABLE_CAPACITY)
    }

    pub fn with_capacity(transport: Arc<dyn Transport>, capacity: usize) -> Self {
        Self {
            table: Default::default(),
            capacity,
            transport,
        }
    }

    /// Learns from and forwards one frame. Returns `None` for frames too
    /// short to carry an Ethernet header.
    pub fn handle_packet_at(&self, frame: &[u8], ingress: IfaceId, now: Instant) -> Option<Forwarding> {
        let Ok(ethernet) = EthernetFrame::from_bytes(frame) else {
            tracing::debug!(target: "SWITCH", ingress, "dropped runt frame");
            return None;
        };

        self.table.retain(|mac, binding| {
            let live = binding.expires_at > now;
            if !live {
                mac_expire_event(*mac, binding.iface);
            }
            live
        });
        self.learn(ethernet.source, ingress, now);

        let bound = self.table.get(&ethernet.destination).map(|binding| binding.iface);
        match bound {
            Some(egress) => {
                transmit(self.transport.as_ref(), frame, egress);
                switch_event(ethernet.destination, ingress, Some(egress));
                Some(Forwarding::Unicast(egress))
            }
            None => {
                let ifaces = self.transport.iface_count() as IfaceId;
                for egress in (0..ifaces).filter(|&egress| egress != ingress) {
                    transmit(self.transport.as_ref(), frame, egress);
                }
                switch_event(ethernet.destination, ingress, None);
                Some(Forwarding::Flooded)
            }
        }
    }

    /// The interface `mac` is currently bound to, if any. Expired bindings
    /// that have not been cleared out yet still count.
    pub fn binding(&self, mac: Mac) -> Option<MacBinding> {
        self.table.get(&mac).map(|binding| *binding)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    fn learn(&self, mac: Mac, iface: IfaceId, now: Instant) {
        let binding = MacBinding {
            iface,
            expires_at: now + BINDING_TIMEOUT,
        };
        match self.table.get_mut(&mac) {
            Some(mut existing) => {
                if existing.iface != iface {
                    mac_learn_event(mac, iface);
                }
                *existing = binding;
            }
            None if self.table.len() < self.capacity => {
                mac_learn_event(mac, iface);
                self.table.insert(mac, binding);
            }
            None => {}
        }
    }
}

impl Device for Switch {
    fn handle_packet(&self, frame: &[u8], ingress: IfaceId) {
        self.handle_packet_at(frame, ingress, Instant::now());
    }
}
