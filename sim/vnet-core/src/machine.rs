use crate::{
    device::{receive_loop, Device, Transport},
    network::{Iface, IfaceId, Network, SendError, Tap},
    protocols::ipv4::Ipv4Mask,
    Shutdown,
};
use std::sync::Arc;
use tokio::sync::mpsc;

/// How many inbound frames may wait for the device before taps start to
/// wait on it.
const INBOUND_CAPACITY: usize = 1024;

/// The set of network connections of one device, indexed by [`IfaceId`].
#[derive(Debug, Default)]
pub struct Nic {
    taps: Vec<Tap>,
}

impl Nic {
    /// Connects one interface to each of the given networks, in order.
    pub fn new<'a>(networks: impl IntoIterator<Item = &'a Arc<Network>>) -> Self {
        Self {
            taps: networks.into_iter().map(|network| network.tap()).collect(),
        }
    }
}

impl Transport for Nic {
    fn send(&self, frame: &[u8], egress: IfaceId) -> Result<(), SendError> {
        self.taps
            .get(egress as usize)
            .ok_or(SendError::UnknownIface(egress))?
            .send(frame)
    }

    fn iface_count(&self) -> usize {
        self.taps.len()
    }
}

/// A device wired into the simulation.
///
/// The machine owns the taps that connect the device's interfaces to their
/// networks, gathers all inbound frames into one queue, and hands them to the
/// device one at a time.
pub struct Machine {
    name: String,
    device: Arc<dyn Device>,
    nic: Arc<Nic>,
}

impl Machine {
    /// Creates a machine. `nic` must be the same transport the device was
    /// given to send with.
    pub fn new(name: impl Into<String>, device: Arc<dyn Device>, nic: Arc<Nic>) -> Self {
        Self {
            name: name.into(),
            device,
            nic,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Starts the device and processes inbound frames until shutdown.
    pub async fn run(self, shutdown: Shutdown) {
        let (send, recv) = mpsc::channel(INBOUND_CAPACITY);
        for (iface, tap) in self.nic.taps.iter().enumerate() {
            tap.start(iface as IfaceId, send.clone(), shutdown.clone());
        }
        drop(send);
        tracing::debug!(machine = %self.name, "starting");
        self.device.clone().start(shutdown.clone()).await;
        receive_loop(self.device, recv, shutdown).await;
        tracing::debug!(machine = %self.name, "stopped");
    }
}

/// Builds a device's interface list, one per network, with addresses derived
/// from `(ip, prefix length)` pairs. MAC addresses are taken from `mac_base`
/// with the interface index in the last octet.
pub fn ifaces(
    specs: impl IntoIterator<Item = (&'static str, [u8; 4], u32)>,
    mac_base: [u8; 6],
) -> Vec<Iface> {
    specs
        .into_iter()
        .enumerate()
        .map(|(i, (name, ip, prefix))| {
            let mut mac = mac_base;
            mac[5] = mac[5].wrapping_add(i as u8);
            Iface::new(
                name,
                ip.into(),
                Ipv4Mask::from_bitcount(prefix),
                mac.into(),
            )
        })
        .collect()
}
