//! The seam between device logic and the network it is attached to.

use crate::{
    logging::send_failure_event,
    network::{Delivery, IfaceId, SendError},
    Shutdown,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Puts frames on the wire. Sending is best effort and never blocks.
pub trait Transport: Send + Sync {
    /// Sends a complete Ethernet frame out of interface `egress`.
    fn send(&self, frame: &[u8], egress: IfaceId) -> Result<(), SendError>;

    /// The number of interfaces frames can be sent on.
    fn iface_count(&self) -> usize;
}

/// Sends `frame` and logs any failure. Returns whether the frame was sent.
pub fn transmit(transport: &dyn Transport, frame: &[u8], egress: IfaceId) -> bool {
    match transport.send(frame, egress) {
        Ok(()) => true,
        Err(error) => {
            send_failure_event(egress, error);
            false
        }
    }
}

/// A packet processing device such as a router or a switch.
#[async_trait]
pub trait Device: Send + Sync + 'static {
    /// Processes one frame that arrived on interface `ingress`. Errors are
    /// dealt with inside the device; the outcome is only visible through
    /// logging and the frames the device sends.
    fn handle_packet(&self, frame: &[u8], ingress: IfaceId);

    /// Called once when the device is brought up, before any frame is
    /// handled. Devices with background work spawn it here and stop it when
    /// `shutdown` fires.
    async fn start(self: Arc<Self>, _shutdown: Shutdown) {}
}

/// Feeds every inbound frame to `device`, one at a time, until the stream of
/// frames ends or a shutdown is signalled.
pub async fn receive_loop(
    device: Arc<dyn Device>,
    mut inbound: mpsc::Receiver<Delivery>,
    mut shutdown: Shutdown,
) {
    loop {
        let delivery = tokio::select! {
            _ = shutdown.wait() => break,
            delivery = inbound.recv() => delivery,
        };
        match delivery {
            Some(Delivery { frame, iface }) => device.handle_packet(&frame, iface),
            None => break,
        }
    }
}
