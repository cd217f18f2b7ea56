use std::sync::{Mutex, PoisonError};
use vnet_core::{
    network::{IfaceId, SendError},
    Transport,
};

/// A transport that keeps every frame it is asked to send instead of putting
/// it on a network. Used to drive a device directly and inspect its output.
#[derive(Debug)]
pub struct Capture {
    ifaces: usize,
    sent: Mutex<Vec<(IfaceId, Vec<u8>)>>,
}

impl Capture {
    /// Creates a capture standing in for `ifaces` interfaces.
    pub fn new(ifaces: usize) -> Self {
        Self {
            ifaces,
            sent: Default::default(),
        }
    }

    /// Removes and returns everything sent so far, oldest first.
    pub fn take(&self) -> Vec<(IfaceId, Vec<u8>)> {
        std::mem::take(&mut *self.sent.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// The number of frames sent and not yet taken.
    pub fn len(&self) -> usize {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Transport for Capture {
    fn send(&self, frame: &[u8], egress: IfaceId) -> Result<(), SendError> {
        if egress as usize >= self.ifaces {
            return Err(SendError::UnknownIface(egress));
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((egress, frame.to_vec()));
        Ok(())
    }

    fn iface_count(&self) -> usize {
        self.ifaces
    }
}
