use super::{Delivery, IfaceId, Mtu, SendError};
use crate::Shutdown;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, PoisonError,
};
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};

/// How many frames a segment buffers for a slow tap before it starts
/// dropping the oldest ones.
const SEGMENT_CAPACITY: usize = 256;

type TapId = u64;

#[derive(Debug, Clone)]
struct Transmission {
    frame: Arc<[u8]>,
    sender: TapId,
}

/// A shared Ethernet segment. Every frame sent through one of the segment's
/// taps is delivered to every other tap, like a hub. Point-to-point links are
/// simply segments with two taps.
#[derive(Debug)]
pub struct Network {
    mtu: Option<Mtu>,
    broadcast: broadcast::Sender<Transmission>,
    next_tap: AtomicU64,
}

impl Network {
    /// Creates a segment with no MTU.
    pub fn basic() -> Arc<Self> {
        Self::new(None)
    }

    /// Creates a segment that refuses frames longer than `mtu`.
    pub fn with_mtu(mtu: Mtu) -> Arc<Self> {
        Self::new(Some(mtu))
    }

    fn new(mtu: Option<Mtu>) -> Arc<Self> {
        Arc::new(Self {
            mtu,
            broadcast: broadcast::channel(SEGMENT_CAPACITY).0,
            next_tap: AtomicU64::new(0),
        })
    }

    /// Attaches a new tap. The tap sees every frame sent on the segment from
    /// this point on, even before it is started.
    pub fn tap(self: &Arc<Self>) -> Tap {
        Tap {
            network: self.clone(),
            id: self.next_tap.fetch_add(1, Ordering::Relaxed),
            receiver: Mutex::new(Some(self.broadcast.subscribe())),
        }
    }
}

/// An access point to a [`Network`], akin to the cable between an interface
/// and a hub port.
#[derive(Debug)]
pub struct Tap {
    network: Arc<Network>,
    id: TapId,
    receiver: Mutex<Option<broadcast::Receiver<Transmission>>>,
}

impl Tap {
    /// Puts a frame on the segment. Never blocks.
    pub fn send(&self, frame: &[u8]) -> Result<(), SendError> {
        if let Some(mtu) = self.network.mtu {
            if frame.len() > mtu as usize {
                Err(SendError::Mtu {
                    length: frame.len(),
                    mtu,
                })?
            }
        }
        let transmission = Transmission {
            frame: frame.into(),
            sender: self.id,
        };
        self.network
            .broadcast
            .send(transmission)
            .map(|_| ())
            .or(Err(SendError::Closed))
    }

    /// Spawns a task that forwards frames sent by other taps on the segment to
    /// `inbound`, labelled with `iface`. The task ends on shutdown or when the
    /// inbound channel is closed. A tap can only be started once.
    pub fn start(&self, iface: IfaceId, inbound: mpsc::Sender<Delivery>, mut shutdown: Shutdown) {
        let receiver = self
            .receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(mut receiver) = receiver else {
            tracing::error!("Tap {} on interface {} was started twice", self.id, iface);
            return;
        };
        let id = self.id;
        tokio::spawn(async move {
            loop {
                let transmission = tokio::select! {
                    _ = shutdown.wait() => break,
                    transmission = receiver.recv() => transmission,
                };
                match transmission {
                    Ok(transmission) if transmission.sender == id => {}
                    Ok(transmission) => {
                        let delivery = Delivery {
                            frame: transmission.frame.to_vec(),
                            iface,
                        };
                        if inbound.send(delivery).await.is_err() {
                            break;
                        }
                    }
                    Err(RecvError::Lagged(count)) => {
                        tracing::warn!("Interface {} missed {} frames", iface, count);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }
}
