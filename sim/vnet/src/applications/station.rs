use std::sync::Arc;
use thiserror::Error as ThisError;
use tokio::sync::mpsc::{self, error::TryRecvError};
use vnet_core::{
    network::{IfaceId, SendError},
    protocols::{
        ipv4::Ipv4Address,
        udp::{build_udp_frame, FrameBuildError, Route},
        EthernetFrame, Ipv4Header, UdpHeader,
    },
    Device, Iface, Mac, Transport,
};

/// The TTL of datagrams a station sends.
pub const TIME_TO_LIVE: u8 = 64;

/// An end host with a single interface, used to put traffic into a
/// simulation and see what comes out.
///
/// A station hears every frame on its segment and passes all of them on to
/// its [`Inbox`].
pub struct Station {
    iface: Iface,
    transport: Arc<dyn Transport>,
    heard: mpsc::UnboundedSender<Vec<u8>>,
}

impl Station {
    pub fn new(iface: Iface, transport: Arc<dyn Transport>) -> (Self, Inbox) {
        let (heard, receiver) = mpsc::unbounded_channel();
        let inbox = Inbox {
            receiver,
            mac: iface.mac,
            ip: iface.ip,
        };
        let station = Self {
            iface,
            transport,
            heard,
        };
        (station, inbox)
    }

    pub fn iface(&self) -> &Iface {
        &self.iface
    }

    /// Sends a UDP datagram to `destination`, in a frame addressed to
    /// `next_mac`.
    pub fn send_udp(
        &self,
        destination: Ipv4Address,
        next_mac: Mac,
        source_port: u16,
        destination_port: u16,
        payload: &[u8],
    ) -> Result<(), StationError> {
        let route = Route {
            source_mac: self.iface.mac,
            destination_mac: next_mac,
            source_ip: self.iface.ip,
            destination_ip: destination,
            time_to_live: TIME_TO_LIVE,
        };
        let frame = build_udp_frame(route, source_port, destination_port, payload)?;
        self.transport.send(&frame, 0)?;
        Ok(())
    }
}

impl Device for Station {
    fn handle_packet(&self, frame: &[u8], _ingress: IfaceId) {
        // Nobody is listening any more
        let _ = self.heard.send(frame.to_vec());
    }
}

/// The frames a [`Station`] has heard.
pub struct Inbox {
    receiver: mpsc::UnboundedReceiver<Vec<u8>>,
    mac: Mac,
    ip: Ipv4Address,
}

impl Inbox {
    /// Waits for the next frame heard, whoever it was for. Returns `None` once
    /// the station is gone.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.receiver.recv().await
    }

    /// Waits for the next UDP datagram addressed to the station, skipping
    /// everything else.
    pub async fn recv_udp(&mut self) -> Option<Datagram> {
        loop {
            let frame = self.receiver.recv().await?;
            if let Some(datagram) = Datagram::parse(&frame) {
                if datagram.destination_mac == self.mac && datagram.destination == self.ip {
                    return Some(datagram);
                }
            }
        }
    }

    /// Takes every frame heard so far without waiting.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        let mut frames = vec![];
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => frames.push(frame),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => return frames,
            }
        }
    }
}

/// A UDP datagram as received by a station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub source_mac: Mac,
    pub destination_mac: Mac,
    pub source: Ipv4Address,
    pub destination: Ipv4Address,
    pub time_to_live: u8,
    pub source_port: u16,
    pub destination_port: u16,
    pub payload: Vec<u8>,
}

impl Datagram {
    /// Parses a frame carrying a UDP datagram with valid checksums.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let ethernet = EthernetFrame::from_bytes(frame).ok()?;
        if !ethernet.is_ipv4() {
            return None;
        }
        let (ip, datagram) = Ipv4Header::from_bytes(ethernet.payload).ok()?;
        if !ip.has_valid_checksum() {
            return None;
        }
        let (udp, payload) = UdpHeader::from_bytes_ipv4(datagram, ip.source, ip.destination).ok()?;
        Some(Self {
            source_mac: ethernet.source,
            destination_mac: ethernet.destination,
            source: ip.source,
            destination: ip.destination,
            time_to_live: ip.time_to_live,
            source_port: udp.source,
            destination_port: udp.destination,
            payload: payload.to_vec(),
        })
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum StationError {
    #[error("Could not build the frame: {0}")]
    Build(#[from] FrameBuildError),
    #[error("Could not send the frame: {0}")]
    Send(#[from] SendError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::applications::Capture;
    use vnet_core::protocols::ipv4::Ipv4Mask;

    #[tokio::test]
    async fn hears_its_own_datagrams() {
        let iface = Iface::new(
            "eth0",
            [10, 0, 0, 2].into(),
            Ipv4Mask::from_bitcount(24),
            Mac::new([2, 0, 0, 0, 0, 2]),
        );
        let capture = Arc::new(Capture::new(1));
        let (station, mut inbox) = Station::new(iface.clone(), capture.clone());

        station
            .send_udp(iface.ip, iface.mac, 1000, 2000, b"echo")
            .unwrap();
        let (egress, frame) = capture.take().remove(0);
        assert_eq!(egress, 0);

        station.handle_packet(&[0; 4], 0);
        station.handle_packet(&frame, 0);
        let datagram = inbox.recv_udp().await.unwrap();
        assert_eq!(datagram.payload, b"echo");
        assert_eq!(datagram.time_to_live, TIME_TO_LIVE);
        assert_eq!((datagram.source_port, datagram.destination_port), (1000, 2000));
        assert!(inbox.drain().is_empty());
    }
}
