//! Link-layer addressing, device interfaces, and the in-memory Ethernet
//! segments that devices are attached to.

use crate::protocols::ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net};
use std::{
    fmt::{self, Debug, Display},
    str::FromStr,
};

mod tap;
pub use tap::{Network, Tap};

/// Identifies one interface of a device. Interfaces are numbered in the order
/// they were given to the device, starting at zero.
pub type IfaceId = u32;

/// The maximum frame size a [`Network`] will carry.
pub type Mtu = u32;

/// A 48-bit Ethernet hardware address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Mac([u8; 6]);

impl Mac {
    /// `ff:ff:ff:ff:ff:ff`
    pub const BROADCAST: Self = Self([0xff; 6]);

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    pub const fn to_bytes(self) -> [u8; 6] {
        self.0
    }

    pub fn is_broadcast(self) -> bool {
        self == Self::BROADCAST
    }
}

impl From<[u8; 6]> for Mac {
    fn from(octets: [u8; 6]) -> Self {
        Self(octets)
    }
}

impl Display for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02x}:{b:02x}:{c:02x}:{d:02x}:{e:02x}:{g:02x}")
    }
}

impl Debug for Mac {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Mac({self})")
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("Invalid MAC address '{0}'")]
pub struct MacParseError(pub String);

impl FromStr for Mac {
    type Err = MacParseError;

    /// Parses six colon separated hex octets, such as `ca:fe:00:00:00:01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        crate::config::parse_mac(s).ok_or_else(|| MacParseError(s.to_string()))
    }
}

/// One network interface of a device, as reported by the device model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Iface {
    /// The interface name, e.g. `eth0`. Route tables refer to interfaces by
    /// this name.
    pub name: String,
    pub ip: Ipv4Address,
    pub mask: Ipv4Mask,
    pub mac: Mac,
}

impl Iface {
    pub fn new(name: impl Into<String>, ip: Ipv4Address, mask: Ipv4Mask, mac: Mac) -> Self {
        Self {
            name: name.into(),
            ip,
            mask,
            mac,
        }
    }

    /// The network this interface is directly connected to.
    pub fn net(&self) -> Ipv4Net {
        Ipv4Net::new(self.ip, self.mask)
    }
}

impl Display for Iface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}/{} {}",
            self.name,
            self.ip,
            self.mask.count_ones(),
            self.mac
        )
    }
}

/// A raw frame that arrived at a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// The complete Ethernet frame.
    pub frame: Vec<u8>,
    /// The interface the frame arrived on.
    pub iface: IfaceId,
}

/// Why a frame could not be handed to the network.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    #[error("The device has no interface {0}")]
    UnknownIface(IfaceId),
    #[error("A frame of {length} bytes exceeds the network MTU of {mtu}")]
    Mtu { length: usize, mtu: Mtu },
    #[error("The network has shut down")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_round_trips_through_text() {
        let mac: Mac = "AA:bb:0c:DD:ee:01".parse().unwrap();
        assert_eq!(mac, Mac::new([0xaa, 0xbb, 0x0c, 0xdd, 0xee, 0x01]));
        assert_eq!(mac.to_string(), "aa:bb:0c:dd:ee:01");
        assert!("aa:bb:cc:dd:ee".parse::<Mac>().is_err());
        assert!("aa:bb:cc:dd:ee:fg".parse::<Mac>().is_err());
        assert!(Mac::BROADCAST.is_broadcast());
    }

    #[test]
    fn iface_net_is_masked() {
        let iface = Iface::new(
            "eth0",
            Ipv4Address::new([10, 0, 1, 1]),
            Ipv4Mask::from_bitcount(24),
            Mac::new([2, 0, 0, 0, 0, 1]),
        );
        assert_eq!(iface.net().id(), Ipv4Address::new([10, 0, 1, 0]));
        assert_eq!(iface.to_string(), "eth0 10.0.1.1/24 02:00:00:00:00:01");
    }
}
