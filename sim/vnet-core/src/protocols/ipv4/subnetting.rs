//! Subnet masks and network IDs.
//!
//! Only CIDR masks (contiguous ones followed by zeros) are representable.
//! Classful addressing is not supported.

use std::{fmt, str::FromStr};

use super::Ipv4Address;

/// A struct representing an Ipv4 subnet mask.
/// (It's a thin wrapper around a u32.)
///
/// Ordering follows the underlying `u32`, so for valid masks a longer prefix
/// always compares greater than a shorter one.
#[derive(Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord, Default)]
pub struct Ipv4Mask(u32);

impl fmt::Debug for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Ipv4Mask")
            .field(&Ipv4Address::from(self.0))
            .finish()
    }
}

impl fmt::Display for Ipv4Mask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.to_ipv4_address(), f)
    }
}

impl Ipv4Mask {
    /// Returns a mask of `size` 1s.
    /// If `size > 32`, then it will be set to 32.
    ///
    /// # Examples
    ///
    /// ```
    /// # use vnet_core::protocols::ipv4::Ipv4Mask;
    /// // 255.255.0.0
    /// let mask = Ipv4Mask::from_bitcount(16);
    /// assert_eq!(u32::from(mask), 0xFF_FF_00_00);
    /// ```
    pub const fn from_bitcount(size: u32) -> Ipv4Mask {
        let size = if size > 32 { 32 } else { size };
        if size == 0 {
            Ipv4Mask(0)
        } else if size == 32 {
            Ipv4Mask(0xFF_FF_FF_FF)
        } else {
            Ipv4Mask(((1 << size) - 1) << (32 - size))
        }
    }

    /// Returns the prefix length of this mask.
    pub const fn count_ones(&self) -> u32 {
        self.0.count_ones()
    }

    /// Turns the mask into a u32.
    pub const fn to_u32(self) -> u32 {
        self.0
    }

    /// Turns the mask into an Ipv4 address.
    pub const fn to_ipv4_address(self) -> Ipv4Address {
        Ipv4Address::new(self.to_u32().to_be_bytes())
    }

    /// Clears the host portion of `address`.
    pub fn apply(self, address: Ipv4Address) -> Ipv4Address {
        Ipv4Address::from(address.to_u32() & self.0)
    }
}

impl From<Ipv4Mask> for u32 {
    fn from(mask: Ipv4Mask) -> u32 {
        mask.0
    }
}

impl From<Ipv4Mask> for Ipv4Address {
    fn from(mask: Ipv4Mask) -> Ipv4Address {
        Ipv4Address::from(mask.to_u32())
    }
}

impl TryFrom<u32> for Ipv4Mask {
    type Error = u32;

    /// Returns an Ipv4Mask based on the u32.
    /// If the u32 is not a valid subnet mask (that is, it has 0s between the 1s),
    /// this will return the number back as an error.
    fn try_from(mask: u32) -> Result<Ipv4Mask, u32> {
        let result = Ipv4Mask::from_bitcount(mask.count_ones());
        if u32::from(result) == mask {
            Ok(result)
        } else {
            Err(mask)
        }
    }
}

impl TryFrom<Ipv4Address> for Ipv4Mask {
    type Error = Ipv4Address;

    fn try_from(mask: Ipv4Address) -> Result<Ipv4Mask, Ipv4Address> {
        Ipv4Mask::try_from(mask.to_u32()).or(Err(mask))
    }
}

/// An IPv4 network: a network ID and its mask.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ipv4Net {
    /// Always has the host bits cleared, otherwise `Eq` breaks
    network_id: Ipv4Address,
    mask: Ipv4Mask,
}

impl Ipv4Net {
    /// Creates an Ipv4Net from an IP address and mask. Host bits of `ip` are
    /// discarded.
    pub fn new(ip: Ipv4Address, mask: Ipv4Mask) -> Self {
        Self {
            network_id: mask.apply(ip),
            mask,
        }
    }

    /// Returns the network ID.
    pub fn id(&self) -> Ipv4Address {
        self.network_id
    }

    /// Returns the `Ipv4Mask` of this network.
    pub fn mask(&self) -> Ipv4Mask {
        self.mask
    }

    /// Returns `true` if the `address` is contained in this network.
    pub fn contains(&self, address: Ipv4Address) -> bool {
        self.network_id == self.mask.apply(address)
    }
}

impl From<(Ipv4Address, Ipv4Mask)> for Ipv4Net {
    fn from(value: (Ipv4Address, Ipv4Mask)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl fmt::Debug for Ipv4Net {
    /// The results will be of form `Ipv4Net {10.0.0.0/8}`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ipv4Net {{{}}}", self)
    }
}

impl fmt::Display for Ipv4Net {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_id, self.mask.count_ones())
    }
}

#[derive(Clone, Debug, thiserror::Error, PartialEq, Eq)]
pub enum CidrParseError {
    #[error("Expected a string of form address/length")]
    Format,
    #[error("Invalid IPv4 address")]
    Ipv4,
    #[error("Invalid mask length: {0}")]
    Mask(#[from] std::num::ParseIntError),
}

/// Turns a string in CIDR notation into an Ipv4 address and a subnet mask.
///
/// # Examples
///
/// ```
/// # use vnet_core::protocols::ipv4::{cidr_to_ip, Ipv4Address, Ipv4Mask};
/// let (ip, mask) = cidr_to_ip("123.45.67.8/14").unwrap();
/// assert_eq!(ip, Ipv4Address::new([123, 45, 67, 8]));
/// assert_eq!(mask, Ipv4Mask::from_bitcount(14));
///
/// cidr_to_ip("5.6.7.8").expect_err("5.6.7.8 is just an IP address");
/// ```
pub fn cidr_to_ip(cidr: &str) -> Result<(Ipv4Address, Ipv4Mask), CidrParseError> {
    let (ip_str, mask_str) = cidr.split_once('/').ok_or(CidrParseError::Format)?;
    let ip = Ipv4Address::from_str(ip_str).or(Err(CidrParseError::Ipv4))?;
    let mask = Ipv4Mask::from_bitcount(u32::from_str(mask_str)?);
    Ok((ip, mask))
}
