//! The RIPv2 message format.
//!
//! See <https://www.rfc-editor.org/rfc/rfc2453#section-4>

use crate::protocols::{
    ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net},
    utility::BytesExt,
};
use thiserror::Error as ThisError;

/// The only RIP version understood.
pub const VERSION: u8 = 2;
/// The address family identifier of IPv4 routes.
pub const ADDRESS_FAMILY_IPV4: u16 = 2;
/// The most entries one message may carry.
pub const MAX_ENTRIES: usize = 25;
/// The number of bytes before the first entry.
pub const HEADER_OCTETS: usize = 4;
/// The number of bytes in one entry.
pub const ENTRY_OCTETS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    Request = 1,
    Response = 2,
}

impl TryFrom<u8> for Command {
    type Error = ParseError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            1 => Ok(Self::Request),
            2 => Ok(Self::Response),
            _ => Err(ParseError::InvalidCommand(byte)),
        }
    }
}

/// One route in a RIP message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RipEntry {
    pub address_family: u16,
    pub route_tag: u16,
    pub address: Ipv4Address,
    /// Kept as it appeared on the wire. See [`RipEntry::net`].
    pub mask: Ipv4Address,
    pub next_hop: Ipv4Address,
    pub metric: u32,
}

impl RipEntry {
    /// Creates an IPv4 route entry.
    pub fn new(net: Ipv4Net, next_hop: Ipv4Address, metric: u32) -> Self {
        Self {
            address_family: ADDRESS_FAMILY_IPV4,
            route_tag: 0,
            address: net.id(),
            mask: net.mask().to_ipv4_address(),
            next_hop,
            metric,
        }
    }

    /// The network this entry describes, or `None` if the mask is not a
    /// contiguous prefix.
    pub fn net(&self) -> Option<Ipv4Net> {
        let mask = Ipv4Mask::try_from(self.mask).ok()?;
        Some(Ipv4Net::new(self.address, mask))
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.address_family.to_be_bytes());
        out.extend_from_slice(&self.route_tag.to_be_bytes());
        out.extend_from_slice(&self.address.to_bytes());
        out.extend_from_slice(&self.mask.to_bytes());
        out.extend_from_slice(&self.next_hop.to_bytes());
        out.extend_from_slice(&self.metric.to_be_bytes());
    }

    fn from_bytes(mut bytes: impl Iterator<Item = u8>) -> Option<Self> {
        Some(Self {
            address_family: bytes.next_u16_be()?,
            route_tag: bytes.next_u16_be()?,
            address: bytes.next_ipv4addr()?,
            mask: bytes.next_ipv4addr()?,
            next_hop: bytes.next_ipv4addr()?,
            metric: bytes.next_u32_be()?,
        })
    }
}

/// A RIPv2 message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RipPacket {
    pub command: Command,
    pub entries: Vec<RipEntry>,
}

impl RipPacket {
    /// A request without entries, asking neighbors for their tables.
    pub fn new_request() -> Self {
        Self {
            command: Command::Request,
            entries: vec![],
        }
    }

    /// Splits a table into as many responses as it takes to stay within
    /// [`MAX_ENTRIES`]. An empty table still yields one (empty) response.
    pub fn new_responses(entries: &[RipEntry]) -> Vec<Self> {
        if entries.is_empty() {
            return vec![Self {
                command: Command::Response,
                entries: vec![],
            }];
        }
        entries
            .chunks(MAX_ENTRIES)
            .map(|chunk| Self {
                command: Command::Response,
                entries: chunk.to_vec(),
            })
            .collect()
    }

    /// Parses a message from a UDP payload.
    pub fn from_bytes(payload: &[u8]) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;
        let mut bytes = payload.iter().cloned();
        let command = Command::try_from(bytes.next_u8().ok_or(HTS)?)?;
        let version = bytes.next_u8().ok_or(HTS)?;
        if version != VERSION {
            Err(ParseError::UnsupportedVersion(version))?
        }
        // Two bytes that must be zero, but nobody checks
        let _ = bytes.next_u16_be().ok_or(HTS)?;

        let body = &payload[HEADER_OCTETS..];
        if body.len() % ENTRY_OCTETS != 0 {
            Err(ParseError::EntryLength(body.len()))?
        }
        let count = body.len() / ENTRY_OCTETS;
        if count > MAX_ENTRIES {
            Err(ParseError::TooManyEntries(count))?
        }
        let entries = body
            .chunks_exact(ENTRY_OCTETS)
            .filter_map(|chunk| RipEntry::from_bytes(chunk.iter().cloned()))
            .collect();
        Ok(Self { command, entries })
    }

    /// Creates a serialized message.
    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_OCTETS + self.entries.len() * ENTRY_OCTETS);
        out.push(self.command as u8);
        out.push(VERSION);
        out.extend_from_slice(&[0, 0]);
        for entry in &self.entries {
            entry.write(&mut out);
        }
        out
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a RIP header")]
    HeaderTooShort,
    #[error("Unknown RIP command {0}")]
    InvalidCommand(u8),
    #[error("Only RIP version 2 is supported, got {0}")]
    UnsupportedVersion(u8),
    #[error("{0} bytes of entries is not a whole number of entries")]
    EntryLength(usize),
    #[error("A message may hold at most 25 entries, got {0}")]
    TooManyEntries(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(third_octet: u8, metric: u32) -> RipEntry {
        RipEntry::new(
            Ipv4Net::new([10, 0, third_octet, 0].into(), Ipv4Mask::from_bitcount(24)),
            Ipv4Address::CURRENT_NETWORK,
            metric,
        )
    }

    #[test]
    fn entry_wire_layout() {
        let packet = RipPacket {
            command: Command::Response,
            entries: vec![entry(1, 3)],
        };
        let expected = [
            2, 2, 0, 0, // header
            0, 2, 0, 0, // family, tag
            10, 0, 1, 0, // address
            255, 255, 255, 0, // mask
            0, 0, 0, 0, // next hop
            0, 0, 0, 3, // metric
        ];
        assert_eq!(packet.build(), expected);
        assert_eq!(RipPacket::from_bytes(&expected), Ok(packet));
    }

    #[test]
    fn empty_request() {
        let request = RipPacket::new_request();
        assert_eq!(request.build(), [1, 2, 0, 0]);
        assert_eq!(RipPacket::from_bytes(&[1, 2, 0, 0]), Ok(request));
    }

    #[test]
    fn rejects_malformed_messages() {
        assert_eq!(
            RipPacket::from_bytes(&[3, 2, 0, 0]),
            Err(ParseError::InvalidCommand(3))
        );
        assert_eq!(
            RipPacket::from_bytes(&[2, 1, 0, 0]),
            Err(ParseError::UnsupportedVersion(1))
        );
        assert_eq!(
            RipPacket::from_bytes(&[2, 2, 0]),
            Err(ParseError::HeaderTooShort)
        );
        assert_eq!(
            RipPacket::from_bytes(&[2, 2, 0, 0, 0, 2, 0, 0]),
            Err(ParseError::EntryLength(4))
        );
        let mut oversized = vec![2, 2, 0, 0];
        for i in 0..26 {
            entry(i, 1).write(&mut oversized);
        }
        assert_eq!(
            RipPacket::from_bytes(&oversized),
            Err(ParseError::TooManyEntries(26))
        );
    }

    #[test]
    fn responses_hold_at_most_25_entries() {
        let entries: Vec<_> = (0..60).map(|i| entry(i, 1)).collect();
        let responses = RipPacket::new_responses(&entries);
        let sizes: Vec<_> = responses.iter().map(|r| r.entries.len()).collect();
        assert_eq!(sizes, vec![25, 25, 10]);
        assert_eq!(responses[2].entries[9], entries[59]);
        assert_eq!(RipPacket::new_responses(&[]).len(), 1);
    }

    #[test]
    fn rejects_non_contiguous_entry_masks() {
        let mut bad = entry(1, 1);
        bad.mask = Ipv4Address::new([255, 0, 255, 0]);
        assert_eq!(bad.net(), None);
        assert_eq!(
            entry(1, 1).net(),
            Some(Ipv4Net::new([10, 0, 1, 0].into(), Ipv4Mask::from_bitcount(24)))
        );
    }
}
