use super::Ipv4Address;
use crate::protocols::utility::{BytesExt, Checksum};
use std::fmt::{self, Debug, Formatter};
use thiserror::Error as ThisError;

/// The number of `u32` words in a basic IPv4 header
const BASE_WORDS: u8 = 5;
/// The number of `u8` bytes in a basic IPv4 header
pub const BASE_OCTETS: usize = BASE_WORDS as usize * 4;
/// This is bitwise anded with the `u16` containing flags and fragment offset to
/// extract the fragment offset part.
const FRAGMENT_OFFSET_MASK: u16 = 0x1fff;
/// The TTL given to datagrams that don't ask for another one.
const DEFAULT_TIME_TO_LIVE: u8 = 64;

/// An IPv4 header, as described in RFC791 p11 s3.1
///
/// A parsed header keeps the checksum it arrived with, so callers can decide
/// for themselves what to do about a mismatch. [`Ipv4Header::serialize`]
/// always writes a freshly computed checksum.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ipv4Header {
    /// Internet Header Length, the number of `u32` words in the IPv4 header
    pub ihl: u8,
    /// The quality of service desired
    pub type_of_service: u8,
    /// The length of the datagram in bytes
    pub total_length: u16,
    /// Assigned by the sender to aid in assembling fragments
    pub identification: u16,
    /// Where in the datagram this fragment belongs in units of 8 bytes
    pub fragment_offset: u16,
    /// Flags describing fragmentation properties
    pub flags: ControlFlags,
    /// The number of remaining hops this datagram can take before being removed
    pub time_to_live: u8,
    /// Indicates the next level protocol in the data portion of the datagram
    pub protocol: u8,
    /// The IPv4 header checksum
    pub checksum: u16,
    /// The source address
    pub source: Ipv4Address,
    /// The destination address
    pub destination: Ipv4Address,
    /// Raw option bytes, `ihl * 4 - 20` of them
    pub options: Vec<u8>,
}

impl Ipv4Header {
    /// Parses a header from the start of `packet`. Returns the header and the
    /// payload, which is cut to the header's total length so any link layer
    /// padding is left out.
    pub fn from_bytes(packet: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        let mut bytes = packet.iter().cloned();

        let version_and_ihl = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let version = version_and_ihl >> 4;
        if version != 4 {
            Err(ParseError::IncorrectIpv4Version)?
        }
        let ihl = version_and_ihl & 0b1111;
        if ihl < BASE_WORDS {
            Err(ParseError::InvalidHeaderLength(ihl))?
        }
        let header_length = ihl as usize * 4;

        let type_of_service = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let total_length = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;
        let identification = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;

        let flags_and_fragment_offset = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;
        let fragment_offset = flags_and_fragment_offset & FRAGMENT_OFFSET_MASK;
        let control_flag_bits = (flags_and_fragment_offset >> 13) as u8;

        let time_to_live = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let protocol = bytes.next_u8().ok_or(ParseError::HeaderTooShort)?;
        let checksum = bytes.next_u16_be().ok_or(ParseError::HeaderTooShort)?;
        let source = bytes.next_ipv4addr().ok_or(ParseError::HeaderTooShort)?;
        let destination = bytes.next_ipv4addr().ok_or(ParseError::HeaderTooShort)?;

        if packet.len() < header_length {
            Err(ParseError::HeaderTooShort)?
        }
        if (total_length as usize) < header_length || total_length as usize > packet.len() {
            Err(ParseError::InvalidTotalLength {
                total_length,
                available: packet.len(),
            })?
        }
        let options = packet[BASE_OCTETS..header_length].to_vec();
        let payload = &packet[header_length..total_length as usize];

        let header = Self {
            ihl,
            type_of_service,
            total_length,
            identification,
            fragment_offset,
            flags: control_flag_bits.into(),
            time_to_live,
            protocol,
            checksum,
            source,
            destination,
            options,
        };
        Ok((header, payload))
    }

    /// The length of the header in bytes, options included.
    pub fn header_length(&self) -> usize {
        self.ihl as usize * 4
    }

    /// Derives the checksum from the other header fields.
    pub fn compute_checksum(&self) -> u16 {
        let mut checksum = Checksum::new();
        checksum.accumulate_remainder(self.fields(0).into_iter());
        checksum.as_u16()
    }

    /// Whether the stored checksum matches the header contents.
    pub fn has_valid_checksum(&self) -> bool {
        self.checksum == self.compute_checksum()
    }

    /// Returns a copy of this header with the TTL reduced by one and the
    /// checksum refreshed to match, or `None` if the datagram has no hops
    /// left.
    pub fn with_decremented_ttl(&self) -> Option<Self> {
        let time_to_live = self.time_to_live.checked_sub(1).filter(|&ttl| ttl > 0)?;
        let mut header = Self {
            time_to_live,
            ..self.clone()
        };
        header.checksum = header.compute_checksum();
        Some(header)
    }

    /// Writes the header in network byte order with a freshly computed
    /// checksum.
    pub fn serialize(&self) -> Vec<u8> {
        self.fields(self.compute_checksum())
    }

    fn fields(&self, checksum: u16) -> Vec<u8> {
        let flags_and_fragment_offset =
            ((self.flags.as_u8() as u16) << 13) | (self.fragment_offset & FRAGMENT_OFFSET_MASK);
        let mut out = Vec::with_capacity(self.header_length());
        out.push((4u8 << 4) | self.ihl);
        out.push(self.type_of_service);
        out.extend_from_slice(&self.total_length.to_be_bytes());
        out.extend_from_slice(&self.identification.to_be_bytes());
        out.extend_from_slice(&flags_and_fragment_offset.to_be_bytes());
        out.push(self.time_to_live);
        out.push(self.protocol);
        out.extend_from_slice(&checksum.to_be_bytes());
        out.extend_from_slice(&self.source.to_bytes());
        out.extend_from_slice(&self.destination.to_bytes());
        out.extend_from_slice(&self.options);
        out
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("The IPv4 header is incomplete")]
    HeaderTooShort,
    #[error("Expected version 4 in IPv4 header")]
    IncorrectIpv4Version,
    #[error("An IHL of {0} is shorter than the basic header")]
    InvalidHeaderLength(u8),
    #[error("A total length of {total_length} does not fit the {available} bytes available")]
    InvalidTotalLength { total_length: u16, available: usize },
}

/// A builder for the headers of datagrams that a device originates itself.
/// The fields align with those found on [`Ipv4Header`].
pub struct Ipv4HeaderBuilder {
    payload_length: u16,
    identification: u16,
    flags: ControlFlags,
    time_to_live: u8,
    protocol: u8,
    source: Ipv4Address,
    destination: Ipv4Address,
}

impl Ipv4HeaderBuilder {
    /// Creates a new builder.
    pub fn new(
        source: Ipv4Address,
        destination: Ipv4Address,
        protocol: u8,
        payload_length: u16,
    ) -> Self {
        Self {
            payload_length,
            identification: 0,
            flags: Default::default(),
            time_to_live: DEFAULT_TIME_TO_LIVE,
            protocol,
            source,
            destination,
        }
    }

    /// Sets the time to live
    pub fn time_to_live(mut self, time_to_live: u8) -> Self {
        self.time_to_live = time_to_live;
        self
    }

    /// Sets the identification field
    pub fn identification(mut self, identification: u16) -> Self {
        self.identification = identification;
        self
    }

    /// Sets the control flags
    pub fn flags(mut self, flags: ControlFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Creates a serialized header from the configuration provided
    pub fn build(self) -> Result<Vec<u8>, HeaderBuildError> {
        let total_length = self
            .payload_length
            .checked_add(BASE_OCTETS as u16)
            .ok_or(HeaderBuildError::OverlyLongPayload)?;
        let header = Ipv4Header {
            ihl: BASE_WORDS,
            type_of_service: 0,
            total_length,
            identification: self.identification,
            fragment_offset: 0,
            flags: self.flags,
            time_to_live: self.time_to_live,
            protocol: self.protocol,
            checksum: 0,
            source: self.source,
            destination: self.destination,
            options: vec![],
        };
        Ok(header.serialize())
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum HeaderBuildError {
    #[error("The payload is longer than is allowed")]
    OverlyLongPayload,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlFlags(u8);

impl ControlFlags {
    pub const DEFAULT: Self = Self::new(true, true);

    pub const fn new(may_fragment: bool, is_last_fragment: bool) -> Self {
        Self((!is_last_fragment as u8) | ((!may_fragment as u8) << 1))
    }

    pub const fn may_fragment(&self) -> bool {
        self.0 & 0b10 == 0
    }

    pub const fn is_last_fragment(&self) -> bool {
        self.0 & 0b01 == 0
    }

    pub const fn as_u8(self) -> u8 {
        self.0
    }
}

impl Debug for ControlFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControlFlags")
            .field("MayFrag", &self.may_fragment())
            .field("LastFrag", &self.is_last_fragment())
            .finish()
    }
}

impl Default for ControlFlags {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u8> for ControlFlags {
    fn from(byte: u8) -> Self {
        Self(byte)
    }
}
