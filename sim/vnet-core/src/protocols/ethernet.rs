//! Ethernet II framing. Only the 14 byte header is modelled: there is no
//! preamble and no frame check sequence on a simulated segment.

use crate::{network::Mac, protocols::utility::BytesExt};
use thiserror::Error as ThisError;

/// The number of bytes in an Ethernet header.
pub const HEADER_OCTETS: usize = 14;

/// The ether type of an IPv4 payload.
pub const ETHER_TYPE_IPV4: u16 = 0x0800;

/// A borrowed view of an Ethernet frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EthernetFrame<'a> {
    pub destination: Mac,
    pub source: Mac,
    pub ether_type: u16,
    pub payload: &'a [u8],
}

impl<'a> EthernetFrame<'a> {
    /// Splits a raw frame into its header fields and payload.
    pub fn from_bytes(frame: &'a [u8]) -> Result<Self, ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;
        let mut bytes = frame.iter().cloned();
        let destination = Mac::new(bytes.next_n().ok_or(HTS)?);
        let source = Mac::new(bytes.next_n().ok_or(HTS)?);
        let ether_type = bytes.next_u16_be().ok_or(HTS)?;
        Ok(Self {
            destination,
            source,
            ether_type,
            payload: &frame[HEADER_OCTETS..],
        })
    }

    /// Whether the payload is an IPv4 datagram.
    pub fn is_ipv4(&self) -> bool {
        self.ether_type == ETHER_TYPE_IPV4
    }

    /// Creates a serialized frame from the configuration provided.
    pub fn build(&self) -> Vec<u8> {
        build_frame(self.destination, self.source, self.ether_type, [self.payload])
    }
}

/// Serializes a frame whose payload is split over several buffers, such as
/// separately built headers.
pub fn build_frame<'a>(
    destination: Mac,
    source: Mac,
    ether_type: u16,
    payload: impl IntoIterator<Item = &'a [u8]>,
) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_OCTETS);
    out.extend_from_slice(&destination.to_bytes());
    out.extend_from_slice(&source.to_bytes());
    out.extend_from_slice(&ether_type.to_be_bytes());
    for part in payload {
        out.extend_from_slice(part);
    }
    out
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute an Ethernet header")]
    HeaderTooShort,
}
