use crate::protocols::{
    ipv4::{Ipv4Address, ProtocolNumber},
    utility::{BytesExt, Checksum},
};
use thiserror::Error as ThisError;

/// The number of bytes in a UDP header
pub const HEADER_OCTETS: usize = 8;

/// Represents a UDP header, either one that was parsed or one we are going to
/// serialize
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpHeader {
    /// The source port
    pub source: u16,
    /// The destination port
    pub destination: u16,
    /// The length of the UDP packet in bytes, including the header
    pub length: u16,
    /// The UDP checksum. Zero means the sender did not compute one.
    pub checksum: u16,
}

impl UdpHeader {
    /// Parses the UDP datagram carried by an IPv4 packet between the given
    /// addresses, returning the header and the payload. The checksum is only
    /// verified when the sender filled it in.
    pub fn from_bytes_ipv4(
        datagram: &[u8],
        source_address: Ipv4Address,
        destination_address: Ipv4Address,
    ) -> Result<(Self, &[u8]), ParseError> {
        const HTS: ParseError = ParseError::HeaderTooShort;
        let mut bytes = datagram.iter().cloned();

        let source = bytes.next_u16_be().ok_or(HTS)?;
        let destination = bytes.next_u16_be().ok_or(HTS)?;
        let length = bytes.next_u16_be().ok_or(HTS)?;
        let checksum = bytes.next_u16_be().ok_or(HTS)?;

        if datagram.len() != length as usize {
            Err(ParseError::LengthMismatch)?
        }
        let payload = &datagram[HEADER_OCTETS..];

        if checksum != 0 {
            let actual = pseudo_header_checksum(
                source_address,
                source,
                destination_address,
                destination,
                payload,
            );
            if actual != checksum {
                Err(ParseError::Checksum {
                    actual,
                    expected: checksum,
                })?
            }
        }

        let header = Self {
            source,
            destination,
            length,
            checksum,
        };
        Ok((header, payload))
    }
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("Too few bytes to constitute a UDP header")]
    HeaderTooShort,
    #[error(
        "The computed checksum {actual:#06x} did not match the header checksum {expected:#06x}"
    )]
    Checksum { actual: u16, expected: u16 },
    #[error("The number of message bytes differs from the header")]
    LengthMismatch,
}

/// Creates a serialized UDP packet header with the values provided
pub fn build_udp_header(
    source_address: Ipv4Address,
    source_port: u16,
    destination_address: Ipv4Address,
    destination_port: u16,
    payload: &[u8],
) -> Result<Vec<u8>, BuildHeaderError> {
    let length: u16 = (payload.len() + HEADER_OCTETS)
        .try_into()
        .map_err(|_| BuildHeaderError::OverlyLongPayload)?;
    let checksum = pseudo_header_checksum(
        source_address,
        source_port,
        destination_address,
        destination_port,
        payload,
    );

    let mut out = Vec::with_capacity(HEADER_OCTETS);
    out.extend_from_slice(&source_port.to_be_bytes());
    out.extend_from_slice(&destination_port.to_be_bytes());
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(&checksum.to_be_bytes());
    Ok(out)
}

fn pseudo_header_checksum(
    source_address: Ipv4Address,
    source_port: u16,
    destination_address: Ipv4Address,
    destination_port: u16,
    payload: &[u8],
) -> u16 {
    let length = (payload.len() + HEADER_OCTETS) as u16;
    let mut checksum = Checksum::new();
    // Once for the header, again for the pseudo header
    checksum.add_u16(length);
    checksum.add_u16(length);
    checksum.add_u32(source_address.into());
    checksum.add_u32(destination_address.into());
    checksum.add_u8(0, ProtocolNumber::UDP as u8);
    checksum.add_u16(source_port);
    checksum.add_u16(destination_port);
    checksum.accumulate_remainder(payload.iter().cloned());
    checksum.as_transport_u16()
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum BuildHeaderError {
    #[error("The UDP payload is longer than can fit into a single packet")]
    OverlyLongPayload,
}
