//! Parsers for the text formats of the static device tables.
//!
//! Both formats are line oriented with whitespace separated fields. Blank
//! lines and lines whose first non-blank character is `#` are skipped.
//!
//! - Route tables: `destination gateway mask interface`, e.g.
//!   `10.0.1.0 0.0.0.0 255.255.255.0 eth0`
//! - ARP caches: `ip mac`, e.g. `10.0.1.5 aa:bb:cc:dd:ee:01`

use crate::{network::Mac, protocols::ipv4::Ipv4Address};
use nom::{
    bytes::complete::{take_while1, take_while_m_n},
    character::complete::{char, space0, space1},
    combinator::{all_consuming, map_res},
    error::{context, VerboseError, VerboseErrorKind},
    multi::count,
    sequence::{preceded, terminated, tuple},
    Finish, IResult,
};
use std::{io, path::PathBuf};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Why a table file could not be loaded.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Could not read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Line {line}: {reason}")]
    Line { line: usize, reason: LineError },
}

/// What was wrong with one line of a table file.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
pub enum LineError {
    #[error("expected {expected} at '{text}'")]
    Malformed { expected: &'static str, text: String },
    #[error("{0} is not a contiguous subnet mask")]
    Mask(Ipv4Address),
    #[error("no interface named '{0}'")]
    UnknownIface(String),
}

impl LineError {
    fn from_nom(error: VerboseError<&str>, line: &str) -> Self {
        let expected = error
            .errors
            .iter()
            .find_map(|(_, kind)| match kind {
                VerboseErrorKind::Context(context) => Some(*context),
                _ => None,
            })
            .unwrap_or("end of line");
        let text = error
            .errors
            .first()
            .map(|(rest, _)| *rest)
            .unwrap_or(line)
            .trim()
            .to_string();
        LineError::Malformed { expected, text }
    }
}

/// Yields the meaningful lines of a table file with their one-based line
/// numbers.
pub fn config_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
}

/// The fields of a route table line, before the interface name is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLine<'a> {
    pub destination: Ipv4Address,
    pub gateway: Ipv4Address,
    pub mask: Ipv4Address,
    pub iface: &'a str,
}

/// Parses `destination gateway mask interface`.
pub fn route_line(line: &str) -> Result<RouteLine<'_>, LineError> {
    let parser = tuple((
        context("a destination address", preceded(space0, ipv4)),
        context("a gateway address", preceded(space1, ipv4)),
        context("a subnet mask", preceded(space1, ipv4)),
        context("an interface name", preceded(space1, word)),
    ));
    let (_, (destination, gateway, mask, iface)) = all_consuming(terminated(parser, space0))(line)
        .finish()
        .map_err(|e| LineError::from_nom(e, line))?;
    Ok(RouteLine {
        destination,
        gateway,
        mask,
        iface,
    })
}

/// Parses `ip mac`.
pub fn arp_line(line: &str) -> Result<(Ipv4Address, Mac), LineError> {
    let parser = tuple((
        context("an IP address", preceded(space0, ipv4)),
        context("a MAC address", preceded(space1, mac)),
    ));
    let (_, entry) = all_consuming(terminated(parser, space0))(line)
        .finish()
        .map_err(|e| LineError::from_nom(e, line))?;
    Ok(entry)
}

/// Parses a complete MAC address such as `ca:fe:00:00:00:01`.
pub(crate) fn parse_mac(s: &str) -> Option<Mac> {
    all_consuming(mac)(s).finish().ok().map(|(_, mac)| mac)
}

fn word(s: &str) -> Res<&str> {
    take_while1(|c: char| !c.is_whitespace())(s)
}

fn ipv4(s: &str) -> Res<Ipv4Address> {
    map_res(word, str::parse)(s)
}

fn hex_octet(s: &str) -> Res<u8> {
    map_res(take_while_m_n(1, 2, |c: char| c.is_ascii_hexdigit()), |hex| {
        u8::from_str_radix(hex, 16)
    })(s)
}

fn mac(s: &str) -> Res<Mac> {
    let (s, first) = hex_octet(s)?;
    let (s, rest) = count(preceded(char(':'), hex_octet), 5)(s)?;
    let mut octets = [first; 6];
    octets[1..].copy_from_slice(&rest);
    Ok((s, Mac::new(octets)))
}
