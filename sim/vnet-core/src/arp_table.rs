//! The static ARP cache of a router.

use crate::{
    config::{arp_line, config_lines, LoadError},
    network::Mac,
    protocols::ipv4::Ipv4Address,
};
use rustc_hash::FxHashMap;
use std::{
    fmt::{self, Display},
    path::Path,
};

/// Maps IP addresses to MAC addresses. Read only once loaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressTable {
    entries: FxHashMap<Ipv4Address, Mac>,
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an ARP cache file's contents.
    pub fn parse(text: &str) -> Result<Self, LoadError> {
        config_lines(text)
            .map(|(line, text)| arp_line(text).map_err(|reason| LoadError::Line { line, reason }))
            .collect()
    }

    /// Reads and parses an ARP cache file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn insert(&mut self, ip: Ipv4Address, mac: Mac) -> Option<Mac> {
        self.entries.insert(ip, mac)
    }

    pub fn lookup(&self, ip: Ipv4Address) -> Option<Mac> {
        self.entries.get(&ip).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(Ipv4Address, Mac)> for AddressTable {
    fn from_iter<T: IntoIterator<Item = (Ipv4Address, Mac)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl Display for AddressTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort();
        writeln!(f, "IP\t\tMAC")?;
        for (ip, mac) in entries {
            writeln!(f, "{ip}\t{mac}")?;
        }
        Ok(())
    }
}
