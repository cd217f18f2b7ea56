//! The static forwarding table of a router.

use crate::{
    config::{config_lines, route_line, LineError, LoadError},
    network::{Iface, IfaceId},
    protocols::ipv4::{Ipv4Address, Ipv4Mask, Ipv4Net},
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
    path::Path,
};

type Entry = (Ipv4Address, Ipv4Mask);

/// One static route.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RouteEntry {
    /// The destination network, host bits cleared.
    pub destination: Ipv4Address,
    pub mask: Ipv4Mask,
    /// `0.0.0.0` when the destination is directly reachable.
    pub gateway: Ipv4Address,
    pub iface: IfaceId,
    pub iface_name: String,
}

impl RouteEntry {
    pub fn net(&self) -> Ipv4Net {
        Ipv4Net::new(self.destination, self.mask)
    }
}

/// A set of static routes with longest prefix match lookups.
///
/// Routes are kept sorted by network, along with the set of masks in use.
/// The table does not change once loaded. A lookup tries each mask in use from longest to shortest,
/// so it costs one map lookup per distinct mask rather than one comparison
/// per route.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ForwardingTable {
    table: BTreeMap<Entry, RouteEntry>,
    masks: BTreeSet<Ipv4Mask>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a route table, resolving interface names against `ifaces`.
    pub fn parse(text: &str, ifaces: &[Iface]) -> Result<Self, LoadError> {
        let mut table = Self::new();
        for (line, text) in config_lines(text) {
            let route = parse_route(text, ifaces).map_err(|reason| LoadError::Line { line, reason })?;
            table.add(route);
        }
        Ok(table)
    }

    /// Reads and parses a route table file.
    pub fn load(path: impl AsRef<Path>, ifaces: &[Iface]) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(&text, ifaces)
    }

    /// Finds the route with the longest mask that covers `address`.
    pub fn lookup(&self, address: Ipv4Address) -> Option<&RouteEntry> {
        self.masks
            .iter()
            .rev()
            .find_map(|&mask| self.table.get(&(mask.apply(address), mask)))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.table.values()
    }

    /// Adds a route, replacing any earlier route to the same network.
    fn add(&mut self, mut route: RouteEntry) {
        route.destination = route.mask.apply(route.destination);
        self.masks.insert(route.mask);
        self.table.insert((route.destination, route.mask), route);
    }
}

fn parse_route(text: &str, ifaces: &[Iface]) -> Result<RouteEntry, LineError> {
    let route = route_line(text)?;
    let mask = Ipv4Mask::try_from(route.mask).map_err(LineError::Mask)?;
    let iface = ifaces
        .iter()
        .position(|iface| iface.name == route.iface)
        .ok_or_else(|| LineError::UnknownIface(route.iface.to_string()))?;
    Ok(RouteEntry {
        destination: route.destination,
        mask,
        gateway: route.gateway,
        iface: iface as IfaceId,
        iface_name: route.iface.to_string(),
    })
}

impl Display for ForwardingTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return writeln!(f, " WARNING: route table empty");
        }
        writeln!(f, "Destination\tGateway\t\tMask\t\tIface")?;
        for route in self.iter() {
            writeln!(
                f,
                "{}\t{}\t\t{}\t{}",
                route.destination, route.gateway, route.mask, route.iface_name
            )?;
        }
        Ok(())
    }
}
