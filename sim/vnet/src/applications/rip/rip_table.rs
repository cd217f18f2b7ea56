use rustc_hash::FxHashMap;
use std::{
    cmp::min,
    fmt::{self, Display},
    time::Duration,
};
use tokio::time::Instant;
use vnet_core::{
    logging::route_change_event,
    network::IfaceId,
    protocols::{
        ipv4::{Ipv4Address, Ipv4Net},
        rip::{RipEntry, ADDRESS_FAMILY_IPV4, INFINITY},
    },
    Iface,
};

/// The most networks a table will hold.
pub const TABLE_CAPACITY: usize = 1024;

/// How long a learned route stays usable without being refreshed.
pub const ROUTE_TIMEOUT: Duration = Duration::from_secs(30);

/// One row of the RIP table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RipRoute {
    pub net: Ipv4Net,
    /// `0.0.0.0` for the router's own networks.
    pub next_hop: Ipv4Address,
    pub metric: u32,
    pub last_update: Instant,
    /// The interface the route was learned on, or the interface of a
    /// directly connected network.
    pub iface: IfaceId,
}

impl RipRoute {
    /// Whether this is one of the router's own networks.
    pub fn is_direct(&self) -> bool {
        self.next_hop.is_unspecified()
    }

    pub fn is_reachable(&self) -> bool {
        self.metric < INFINITY
    }
}

/// What applying an advertised route did to the table, ordered by how much
/// it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Update {
    /// The table is untouched.
    Ignored,
    /// The route's timer was reset but nothing else changed.
    Refreshed,
    /// A route was added or its metric or next hop changed.
    Changed,
}

/// The distance vector table of a RIP router, one row per network.
///
/// Rows are keyed by network address alone. An advertisement for a known
/// network with a different mask updates that network's row rather than
/// adding another. Rows are kept in the order their networks were first seen. Rows are never
/// removed: an unreachable network stays with a metric of
/// [`INFINITY`] so that its loss can be advertised.
#[derive(Debug, Clone)]
pub struct RipTable {
    routes: Vec<RipRoute>,
    index: FxHashMap<Ipv4Address, usize>,
    capacity: usize,
}

impl RipTable {
    pub fn new() -> Self {
        Self::with_capacity(TABLE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            routes: Vec::new(),
            index: Default::default(),
            capacity,
        }
    }

    /// Adds the network of a local interface with a metric of zero.
    pub fn add_direct(&mut self, iface: &Iface, id: IfaceId, now: Instant) {
        let route = RipRoute {
            net: iface.net(),
            next_hop: Ipv4Address::CURRENT_NETWORK,
            metric: 0,
            last_update: now,
            iface: id,
        };
        match self.index.get(&route.net.id()) {
            Some(&i) => self.routes[i] = route,
            None => {
                self.insert(route);
            }
        }
    }

    /// Applies one advertised entry heard from `neighbor` on `iface`.
    pub fn apply(
        &mut self,
        entry: &RipEntry,
        neighbor: Ipv4Address,
        iface: IfaceId,
        now: Instant,
    ) -> Update {
        if entry.address_family != ADDRESS_FAMILY_IPV4 || neighbor.is_unspecified() {
            return Update::Ignored;
        }
        let Some(net) = entry.net() else {
            return Update::Ignored;
        };
        let metric = min(entry.metric.saturating_add(1), INFINITY);

        let Some(&i) = self.index.get(&net.id()) else {
            if metric >= INFINITY {
                return Update::Ignored;
            }
            let route = RipRoute {
                net,
                next_hop: neighbor,
                metric,
                last_update: now,
                iface,
            };
            return match self.insert(route) {
                true => {
                    route_change_event(net, neighbor, metric, "learned");
                    Update::Changed
                }
                false => Update::Ignored,
            };
        };

        let route = &mut self.routes[i];
        if route.is_direct() {
            Update::Ignored
        } else if route.next_hop == neighbor {
            route.last_update = now;
            route.iface = iface;
            if route.metric == metric && route.net == net {
                Update::Refreshed
            } else {
                route.net = net;
                route.metric = metric;
                route_change_event(net, neighbor, metric, "metric changed");
                Update::Changed
            }
        } else if metric < route.metric {
            route.net = net;
            route.next_hop = neighbor;
            route.metric = metric;
            route.last_update = now;
            route.iface = iface;
            route_change_event(net, neighbor, metric, "better path");
            Update::Changed
        } else {
            Update::Ignored
        }
    }

    /// Poisons every learned route that has not been refreshed within
    /// [`ROUTE_TIMEOUT`]. Returns the networks poisoned by this call. A route
    /// that is already unreachable is not poisoned again.
    pub fn expire(&mut self, now: Instant) -> Vec<Ipv4Net> {
        let mut poisoned = vec![];
        for route in &mut self.routes {
            if route.is_direct() || !route.is_reachable() {
                continue;
            }
            if now.saturating_duration_since(route.last_update) > ROUTE_TIMEOUT {
                route.metric = INFINITY;
                route_change_event(route.net, route.next_hop, INFINITY, "expired");
                poisoned.push(route.net);
            }
        }
        poisoned
    }

    /// Finds the route for `destination` by comparing, for every row,
    /// `destination & mask` with the row's network a byte at a time. The row
    /// sharing the most leading bytes wins, the earliest row on a tie. No
    /// route is returned when nothing shares a leading byte or the winner is
    /// unreachable.
    pub fn resolve(&self, destination: Ipv4Address) -> Option<&RipRoute> {
        let mut best: Option<(&RipRoute, usize)> = None;
        for route in &self.routes {
            let masked = route.net.mask().apply(destination).to_bytes();
            let network = route.net.id().to_bytes();
            let length = masked
                .iter()
                .zip(network.iter())
                .take_while(|(a, b)| a == b)
                .count();
            if length > best.map_or(0, |(_, best_length)| best_length) {
                best = Some((route, length));
            }
        }
        best.map(|(route, _)| route).filter(|route| route.is_reachable())
    }

    /// The table as RIP entries, ready to advertise.
    pub fn entries(&self) -> Vec<RipEntry> {
        self.routes
            .iter()
            .map(|route| RipEntry::new(route.net, Ipv4Address::CURRENT_NETWORK, route.metric))
            .collect()
    }

    /// The row for the network `net` names, whatever mask the row has.
    pub fn get(&self, net: Ipv4Net) -> Option<&RipRoute> {
        self.index.get(&net.id()).map(|&i| &self.routes[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &RipRoute> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    fn insert(&mut self, route: RipRoute) -> bool {
        if self.routes.len() >= self.capacity {
            return false;
        }
        self.index.insert(route.net.id(), self.routes.len());
        self.routes.push(route);
        true
    }
}

impl Default for RipTable {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for RipTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Network\t\tNext hop\tMetric\tIface")?;
        for route in &self.routes {
            writeln!(
                f,
                "{}\t{}\t\t{}\t{}",
                route.net, route.next_hop, route.metric, route.iface
            )?;
        }
        Ok(())
    }
}
