//! Wrapper functions for logging device events.
//!
//! Each function corresponds to one kind of decision a device makes and logs
//! under a fixed target, so a subscriber can filter by device concern:
//! `ROUTER` for the forwarding pipeline, `RIP` for the routing protocol, and
//! `SWITCH` for the learning switch. None of the device logic depends on
//! these events being recorded.

use crate::{
    network::{IfaceId, Mac, SendError},
    protocols::ipv4::{Ipv4Address, Ipv4Net},
};
use std::fmt::{self, Display};
use tracing::{event, Level};

/// Why the router discarded a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// The Ethernet payload is not IPv4.
    NotIpv4,
    /// The frame could not be parsed.
    Malformed,
    /// The IPv4 header checksum does not match the header.
    BadChecksum,
    /// The TTL ran out.
    TtlExpired,
    /// The datagram is addressed to the router itself.
    ForRouter,
    /// No route covers the destination.
    NoRoute,
    /// The destination has no entry in the ARP cache.
    NoArpEntry,
    /// A UDP datagram to the RIP port that is not a valid RIP message.
    MalformedRip,
}

impl Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            DropReason::NotIpv4 => "not IPv4",
            DropReason::Malformed => "malformed packet",
            DropReason::BadChecksum => "bad checksum",
            DropReason::TtlExpired => "TTL expired",
            DropReason::ForRouter => "addressed to the router",
            DropReason::NoRoute => "no route",
            DropReason::NoArpEntry => "no ARP entry",
            DropReason::MalformedRip => "malformed RIP message",
        };
        f.write_str(text)
    }
}

/// Logs a frame dropped by the forwarding pipeline.
pub fn drop_event(ingress: IfaceId, reason: DropReason) {
    event!(target: "ROUTER", Level::INFO, ingress, reason = %reason, "dropped packet");
}

/// Logs a datagram forwarded by the router.
pub fn forward_event(
    ingress: IfaceId,
    egress: IfaceId,
    source: Ipv4Address,
    destination: Ipv4Address,
    next_mac: Mac,
) {
    event!(
        target: "ROUTER",
        Level::INFO,
        ingress,
        egress,
        source = %source,
        destination = %destination,
        next_mac = %next_mac,
        "forwarded packet"
    );
}

/// Logs a change to a row of the RIP table.
pub fn route_change_event(network: Ipv4Net, next_hop: Ipv4Address, metric: u32, cause: &str) {
    event!(
        target: "RIP",
        Level::INFO,
        network = %network,
        next_hop = %next_hop,
        metric,
        cause,
        "route changed"
    );
}

/// Logs an outgoing RIP message sent to every neighbor.
pub fn rip_broadcast_event(kind: &str, entries: usize) {
    event!(target: "RIP", Level::DEBUG, kind, entries, "broadcasting table");
}

/// Logs a RIP message that was received but not acted on.
pub fn rip_ignored_event(ingress: IfaceId, source: Ipv4Address, reason: &str) {
    event!(target: "RIP", Level::DEBUG, ingress, source = %source, reason, "ignored RIP message");
}

/// Logs the switch binding a MAC address to an interface.
pub fn mac_learn_event(mac: Mac, iface: IfaceId) {
    event!(target: "SWITCH", Level::DEBUG, mac = %mac, iface, "learned address");
}

/// Logs a binding aged out of the switch table.
pub fn mac_expire_event(mac: Mac, iface: IfaceId) {
    event!(target: "SWITCH", Level::DEBUG, mac = %mac, iface, "binding expired");
}

/// Logs the switch's forwarding decision for one frame. `egress` is `None`
/// when the frame was flooded.
pub fn switch_event(destination: Mac, ingress: IfaceId, egress: Option<IfaceId>) {
    match egress {
        Some(egress) => event!(
            target: "SWITCH",
            Level::INFO,
            destination = %destination,
            ingress,
            egress,
            "forwarded frame"
        ),
        None => event!(
            target: "SWITCH",
            Level::INFO,
            destination = %destination,
            ingress,
            "flooded frame"
        ),
    }
}

/// Logs a frame the transport refused.
pub fn send_failure_event(egress: IfaceId, error: SendError) {
    event!(Level::WARN, egress, error = %error, "failed to send frame");
}
