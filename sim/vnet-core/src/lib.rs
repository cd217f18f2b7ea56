//! Foundations for simulated network devices.
//!
//! This crate contains everything a router or a switch needs besides its own
//! forwarding logic: addresses, the packet codecs, the static tables a router
//! is configured with, and an in-memory network to run devices on.
//!
//! # Organization
//! - [`protocols`] parses and builds Ethernet, IPv4, UDP and RIPv2 headers
//! - [`ForwardingTable`] and [`AddressTable`] hold a router's static
//!   configuration and load it from text files
//! - [`Device`] is implemented by packet processing devices, which send
//!   through a [`Transport`]
//! - [`Network`], [`Machine`] and [`Sim`](internet::Sim) wire devices together
//!   and run them
//!
//! # Device structure
//!
//! A device sees one frame at a time through [`Device::handle_packet`],
//! labelled with the interface it arrived on, and answers by sending frames
//! through its transport. Anything a device does outside of frame handling,
//! such as periodic routing updates, is spawned from [`Device::start`] and
//! must stop when its [`Shutdown`] fires.

use dashmap::DashMap;
use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub mod logging;
pub mod protocols;

pub mod config;
pub use config::LoadError;

pub mod network;
pub use network::{Iface, Mac, Network};

mod ip_table;
pub use ip_table::{ForwardingTable, RouteEntry};

mod arp_table;
pub use arp_table::AddressTable;

pub mod device;
pub use device::{Device, Transport};

mod machine;
pub use machine::{ifaces, Machine, Nic};

pub mod internet;

pub mod shutdown;
pub use shutdown::Shutdown;

/// A [`DashMap`] using the fast, non-cryptographic hasher from `rustc-hash`.
pub type FxDashMap<K, V> = DashMap<K, V, BuildHasherDefault<FxHasher>>;
