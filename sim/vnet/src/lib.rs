//! Simulated network devices: an IPv4 router with static routing or RIPv2,
//! and a self-learning Ethernet switch.
//!
//! The devices are built on [`vnet_core`], which supplies the packet codecs,
//! the static tables and the in-memory networks they run on.

pub mod applications;
pub mod cli;
pub mod simulations;
