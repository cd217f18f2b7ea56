//! Prebuilt simulations that exercise each device end to end.
//!
//! Every simulation wires its machines together over in-memory segments,
//! pushes a little traffic through, and checks that it arrives as expected.

use std::{path::PathBuf, time::Duration};
use thiserror::Error as ThisError;
use vnet_core::{internet::SimError, LoadError};

use crate::applications::StationError;

mod static_router;
pub use static_router::static_router;

mod rip_chain;
pub use rip_chain::rip_chain;

mod learning_switch;
pub use learning_switch::learning_switch;

/// Settings shared by the simulations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimulationOptions {
    /// How long the traffic may take before the simulation gives up.
    pub duration: Duration,
    /// Replaces the static router's built-in route table.
    pub route_table: Option<PathBuf>,
    /// Replaces the static router's built-in ARP cache.
    pub arp_cache: Option<PathBuf>,
}

impl Default for SimulationOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(5),
            route_table: None,
            arp_cache: None,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum SimulationError {
    #[error("{0}")]
    Load(#[from] LoadError),
    #[error("{0}")]
    Sim(#[from] SimError),
    #[error("{0}")]
    Station(#[from] StationError),
    #[error("The simulation did not finish in time")]
    Timeout,
    #[error("Unexpected outcome: {0}")]
    Unexpected(String),
}
