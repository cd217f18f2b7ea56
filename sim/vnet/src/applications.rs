//! The devices that run on a simulated network, and the tools to drive them.

pub mod rip;
pub use rip::RipEngine;

mod router;
pub use router::{Router, Routing, Verdict};

mod switch;
pub use switch::{Forwarding, MacBinding, Switch, BINDING_TIMEOUT};

mod station;
pub use station::{Datagram, Inbox, Station, StationError};

mod capture;
pub use capture::Capture;
