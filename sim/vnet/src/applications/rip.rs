//! Dynamic routing with RIPv2.

mod rip_table;
pub use rip_table::{RipRoute, RipTable, Update, ROUTE_TIMEOUT, TABLE_CAPACITY};

mod rip_engine;
pub use rip_engine::{RipEngine, BROADCAST_INTERVAL, TICK};
