//! Transport Resilience Loop: a reconnector and a stall watchdog.
//!
//! The two loops are independent. The watchdog only ever disconnects; the
//! reconnector notices the dropped connection on its next tick and rebuilds
//! the client and its subscriptions.

pub mod reconnector;
pub mod watchdog;

pub use reconnector::Reconnector;
pub use watchdog::TransportWatchdog;
