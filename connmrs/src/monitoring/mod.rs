//! Signal monitoring.
//!
//! Per-handle property change fan-out and the manager's signal pump.

pub(crate) mod manager;
pub(crate) mod property_bus;
