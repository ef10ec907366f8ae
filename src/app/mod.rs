//! Application core — pure domain logic, zero I/O.
//!
//! Connection supervision and the throttle loop of the sensor node.
//! All interaction with hardware happens through **port traits** defined
//! in [`ports`], keeping this layer fully testable without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
