//! Pinwatch firmware library.
//!
//! Exposes the throttle engine, the node service and the adapters for
//! integration testing and external inspection. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod pins;
pub mod throttle;

// Adapters and drivers carry host simulation backends, so the crate
// builds and tests off-target.
pub mod adapters;
pub mod drivers;
