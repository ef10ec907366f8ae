//! Peripheral initialisation helpers.

pub mod hw_init;
