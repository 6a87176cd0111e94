//! Street light node firmware library.
//!
//! Exposes the pure-logic modules (brightness engine, PM2.5 decoder,
//! broker session manager) for integration testing. All ESP-IDF-specific
//! code is guarded by `#[cfg(target_os = "espidf")]` within each module
//! and has a host simulation alongside it.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod lighting;
pub mod pins;
pub mod sensors;
pub mod session;

pub mod adapters;
pub mod drivers;
