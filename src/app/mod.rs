//! Application core: light controller, command parsing and wire bodies.
//!
//! All interaction with hardware and the network happens through the
//! **port traits** in [`ports`], so this layer runs on the host in tests.

pub mod commands;
pub mod events;
pub mod ports;
pub mod report;
pub mod service;
