//! Sensor subsystem: I2C environment sensors, power rail monitoring, and the
//! PM2.5 serial decoder.
//!
//! Each driver is owned by exactly one periodic task. Results are published
//! into [`NodeState`](crate::app::service::NodeState) for the reporting tasks.

pub mod ambient;
pub mod battery;
pub mod pm25;

pub use ambient::{Aht20, Bh1750, Climate};
pub use battery::{PowerMonitor, PowerReading};
pub use pm25::{ConcentrationCell, FrameDecoder, Pm25Monitor, Pm25Reading};
