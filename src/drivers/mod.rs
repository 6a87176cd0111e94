//! Lamp driver, hardware initialisation and task helpers.

pub mod hw_init;
pub mod lamp;
pub mod task_pin;
pub mod watchdog;
