//! Power sampling adapter: ADC1 battery and solar channels.
//!
//! Bridges the raw `hw_init::adc1_read` calls to the pure conversion in
//! [`PowerMonitor`]. The channel numbers come from the board pin map.

use log::warn;

use crate::drivers::hw_init::{self, HwInitError};
use crate::pins::{BATTERY_DIVIDER_K, BoardPins};
use crate::sensors::{PowerMonitor, PowerReading};

pub struct PowerAdapter {
    monitor: PowerMonitor,
    battery_ch: u32,
    solar_ch: u32,
    last: Option<PowerReading>,
}

impl PowerAdapter {
    pub fn new(pins: &BoardPins) -> Result<Self, HwInitError> {
        let (battery_ch, solar_ch) = hw_init::power_channels(pins)?;
        Ok(Self {
            monitor: PowerMonitor::new(BATTERY_DIVIDER_K, pins.solar_divider_k),
            battery_ch,
            solar_ch,
            last: None,
        })
    }

    /// Sample both channels. A failed read keeps the previous reading.
    pub fn sample(&mut self) -> Option<PowerReading> {
        match (
            hw_init::adc1_read(self.battery_ch),
            hw_init::adc1_read(self.solar_ch),
        ) {
            (Some(battery), Some(solar)) => {
                self.last = Some(self.monitor.convert(battery, solar));
            }
            _ => warn!("PowerAdapter: ADC read failed, keeping last reading"),
        }
        self.last
    }
}
