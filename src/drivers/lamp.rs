//! Street lamp LED driver.
//!
//! 8-bit LEDC duty maps one-to-one onto brightness levels. The driver
//! skips redundant register writes, since the light task re-asserts the
//! level every 50 ms tick.
//!
//! On ESP-IDF it writes the LEDC channel configured by `hw_init`; on host
//! it only tracks the level.

use crate::app::ports::LightPort;
use crate::drivers::hw_init;

#[derive(Debug)]
pub struct LampDriver {
    channel: u32,
    level: u8,
    writes: u32,
}

impl Default for LampDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl LampDriver {
    pub fn new() -> Self {
        hw_init::ledc_set(hw_init::LEDC_CH_LIGHT, 0);
        Self {
            channel: hw_init::LEDC_CH_LIGHT,
            level: 0,
            writes: 0,
        }
    }

    pub fn level(&self) -> u8 {
        self.level
    }

    /// Duty register writes since boot.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    pub fn off(&mut self) {
        self.set_level(0);
    }
}

impl LightPort for LampDriver {
    fn set_level(&mut self, level: u8) {
        if level == self.level {
            return;
        }
        hw_init::ledc_set(self.channel, level);
        self.level = level;
        self.writes += 1;
    }
}
