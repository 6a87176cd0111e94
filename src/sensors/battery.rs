//! Battery and solar panel voltage monitoring over ADC1.
//!
//! Both rails sit behind resistive dividers. A 12-bit reading converts to
//! millivolts with `(raw * k) >> 12`, where `k` is the divider ratio times
//! the ADC full-scale voltage.

/// Raw 12-bit ADC code to rail millivolts.
pub const fn raw_to_millivolts(raw: u16, divider_k: u32) -> u32 {
    ((raw as u32 & 0x0FFF) * divider_k) >> 12
}

/// Single-cell Li-ion state of charge from resting voltage.
///
/// Piecewise-linear approximation of the discharge curve; the knee points
/// are 4000/3800/3700/3600/3300 mV at 85/60/40/20/5 %.
pub const fn battery_percent(mv: u32) -> u8 {
    let pct = if mv >= 4_200 {
        100
    } else if mv >= 4_000 {
        85 + (mv - 4_000) * 15 / 200
    } else if mv >= 3_800 {
        60 + (mv - 3_800) * 25 / 200
    } else if mv >= 3_700 {
        40 + (mv - 3_700) * 20 / 100
    } else if mv >= 3_600 {
        20 + (mv - 3_600) * 20 / 100
    } else if mv >= 3_300 {
        5 + (mv - 3_300) * 15 / 300
    } else if mv > 3_000 {
        (mv - 3_000) * 5 / 300
    } else {
        0
    };
    pct as u8
}

/// Latest battery/solar figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerReading {
    pub battery_mv: u32,
    pub battery_percent: u8,
    pub solar_mv: u32,
}

impl PowerReading {
    /// Solar voltage in volts, as reported in telemetry.
    pub fn solar_volts(&self) -> f32 {
        self.solar_mv as f32 / 1000.0
    }
}

/// Converts raw ADC codes for both rails.
#[derive(Debug, Clone, Copy)]
pub struct PowerMonitor {
    battery_k: u32,
    solar_k: u32,
}

impl PowerMonitor {
    pub const fn new(battery_k: u32, solar_k: u32) -> Self {
        Self { battery_k, solar_k }
    }

    pub fn convert(&self, battery_raw: u16, solar_raw: u16) -> PowerReading {
        let battery_mv = raw_to_millivolts(battery_raw, self.battery_k);
        PowerReading {
            battery_mv,
            battery_percent: battery_percent(battery_mv),
            solar_mv: raw_to_millivolts(solar_raw, self.solar_k),
        }
    }
}
