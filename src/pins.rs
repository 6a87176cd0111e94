//! GPIO / peripheral pin assignments for the two street-light board variants.
//!
//! The variant is chosen once at boot from [`NodeConfig::board`](crate::config::NodeConfig)
//! and the resulting [`BoardPins`] is handed to the hardware init code.
//! Nothing else in the firmware branches on the board.

use serde::{Deserialize, Serialize};

/// Hardware variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Board {
    /// ESP32-S3 DevKitC carrier.
    #[default]
    DevKit,
    /// Compact core board used in the pole enclosure.
    CoreBoard,
}

/// Pin map for one board variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoardPins {
    /// PIR output, rising edge = motion.
    pub motion_gpio: i32,
    /// KEY1: manual motion trigger (active low).
    pub key_trigger_gpio: i32,
    /// KEY2: manual motion clear (active low).
    pub key_clear_gpio: i32,

    // --- I2C bus: BH1750 + AHT20 ---
    pub i2c_sda_gpio: i32,
    pub i2c_scl_gpio: i32,

    // --- PM2.5 sensor UART ---
    pub pm25_rx_gpio: i32,
    pub pm25_tx_gpio: i32,

    /// LEDC PWM output driving the lamp.
    pub light_pwm_gpio: i32,

    // --- ADC1 ---
    pub battery_adc_gpio: i32,
    pub solar_adc_gpio: i32,
    /// Divider numerator for `(raw * k) >> 12` millivolt conversion.
    pub solar_divider_k: u32,
}

/// Battery divider numerator, the same on both boards.
pub const BATTERY_DIVIDER_K: u32 = 6_600;

/// PM2.5 sensor line settings (8N1).
pub const PM25_BAUD: u32 = 9_600;

/// LEDC resolution. 8 bits maps one-to-one onto brightness levels.
pub const PWM_RESOLUTION_BITS: u32 = 8;
pub const LIGHT_PWM_FREQ_HZ: u32 = 5_000;

pub const I2C_FREQ_HZ: u32 = 100_000;

impl BoardPins {
    pub const fn for_board(board: Board) -> Self {
        match board {
            Board::DevKit => Self {
                motion_gpio: 16,
                key_trigger_gpio: 3,
                key_clear_gpio: 4,
                i2c_sda_gpio: 1,
                i2c_scl_gpio: 2,
                pm25_rx_gpio: 18,
                pm25_tx_gpio: 17,
                light_pwm_gpio: 48,
                battery_adc_gpio: 9,
                solar_adc_gpio: 8,
                solar_divider_k: 6_600,
            },
            Board::CoreBoard => Self {
                motion_gpio: 15,
                key_trigger_gpio: 1,
                key_clear_gpio: 2,
                i2c_sda_gpio: 8,
                i2c_scl_gpio: 9,
                pm25_rx_gpio: 18,
                pm25_tx_gpio: 17,
                light_pwm_gpio: 48,
                battery_adc_gpio: 10,
                solar_adc_gpio: 7,
                solar_divider_k: 13_300,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_differ_only_where_hardware_differs() {
        let a = BoardPins::for_board(Board::DevKit);
        let b = BoardPins::for_board(Board::CoreBoard);
        assert_ne!(a.motion_gpio, b.motion_gpio);
        assert_eq!(a.pm25_rx_gpio, b.pm25_rx_gpio);
        assert_eq!(b.solar_divider_k, 13_300);
    }

    #[test]
    fn no_pin_is_assigned_twice() {
        for board in [Board::DevKit, Board::CoreBoard] {
            let p = BoardPins::for_board(board);
            let mut pins = [
                p.motion_gpio,
                p.key_trigger_gpio,
                p.key_clear_gpio,
                p.i2c_sda_gpio,
                p.i2c_scl_gpio,
                p.pm25_rx_gpio,
                p.pm25_tx_gpio,
                p.light_pwm_gpio,
                p.battery_adc_gpio,
                p.solar_adc_gpio,
            ];
            pins.sort_unstable();
            assert!(pins.windows(2).all(|w| w[0] != w[1]), "{board:?}");
        }
    }
}
