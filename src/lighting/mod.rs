//! Lamp output logic: the ISR-fed motion latch and the brightness engine
//! that turns ambient light plus motion into a smoothed PWM level.

pub mod brightness;
pub mod motion;

pub use brightness::{AnimationState, BrightnessEngine, RampPhase, base_level};
pub use motion::{MotionInput, MotionLatch};

/// Convert a 0..=255 level into the 0..=100 percent reported in telemetry.
/// Truncates, so 254 reports 99.
pub const fn level_to_percent(level: u8) -> u8 {
    ((level as u16 * 100) / 255) as u8
}

/// Convert a 0..=100 command percentage into a level. `None` above 100.
pub const fn percent_to_level(percent: u8) -> Option<u8> {
    if percent > 100 {
        return None;
    }
    Some(((percent as u16 * 255) / 100) as u8)
}
