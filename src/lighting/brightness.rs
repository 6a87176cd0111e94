//! Motion-aware brightness animation engine.
//!
//! One [`BrightnessEngine::tick`] per 50 ms period:
//!
//! ```text
//!  expire motion ─▶ base level(lux) ─▶ target ─▶ retarget ramp ─▶ advance one step
//! ```
//!
//! Rising ramps follow `(s/N)²` (slow start), falling ramps follow
//! `1-(1-s/N)²` (fast start). A ramp that reaches its step budget snaps to
//! the target; the following tick settles the phase to `Idle`.

use log::debug;

use crate::config::LightingConfig;

use super::motion::MotionLatch;

/// Direction of the ramp in progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RampPhase {
    Idle,
    Rising,
    Falling,
}

/// Copy of the engine's internal state, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationState {
    pub current: u8,
    pub target: u8,
    pub phase: RampPhase,
    pub step: u16,
    pub ramp_start: u8,
}

impl AnimationState {
    const OFF: Self = Self {
        current: 0,
        target: 0,
        phase: RampPhase::Idle,
        step: 0,
        ramp_start: 0,
    };
}

/// Map an ambient reading onto one of the four base levels.
///
/// Thresholds are inclusive lower bounds. NaN compares false everywhere and
/// lands in the darkest tier.
pub fn base_level(cfg: &LightingConfig, lux: f32) -> u8 {
    if lux >= cfg.lux_off_threshold {
        0
    } else if lux >= cfg.lux_dim_threshold {
        cfg.level_dim
    } else if lux >= cfg.lux_mid_threshold {
        cfg.level_mid
    } else {
        cfg.level_dark
    }
}

pub struct BrightnessEngine {
    cfg: LightingConfig,
    state: AnimationState,
}

impl BrightnessEngine {
    /// Engine starting dark and idle.
    pub fn new(cfg: LightingConfig) -> Self {
        Self {
            cfg,
            state: AnimationState::OFF,
        }
    }

    /// Engine idling at `level`, e.g. when leaving manual mode.
    pub fn starting_at(cfg: LightingConfig, level: u8) -> Self {
        Self {
            cfg,
            state: AnimationState {
                current: level,
                target: level,
                ramp_start: level,
                ..AnimationState::OFF
            },
        }
    }

    pub fn level(&self) -> u8 {
        self.state.current
    }

    pub fn snapshot(&self) -> AnimationState {
        self.state
    }

    /// Advance the animation by one period and return the output level.
    ///
    /// Clears a stale motion latch as a side effect. Total over every input;
    /// the returned level is always in `0..=255`.
    pub fn tick(&mut self, ambient_lux: f32, motion: &MotionLatch, now_ms: u32) -> u8 {
        if motion.expire_if_stale(now_ms, self.cfg.motion_timeout_ms) {
            debug!("motion latch expired at {now_ms} ms");
        }

        let base = base_level(&self.cfg, ambient_lux);
        let target = if base > 0 && motion.is_active() {
            self.cfg.level_motion
        } else {
            base
        };

        self.retarget(target);
        self.advance();
        self.state.current
    }

    fn retarget(&mut self, target: u8) {
        let s = &mut self.state;
        s.target = target;

        let wanted = if target > s.current {
            RampPhase::Rising
        } else if target < s.current {
            RampPhase::Falling
        } else {
            return;
        };

        // Same direction keeps the running ramp, even one past its last
        // step: the next advance snaps it onto the new target.
        if s.phase != wanted {
            debug!(
                "ramp {:?} -> {:?} from {} to {}",
                s.phase, wanted, s.current, target
            );
            s.phase = wanted;
            s.step = 0;
            s.ramp_start = s.current;
        }
    }

    fn advance(&mut self) {
        let s = &mut self.state;
        if s.phase == RampPhase::Idle {
            return;
        }
        if s.current == s.target {
            s.phase = RampPhase::Idle;
            return;
        }

        s.step = s.step.saturating_add(1);
        let start = i32::from(s.ramp_start);
        let target = i32::from(s.target);

        let next = match s.phase {
            RampPhase::Rising if s.step <= self.cfg.rise_steps => {
                let x = f32::from(s.step) / f32::from(self.cfg.rise_steps);
                let progress = x * x;
                start + ((target - start) as f32 * progress).round() as i32
            }
            RampPhase::Falling if s.step <= self.cfg.fall_steps => {
                let x = 1.0 - f32::from(s.step) / f32::from(self.cfg.fall_steps);
                let progress = 1.0 - x * x;
                start - ((start - target) as f32 * progress).round() as i32
            }
            _ => {
                s.phase = RampPhase::Idle;
                target
            }
        };

        s.current = next.clamp(0, 255) as u8;
    }
}
