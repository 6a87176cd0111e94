//! Light controller and shared node state.
//!
//! ```text
//!  MotionLatch ─┐
//!  lux ─────────┼─▶ ┌──────────────┐ ──▶ LightPort
//!  AppCommand ──┘   │ LightService │ ──▶ EventSink
//!                   └──────────────┘
//! ```
//!
//! [`NodeState`] is the one place tasks exchange data. Every field has a
//! single writer task; readers only ever see whole values.

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, Ordering};

use log::{info, warn};

use crate::config::LightingConfig;
use crate::lighting::{BrightnessEngine, MotionLatch, level_to_percent};
use crate::sensors::{Climate, ConcentrationCell, PowerReading};

use super::commands::{AppCommand, CommandError};
use super::events::{AppEvent, TelemetryReport};
use super::ports::{EventSink, LightPort};

// ───────────────────────────────────────────────────────────────
// Shared node state
// ───────────────────────────────────────────────────────────────

/// f32 stored as its bit pattern.
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    const fn new(v: f32) -> Self {
        Self(AtomicU32::new(v.to_bits()))
    }

    const fn zero() -> Self {
        Self::new(0.0)
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::Relaxed);
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }
}

/// Lux assumed until the first light-sensor sample; bright enough that the
/// lamp stays off at boot.
pub const BOOT_AMBIENT_LUX: f32 = 500.0;

/// Latest readings and outputs, shared between tasks without locks.
pub struct NodeState {
    // Sensor task
    ambient_lux: AtomicF32,
    temperature_c: AtomicF32,
    humidity_pct: AtomicF32,
    battery_percent: AtomicU8,
    solar_mv: AtomicU32,
    // Light task
    level: AtomicU8,
    auto_mode: AtomicBool,
    // PM2.5 drain task
    pub pm25: ConcentrationCell,
    /// Control commands from the reporting tasks to the light task.
    commands: heapless::mpmc::Q8<AppCommand>,
}

impl Default for NodeState {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeState {
    pub const fn new() -> Self {
        Self {
            ambient_lux: AtomicF32::new(BOOT_AMBIENT_LUX),
            temperature_c: AtomicF32::zero(),
            humidity_pct: AtomicF32::zero(),
            battery_percent: AtomicU8::new(0),
            solar_mv: AtomicU32::new(0),
            level: AtomicU8::new(0),
            auto_mode: AtomicBool::new(true),
            pm25: ConcentrationCell::new(),
            commands: heapless::mpmc::Q8::new(),
        }
    }

    pub fn set_ambient_lux(&self, lux: f32) {
        self.ambient_lux.store(lux);
    }

    pub fn ambient_lux(&self) -> f32 {
        self.ambient_lux.load()
    }

    pub fn set_climate(&self, c: Climate) {
        self.temperature_c.store(c.temperature_c);
        self.humidity_pct.store(c.humidity_pct);
    }

    pub fn set_power(&self, p: PowerReading) {
        self.battery_percent.store(p.battery_percent, Ordering::Relaxed);
        self.solar_mv.store(p.solar_mv, Ordering::Relaxed);
    }

    fn set_output(&self, level: u8, auto_mode: bool) {
        self.level.store(level, Ordering::Relaxed);
        self.auto_mode.store(auto_mode, Ordering::Relaxed);
    }

    pub fn level(&self) -> u8 {
        self.level.load(Ordering::Relaxed)
    }

    pub fn auto_mode(&self) -> bool {
        self.auto_mode.load(Ordering::Relaxed)
    }

    /// Parse a control payload and queue it for the light task.
    pub fn submit_control(&self, payload: &[u8]) -> Result<AppCommand, CommandError> {
        let cmd = AppCommand::parse(payload)?;
        if self.commands.enqueue(cmd).is_err() {
            warn!("command queue full, dropping {cmd:?}");
        }
        Ok(cmd)
    }

    pub fn next_command(&self) -> Option<AppCommand> {
        self.commands.dequeue()
    }

    /// Assemble the data-topic body from the latest values.
    pub fn telemetry(&self) -> TelemetryReport {
        TelemetryReport {
            ambient_light: self.ambient_lux(),
            light_brightness: level_to_percent(self.level()),
            temperature: self.temperature_c.load(),
            humidity: self.humidity_pct.load(),
            pm25: self.pm25.latest(),
            battery_level: self.battery_percent.load(Ordering::Relaxed),
            solar_voltage: self.solar_mv.load(Ordering::Relaxed) as f32 / 1000.0,
            auto_mode: self.auto_mode(),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// LightService
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// Brightness engine drives the lamp.
    Auto,
    /// Fixed level from the last `set_brightness` command.
    Manual(u8),
}

/// Owns the brightness engine and the operating mode. Lives in the light task.
pub struct LightService {
    engine: BrightnessEngine,
    mode: LightMode,
    output: u8,
}

impl LightService {
    pub fn new(cfg: LightingConfig) -> Self {
        Self {
            engine: BrightnessEngine::new(cfg),
            mode: LightMode::Auto,
            output: 0,
        }
    }

    /// Run one light period: apply queued commands, compute the level,
    /// drive the lamp and publish the output to `state`.
    pub fn tick(
        &mut self,
        state: &NodeState,
        motion: &MotionLatch,
        now_ms: u32,
        light: &mut impl LightPort,
        sink: &mut impl EventSink,
    ) -> u8 {
        while let Some(cmd) = state.next_command() {
            self.handle_command(cmd, sink);
        }

        self.output = match self.mode {
            // Manual mode freezes the engine, motion expiry included.
            LightMode::Manual(level) => level,
            LightMode::Auto => self.engine.tick(state.ambient_lux(), motion, now_ms),
        };
        light.set_level(self.output);
        state.set_output(self.output, self.is_auto());
        self.output
    }

    pub fn handle_command(&mut self, cmd: AppCommand, sink: &mut impl EventSink) {
        let next = match cmd {
            AppCommand::SetBrightness { level, percent } => {
                info!("manual brightness {percent}% (level {level})");
                LightMode::Manual(level)
            }
            AppCommand::SetAutoMode(true) => LightMode::Auto,
            AppCommand::SetAutoMode(false) => match self.mode {
                LightMode::Auto => LightMode::Manual(self.output),
                manual => manual,
            },
        };
        if next != self.mode {
            self.mode = next;
            let level = match next {
                LightMode::Manual(level) => level,
                LightMode::Auto => self.engine.level(),
            };
            sink.emit(&AppEvent::ModeChanged {
                auto_mode: self.is_auto(),
                level,
            });
        }
    }

    pub fn mode(&self) -> LightMode {
        self.mode
    }

    pub fn is_auto(&self) -> bool {
        self.mode == LightMode::Auto
    }

    /// Level sent to the lamp on the last tick.
    pub fn output(&self) -> u8 {
        self.output
    }

    pub fn engine(&self) -> &BrightnessEngine {
        &self.engine
    }
}
