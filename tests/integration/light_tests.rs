//! Light task behaviour: motion, ambient light and control commands
//! flowing through `LightService` into a mock lamp.

use streetlight::app::events::AppEvent;
use streetlight::app::service::{LightMode, LightService, NodeState};
use streetlight::config::LightingConfig;
use streetlight::lighting::{MotionInput, MotionLatch, RampPhase};

use crate::mock_hw::{MockLamp, RecordingSink};

struct Rig {
    state: NodeState,
    motion: MotionLatch,
    service: LightService,
    lamp: MockLamp,
    sink: RecordingSink,
    now: u32,
}

impl Rig {
    fn new(lux: f32) -> Self {
        let state = NodeState::new();
        state.set_ambient_lux(lux);
        Self {
            state,
            motion: MotionLatch::new(),
            service: LightService::new(LightingConfig::default()),
            lamp: MockLamp::default(),
            sink: RecordingSink::default(),
            now: 0,
        }
    }

    fn run(&mut self, ticks: u32) -> u8 {
        for _ in 0..ticks {
            self.now += 50;
            self.service.tick(
                &self.state,
                &self.motion,
                self.now,
                &mut self.lamp,
                &mut self.sink,
            );
        }
        self.lamp.last()
    }
}

#[test]
fn dark_street_settles_at_dark_level() {
    let mut rig = Rig::new(20.0);
    assert_eq!(rig.run(41), 110);
    assert_eq!(rig.service.engine().snapshot().phase, RampPhase::Idle);
    assert_eq!(rig.state.level(), 110);
}

#[test]
fn motion_at_night_goes_full_then_times_out() {
    let mut rig = Rig::new(150.0);
    assert_eq!(rig.run(41), 80);

    rig.motion.apply(MotionInput::Motion, rig.now);
    assert_eq!(rig.run(41), 255);

    // Still latched 5000 ms after the trigger, released on the next tick.
    let armed_at = rig.motion.last_trigger_ms();
    rig.run((armed_at + 5_000 - rig.now) / 50);
    assert!(rig.motion.is_active());
    rig.run(1);
    assert!(!rig.motion.is_active());
    assert_eq!(rig.service.engine().snapshot().target, 80);

    assert_eq!(rig.run(60), 80);
}

#[test]
fn manual_clear_key_starts_fall() {
    let mut rig = Rig::new(0.0);
    rig.motion.apply(MotionInput::ManualTrigger, 0);
    assert_eq!(rig.run(41), 255);
    rig.motion.apply(MotionInput::ManualClear, rig.now);
    let first = rig.run(1);
    assert!(first < 255 && first > 110, "first fall step {first}");
    assert_eq!(rig.run(60), 110);
}

#[test]
fn motion_in_daylight_keeps_lamp_off() {
    let mut rig = Rig::new(800.0);
    rig.motion.apply(MotionInput::Motion, 0);
    assert_eq!(rig.run(20), 0);
    assert!(rig.lamp.levels.iter().all(|&l| l == 0));
}

#[test]
fn remote_brightness_then_back_to_auto() {
    let mut rig = Rig::new(50.0);
    rig.run(41);

    rig.state
        .submit_control(br#"{"command":"set_brightness","brightness":50}"#)
        .unwrap();
    assert_eq!(rig.run(1), 127);
    assert_eq!(rig.service.mode(), LightMode::Manual(127));
    let report = rig.state.telemetry();
    assert_eq!(report.light_brightness, 49);
    assert!(!report.auto_mode);

    // Motion is ignored while manual.
    rig.motion.apply(MotionInput::Motion, rig.now);
    assert_eq!(rig.run(10), 127);

    rig.state
        .submit_control(br#"{"command":"set_auto_mode","auto_mode":true}"#)
        .unwrap();
    rig.run(1);
    assert!(rig.state.auto_mode());
    // The engine resumes from where it stopped and now ramps toward motion.
    assert_eq!(rig.service.engine().snapshot().target, 255);
    assert_eq!(rig.run(41), 255);

    let modes: Vec<bool> = rig
        .sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ModeChanged { auto_mode, .. } => Some(*auto_mode),
            _ => None,
        })
        .collect();
    assert_eq!(modes, [false, true]);
}
