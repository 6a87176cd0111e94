//! Property tests for the brightness engine and the PM2.5 decoder.
//!
//! Runs on host (x86_64) only; proptest is not available for ESP32 targets.

#![cfg(not(target_os = "espidf"))]

use proptest::prelude::*;
use streetlight::config::LightingConfig;
use streetlight::lighting::{BrightnessEngine, MotionInput, MotionLatch, RampPhase};
use streetlight::sensors::pm25::{FRAME_HEADER, FrameDecoder, checksum, encode_frame};

#[derive(Debug, Clone)]
enum Step {
    Tick { lux: f32 },
    Input(MotionInput),
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => prop_oneof![Just(0.0f32), Just(99.9), Just(100.0), Just(300.0), Just(500.0), 0.0f32..2_000.0]
            .prop_map(|lux| Step::Tick { lux }),
        1 => prop_oneof![
            Just(MotionInput::Motion),
            Just(MotionInput::ManualTrigger),
            Just(MotionInput::ManualClear),
        ]
        .prop_map(Step::Input),
    ]
}

// ── Brightness engine ─────────────────────────────────────────

proptest! {
    /// Idle only at target, ramp counters bounded, whatever the inputs.
    #[test]
    fn engine_state_stays_consistent(steps in proptest::collection::vec(step(), 1..600)) {
        let cfg = LightingConfig::default();
        let mut engine = BrightnessEngine::new(cfg);
        let motion = MotionLatch::new();
        let mut now = 0u32;

        for s in steps {
            match s {
                Step::Tick { lux } => {
                    now += cfg.tick_period_ms;
                    let level = engine.tick(lux, &motion, now);
                    let st = engine.snapshot();
                    prop_assert_eq!(level, st.current);
                    if st.phase == RampPhase::Idle {
                        prop_assert_eq!(st.current, st.target);
                    }
                    // One past the ramp length is the snapping step.
                    prop_assert!(st.step <= cfg.rise_steps.max(cfg.fall_steps) + 1);
                }
                Step::Input(input) => motion.apply(input, now),
            }
        }
    }

    /// Holding a scene constant always settles within one full ramp.
    #[test]
    fn constant_scene_settles(
        start in any::<u8>(),
        lux in 0.0f32..2_000.0,
        moving in any::<bool>(),
    ) {
        let cfg = LightingConfig::default();
        let mut engine = BrightnessEngine::starting_at(cfg, start);
        let motion = MotionLatch::new();
        if moving {
            motion.trigger(0);
        }
        let ticks = u32::from(cfg.rise_steps.max(cfg.fall_steps)) + 1;
        for i in 1..=ticks {
            engine.tick(lux, &motion, i * cfg.tick_period_ms);
        }
        let st = engine.snapshot();
        prop_assert_eq!(st.phase, RampPhase::Idle);
        prop_assert_eq!(st.current, st.target);
    }

    /// Rising ramps never overshoot and never step backwards.
    #[test]
    fn rise_is_monotonic(start in 0u8..110) {
        let cfg = LightingConfig::default();
        let mut engine = BrightnessEngine::starting_at(cfg, start);
        let motion = MotionLatch::new();
        let mut prev = start;
        for i in 1..=41u32 {
            let level = engine.tick(0.0, &motion, i * 50);
            prop_assert!(level >= prev);
            prop_assert!(level <= 110);
            prev = level;
        }
        prop_assert_eq!(prev, 110);
    }
}

// ── PM2.5 decoder ─────────────────────────────────────────────

proptest! {
    /// Arbitrary input never panics, and a clean frame always follows.
    #[test]
    fn decoder_resyncs_after_garbage(
        noise in proptest::collection::vec(any::<u8>(), 0..256),
        value in 0u16..16_384,
    ) {
        let mut decoder = FrameDecoder::new();
        for b in noise {
            let _ = decoder.feed(b);
        }
        let got: Vec<_> = encode_frame(value).iter().filter_map(|&b| decoder.feed(b)).collect();
        prop_assert_eq!(got.len(), 1);
        prop_assert_eq!(got[0].value, value);
        prop_assert!(decoder.is_searching());
    }

    /// Flipping one payload bit without fixing the checksum drops the frame.
    #[test]
    fn single_bit_flip_is_rejected(
        value in 0u16..16_384,
        byte in 1usize..3,
        bit in 0u32..8,
    ) {
        let mut frame = encode_frame(value);
        frame[byte] ^= 1 << bit;
        // A flipped byte equal to the header restarts framing instead.
        prop_assume!(frame[byte] != FRAME_HEADER);
        // Flips in bit 7 alias under the 7-bit checksum.
        prop_assume!(checksum(frame[0], frame[1], frame[2]) != frame[3]);

        let mut decoder = FrameDecoder::new();
        for &b in &frame {
            prop_assert!(decoder.feed(b).is_none());
        }
        prop_assert!(decoder.is_searching());

        let clean: Vec<_> = encode_frame(value).iter().filter_map(|&b| decoder.feed(b)).collect();
        prop_assert_eq!(clean.len(), 1);
    }

    /// Every emitted reading matches the four bytes that precede it.
    #[test]
    fn readings_come_from_valid_frames(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let mut decoder = FrameDecoder::new();
        for (i, &b) in data.iter().enumerate() {
            if let Some(r) = decoder.feed(b) {
                prop_assert!(i >= 3);
                let f = &data[i - 3..=i];
                prop_assert_eq!(f[0], FRAME_HEADER);
                prop_assert_eq!(checksum(f[0], f[1], f[2]), f[3]);
                prop_assert_eq!(r.value, u16::from(f[1]) * 128 + u16::from(f[2]));
            }
        }
    }
}
