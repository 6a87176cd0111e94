//! Motion latch shared between GPIO ISRs and the brightness engine.
//!
//! ## Hardware
//!
//! | Input | Edge    | Effect          |
//! |-------|---------|-----------------|
//! | PIR   | rising  | trigger         |
//! | KEY1  | falling | trigger         |
//! | KEY2  | falling | clear           |
//!
//! ISRs only store into the two atomics. Expiry is evaluated by the engine
//! tick, never by a timer, so a delayed tick delays the timeout with it.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Source of a latch update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionInput {
    /// PIR sensor fired.
    Motion,
    /// Operator pressed the trigger key.
    ManualTrigger,
    /// Operator pressed the clear key.
    ManualClear,
}

/// Lock-free motion flag plus the time of the last trigger.
///
/// The timestamp is stored before the flag is raised with `Release`, so a
/// reader that observes `active == true` with `Acquire` also sees a stamp at
/// least as new as the trigger that set it.
#[derive(Debug)]
pub struct MotionLatch {
    active: AtomicBool,
    last_trigger_ms: AtomicU32,
}

impl Default for MotionLatch {
    fn default() -> Self {
        Self::new()
    }
}

impl MotionLatch {
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            last_trigger_ms: AtomicU32::new(0),
        }
    }

    /// Arm the latch. Safe from interrupt context.
    pub fn trigger(&self, now_ms: u32) {
        self.last_trigger_ms.store(now_ms, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Disarm the latch. Safe from interrupt context.
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn apply(&self, input: MotionInput, now_ms: u32) {
        match input {
            MotionInput::Motion | MotionInput::ManualTrigger => self.trigger(now_ms),
            MotionInput::ManualClear => self.clear(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn last_trigger_ms(&self) -> u32 {
        self.last_trigger_ms.load(Ordering::Relaxed)
    }

    /// Clear the latch if it has been armed for longer than `timeout_ms`.
    ///
    /// Strictly greater: a trigger at t=0 with a 5000 ms timeout is still
    /// active at t=5000 and expires at t=5001. Returns `true` when this call
    /// performed the clear.
    ///
    /// A trigger stamped after `now_ms` (an ISR firing between the caller's
    /// clock read and this call) counts as fresh.
    pub fn expire_if_stale(&self, now_ms: u32, timeout_ms: u32) -> bool {
        if !self.is_active() {
            return false;
        }
        let age = now_ms.wrapping_sub(self.last_trigger_ms()) as i32;
        if age > 0 && age.unsigned_abs() > timeout_ms {
            // A trigger racing in between the load and this exchange keeps
            // the latch armed on the next tick, since it restamps the time.
            self.active
                .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        } else {
            false
        }
    }
}
