//! Task Watchdog Timer (TWDT) driver.
//!
//! [`configure`] sets the timeout once at boot (20 s by default, panic on
//! trigger). Every long-running task then calls [`Watchdog::subscribe`]
//! from its own thread and feeds it once per period.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

use log::{info, warn};

/// Reconfigure the TWDT. Call once from `main()`.
pub fn configure(timeout_ms: u32) {
    #[cfg(target_os = "espidf")]
    {
        let cfg = esp_task_wdt_config_t {
            timeout_ms,
            idle_core_mask: 0,
            trigger_panic: true,
        };
        // SAFETY: plain config struct; the TWDT is started by the bootloader.
        let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
        if ret != ESP_OK {
            warn!("TWDT reconfigure returned {ret} (may already be configured)");
            return;
        }
    }
    info!("Watchdog: {timeout_ms} ms timeout, panic on trigger");
}

/// Subscription of one task to the TWDT.
pub struct Watchdog {
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the calling task.
    pub fn subscribe(task: &str) -> Self {
        #[cfg(target_os = "espidf")]
        let subscribed = {
            // SAFETY: null means "the calling task".
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            if ret != ESP_OK {
                warn!("Watchdog: '{task}' failed to subscribe ({ret})");
            }
            ret == ESP_OK
        };
        #[cfg(not(target_os = "espidf"))]
        let subscribed = true;

        if subscribed {
            info!("Watchdog: '{task}' subscribed");
        }
        Self { subscribed }
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscribed
    }

    /// Feed the watchdog. Must be called at least once per timeout.
    pub fn feed(&self) {
        #[cfg(target_os = "espidf")]
        if self.subscribed {
            // SAFETY: the calling task is subscribed.
            unsafe {
                esp_task_wdt_reset();
            }
        }
    }
}
