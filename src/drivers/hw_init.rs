//! One-shot hardware peripheral initialization.
//!
//! Configures ADC1 channels, the motion/key GPIO inputs and the lamp LEDC
//! channel using raw ESP-IDF sys calls, then installs the per-pin GPIO ISRs
//! that feed the [`MotionLatch`]. Called once from `main()` before any task
//! is spawned.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::info;

use crate::lighting::MotionLatch;
#[cfg(target_os = "espidf")]
use crate::lighting::MotionInput;
use crate::pins::BoardPins;
#[cfg(target_os = "espidf")]
use crate::pins::{LIGHT_PWM_FREQ_HZ, PWM_RESOLUTION_BITS};

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    AdcInitFailed(i32),
    /// Pin is not routed to ADC1.
    NotAnAdcPin(i32),
    GpioConfigFailed(i32),
    LedcInitFailed(i32),
    IsrInstallFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AdcInitFailed(rc) => write!(f, "ADC1 init failed (rc={rc})"),
            Self::NotAnAdcPin(gpio) => write!(f, "GPIO{gpio} has no ADC1 channel"),
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={rc})"),
            Self::LedcInitFailed(rc) => write!(f, "LEDC timer/channel config failed (rc={rc})"),
            Self::IsrInstallFailed(rc) => write!(f, "GPIO ISR service install failed (rc={rc})"),
        }
    }
}

/// LEDC channel driving the lamp.
pub const LEDC_CH_LIGHT: u32 = 0;

/// ADC1 channel for a GPIO on the ESP32-S3 (GPIO1..=10 → CH0..=9).
pub const fn adc1_channel(gpio: i32) -> Option<u32> {
    if gpio >= 1 && gpio <= 10 {
        Some((gpio - 1) as u32)
    } else {
        None
    }
}

/// ADC1 channels for battery and solar, in that order.
pub fn power_channels(pins: &BoardPins) -> Result<(u32, u32), HwInitError> {
    let battery =
        adc1_channel(pins.battery_adc_gpio).ok_or(HwInitError::NotAnAdcPin(pins.battery_adc_gpio))?;
    let solar =
        adc1_channel(pins.solar_adc_gpio).ok_or(HwInitError::NotAnAdcPin(pins.solar_adc_gpio))?;
    Ok((battery, solar))
}

#[cfg(target_os = "espidf")]
pub fn init_peripherals(pins: &BoardPins) -> Result<(), HwInitError> {
    let (battery_ch, solar_ch) = power_channels(pins)?;
    // SAFETY: called once from main() before any task is spawned.
    unsafe {
        init_adc(battery_ch, solar_ch)?;
        init_gpio_inputs(pins)?;
        init_ledc(pins.light_pwm_gpio)?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals(pins: &BoardPins) -> Result<(), HwInitError> {
    power_channels(pins)?;
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── ADC (oneshot) ─────────────────────────────────────────────

#[cfg(target_os = "espidf")]
static mut ADC1_HANDLE: adc_oneshot_unit_handle_t = core::ptr::null_mut();

/// SAFETY: `ADC1_HANDLE` is written once in `init_adc()` before any task
/// exists; afterwards only the sensor task reads it.
#[cfg(target_os = "espidf")]
unsafe fn adc1_handle() -> adc_oneshot_unit_handle_t {
    unsafe { ADC1_HANDLE }
}

#[cfg(target_os = "espidf")]
unsafe fn init_adc(battery_ch: u32, solar_ch: u32) -> Result<(), HwInitError> {
    let init_cfg = adc_oneshot_unit_init_cfg_t {
        unit_id: adc_unit_t_ADC_UNIT_1,
        ulp_mode: adc_ulp_mode_t_ADC_ULP_MODE_DISABLE,
        ..Default::default()
    };
    let ret = unsafe { adc_oneshot_new_unit(&init_cfg, &raw mut ADC1_HANDLE) };
    if ret != ESP_OK {
        return Err(HwInitError::AdcInitFailed(ret));
    }

    let chan_cfg = adc_oneshot_chan_cfg_t {
        atten: adc_atten_t_ADC_ATTEN_DB_12,
        bitwidth: adc_bitwidth_t_ADC_BITWIDTH_12,
    };
    for ch in [battery_ch, solar_ch] {
        let ret = unsafe { adc_oneshot_config_channel(adc1_handle(), ch, &chan_cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::AdcInitFailed(ret));
        }
    }

    info!("hw_init: ADC1 configured (CH{battery_ch}=battery, CH{solar_ch}=solar)");
    Ok(())
}

/// One 12-bit sample, or `None` if the driver reports an error.
#[cfg(target_os = "espidf")]
pub fn adc1_read(channel: u32) -> Option<u16> {
    let mut raw: i32 = 0;
    // SAFETY: see `adc1_handle`.
    let ret = unsafe { adc_oneshot_read(adc1_handle(), channel, &mut raw) };
    (ret == ESP_OK).then(|| raw.clamp(0, 4095) as u16)
}

/// Simulation: a mid-scale reading.
#[cfg(not(target_os = "espidf"))]
pub fn adc1_read(_channel: u32) -> Option<u16> {
    Some(2_048)
}

// ── GPIO Inputs ───────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_inputs(pins: &BoardPins) -> Result<(), HwInitError> {
    // PIR output idles low; keys are active low.
    let inputs = [
        (pins.motion_gpio, false, gpio_int_type_t_GPIO_INTR_POSEDGE),
        (pins.key_trigger_gpio, true, gpio_int_type_t_GPIO_INTR_NEGEDGE),
        (pins.key_clear_gpio, true, gpio_int_type_t_GPIO_INTR_NEGEDGE),
    ];

    for (pin, pull_up, intr_type) in inputs {
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: if pull_up {
                gpio_pullup_t_GPIO_PULLUP_ENABLE
            } else {
                gpio_pullup_t_GPIO_PULLUP_DISABLE
            },
            pull_down_en: if pull_up {
                gpio_pulldown_t_GPIO_PULLDOWN_DISABLE
            } else {
                gpio_pulldown_t_GPIO_PULLDOWN_ENABLE
            },
            intr_type,
        };
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK {
            return Err(HwInitError::GpioConfigFailed(ret));
        }
    }

    info!(
        "hw_init: GPIO inputs configured (motion={}, key1={}, key2={})",
        pins.motion_gpio, pins.key_trigger_gpio, pins.key_clear_gpio
    );
    Ok(())
}

// ── LEDC PWM ─────────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_ledc(gpio: i32) -> Result<(), HwInitError> {
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: PWM_RESOLUTION_BITS,
        freq_hz: LIGHT_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    let ret = unsafe {
        ledc_channel_config(&ledc_channel_config_t {
            speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
            channel: LEDC_CH_LIGHT,
            timer_sel: ledc_timer_t_LEDC_TIMER_0,
            gpio_num: gpio,
            duty: 0,
            hpoint: 0,
            ..Default::default()
        })
    };
    if ret != ESP_OK {
        return Err(HwInitError::LedcInitFailed(ret));
    }

    info!("hw_init: LEDC configured (lamp=CH{LEDC_CH_LIGHT} on GPIO{gpio}, {LIGHT_PWM_FREQ_HZ} Hz)");
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn ledc_set(channel: u32, duty: u8) {
    // SAFETY: channel configured in init_ledc(); only the light task writes it.
    unsafe {
        ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, u32::from(duty));
        ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn ledc_set(_channel: u32, _duty: u8) {}

// ── GPIO ISR Service ──────────────────────────────────────────

/// ISR-side clock; `esp_timer_get_time` is safe from interrupt context.
#[cfg(target_os = "espidf")]
fn isr_now_ms() -> u32 {
    (unsafe { esp_timer_get_time() } / 1_000) as u32
}

#[cfg(target_os = "espidf")]
unsafe fn latch_from_arg<'a>(arg: *mut core::ffi::c_void) -> &'a MotionLatch {
    // SAFETY: registered with a `&'static MotionLatch` below.
    unsafe { &*(arg as *const MotionLatch) }
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn motion_isr(arg: *mut core::ffi::c_void) {
    unsafe { latch_from_arg(arg) }.apply(MotionInput::Motion, isr_now_ms());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn key_trigger_isr(arg: *mut core::ffi::c_void) {
    unsafe { latch_from_arg(arg) }.apply(MotionInput::ManualTrigger, isr_now_ms());
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn key_clear_isr(arg: *mut core::ffi::c_void) {
    unsafe { latch_from_arg(arg) }.apply(MotionInput::ManualClear, isr_now_ms());
}

/// Install the GPIO ISR service and route motion and key edges into `latch`.
/// Call after [`init_peripherals`].
#[cfg(target_os = "espidf")]
pub fn init_isr_service(pins: &BoardPins, latch: &'static MotionLatch) -> Result<(), HwInitError> {
    type Isr = unsafe extern "C" fn(*mut core::ffi::c_void);
    let arg = latch as *const MotionLatch as *mut core::ffi::c_void;
    let handlers: [(i32, Isr); 3] = [
        (pins.motion_gpio, motion_isr),
        (pins.key_trigger_gpio, key_trigger_isr),
        (pins.key_clear_gpio, key_clear_isr),
    ];

    // SAFETY: ESP_ERR_INVALID_STATE means the service is already installed.
    // Handlers only touch the latch atomics.
    unsafe {
        let ret = gpio_install_isr_service(0);
        if ret != ESP_OK && ret != ESP_ERR_INVALID_STATE {
            return Err(HwInitError::IsrInstallFailed(ret));
        }
        for (pin, handler) in handlers {
            let ret = gpio_isr_handler_add(pin, Some(handler), arg);
            if ret != ESP_OK {
                return Err(HwInitError::IsrInstallFailed(ret));
            }
            gpio_intr_enable(pin);
        }
    }

    info!("hw_init: ISR service installed (motion, key1, key2)");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_isr_service(_pins: &BoardPins, _latch: &'static MotionLatch) -> Result<(), HwInitError> {
    log::info!("hw_init(sim): ISR service skipped");
    Ok(())
}
