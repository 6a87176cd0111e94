//! Street light node firmware: main entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                      │
//! │  MqttAdapter   WifiAdapter   UartSerial   LampDriver   NvsAdapter│
//! │  (BrokerPort)  (Connectivity)(SerialSource)(LightPort) (Config)  │
//! │                                                                 │
//! │  ──────────────── Port Trait Boundary ───────────────────       │
//! │                                                                 │
//! │  LightService · BrightnessEngine · Pm25Monitor · SessionManager │
//! └─────────────────────────────────────────────────────────────────┘
//!
//!  APP core: light (50 ms) · sensors (100 ms) · pm25 (100 ms)
//!  PRO core: data report (10 s) · heartbeat (5 s)
//!  main thread: status log + Wi-Fi supervision (1 s)
//! ```
#![deny(unused_must_use)]

use core::cell::RefCell;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use embedded_hal_bus::i2c::RefCellDevice;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::AnyIOPin;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::uart::{UartDriver, config::Config as UartConfig};
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};
use log::{info, warn};

use streetlight::adapters::device_id;
use streetlight::adapters::hardware::PowerAdapter;
use streetlight::adapters::log_sink::LogEventSink;
use streetlight::adapters::mqtt::MqttAdapter;
use streetlight::adapters::nvs::NvsAdapter;
use streetlight::adapters::time::MonotonicClock;
use streetlight::adapters::uart::UartSerial;
use streetlight::adapters::wifi::{ConnectivityPort, WifiAdapter};
use streetlight::app::events::AppEvent;
use streetlight::app::ports::{ConfigPort, EventSink};
use streetlight::app::report::{ReportKind, Reporter};
use streetlight::app::service::{LightService, NodeState};
use streetlight::config::NodeConfig;
use streetlight::drivers::lamp::LampDriver;
use streetlight::drivers::task_pin::{Core, spawn_on_core};
use streetlight::drivers::{hw_init, watchdog};
use streetlight::error::Error;
use streetlight::lighting::MotionLatch;
use streetlight::pins::{BoardPins, I2C_FREQ_HZ, PM25_BAUD};
use streetlight::sensors::{Aht20, Bh1750, Pm25Monitor};
use streetlight::session::SessionManager;

static STATE: NodeState = NodeState::new();
static MOTION: MotionLatch = MotionLatch::new();

/// Climate and power are sampled every Nth sensor cycle (2 s at 100 ms).
const SLOW_SAMPLE_EVERY: u32 = 20;

type SharedSession = Arc<Mutex<SessionManager<MqttAdapter>>>;

/// Run `body` every `period_ms` forever, feeding the task watchdog each pass.
fn run_periodic(name: &str, period_ms: u32, clock: MonotonicClock, mut body: impl FnMut(u32)) {
    let wdt = watchdog::Watchdog::subscribe(name);
    loop {
        body(clock.now_ms());
        wdt.feed();
        std::thread::sleep(Duration::from_millis(u64::from(period_ms)));
    }
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;
    info!("streetlight v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Config ─────────────────────────────────────────────
    let nvs = NvsAdapter::new().map_err(Error::from).context("NVS init")?;
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("config load failed ({e}), using defaults");
            NodeConfig::default()
        }
    };
    watchdog::configure(config.tasks.watchdog_timeout_ms);
    let pins = BoardPins::for_board(config.board);
    info!("board {:?}", config.board);

    // ── 3. Peripherals and motion ISRs ────────────────────────
    hw_init::init_peripherals(&pins).map_err(Error::from)?;
    hw_init::init_isr_service(&pins, &MOTION).map_err(Error::from)?;

    let peripherals = Peripherals::take()?;
    let sysloop = EspSystemEventLoop::take()?;
    let clock = MonotonicClock::new();

    // SAFETY: each GPIO number comes from the board map and is used once.
    let (sda, scl, pm_tx, pm_rx) = unsafe {
        (
            AnyIOPin::new(pins.i2c_sda_gpio),
            AnyIOPin::new(pins.i2c_scl_gpio),
            AnyIOPin::new(pins.pm25_tx_gpio),
            AnyIOPin::new(pins.pm25_rx_gpio),
        )
    };
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        sda,
        scl,
        &I2cConfig::new().baudrate(Hertz(I2C_FREQ_HZ)),
    )
    .context("I2C driver")?;
    let uart = UartDriver::new(
        peripherals.uart1,
        pm_tx,
        pm_rx,
        Option::<AnyIOPin>::None,
        Option::<AnyIOPin>::None,
        &UartConfig::default().baudrate(Hertz(PM25_BAUD)),
    )
    .context("PM2.5 UART driver")?;

    // ── 4. Network ────────────────────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sysloop.clone(), None)?;
    let mut wifi = WifiAdapter::new(
        BlockingWifi::wrap(esp_wifi, sysloop)?,
        config.network.wifi_reconnect_delay_ms,
    );
    if let Err(e) = wifi.set_credentials(&config.network.wifi_ssid, &config.network.wifi_password)
    {
        warn!("WiFi credentials rejected: {e}");
    } else if let Err(e) = wifi.connect(clock.now_ms()) {
        warn!("WiFi join failed ({e}), will retry");
    }

    let client_id = device_id::client_id(&config.network.client_id_base, &device_id::read_mac());
    let reporter = Reporter::new(&config.network.device_id)
        .context("device id too long for topic names")?;
    let mqtt = MqttAdapter::new(
        &config.network,
        &client_id,
        config.session.connect_timeout_ms,
        wifi.link_flag(),
    )
    .map_err(Error::from)?;
    let session: SharedSession = Arc::new(Mutex::new(SessionManager::new(
        mqtt,
        config.session,
        &reporter.topics().control,
    )));

    let mut sink = LogEventSink::new();
    sink.emit(&AppEvent::Started { client_id });

    // ── 5. Tasks ──────────────────────────────────────────────
    let lighting = config.lighting;
    STATE.set_ambient_lux(lighting.lux_off_threshold);
    spawn_on_core(Core::App, 10, 6, "light\0", move || {
        let mut service = LightService::new(lighting);
        let mut lamp = LampDriver::new();
        let mut sink = LogEventSink::new();
        run_periodic("light", lighting.tick_period_ms, clock, |now| {
            service.tick(&STATE, &MOTION, now, &mut lamp, &mut sink);
        });
    })?;

    let sensor_period = config.tasks.sensor_interval_ms;
    spawn_on_core(Core::App, 6, 8, "sensors\0", move || {
        let bus = RefCell::new(i2c);
        let mut light_sensor = Bh1750::new(RefCellDevice::new(&bus));
        let mut climate_sensor = Aht20::new(RefCellDevice::new(&bus), FreeRtos);
        if let Err(e) = light_sensor.init() {
            warn!("BH1750 init: {}", Error::from(e));
        }
        if let Err(e) = climate_sensor.init() {
            warn!("AHT20 init: {}", Error::from(e));
        }
        let mut power = match PowerAdapter::new(&pins) {
            Ok(p) => Some(p),
            Err(e) => {
                warn!("power sampling disabled: {}", Error::from(e));
                None
            }
        };
        let mut cycle = 0u32;
        run_periodic("sensors", sensor_period, clock, |_| {
            STATE.set_ambient_lux(light_sensor.sample());
            if cycle % SLOW_SAMPLE_EVERY == 0 {
                STATE.set_climate(climate_sensor.sample());
                if let Some(reading) = power.as_mut().and_then(PowerAdapter::sample) {
                    STATE.set_power(reading);
                }
            }
            cycle = cycle.wrapping_add(1);
        });
    })?;

    let pm25_period = config.tasks.pm25_drain_interval_ms;
    spawn_on_core(Core::App, 6, 4, "pm25\0", move || {
        let mut monitor = Pm25Monitor::new(UartSerial::new(uart));
        run_periodic("pm25", pm25_period, clock, |_| {
            monitor.drain(&STATE.pm25);
        });
    })?;

    let reports = [
        (ReportKind::Data, config.tasks.data_report_interval_ms, "data\0"),
        (ReportKind::Heartbeat, config.tasks.heartbeat_interval_ms, "heartbeat\0"),
    ];
    for (kind, period, name) in reports {
        let session = Arc::clone(&session);
        let reporter = reporter.clone();
        spawn_on_core(Core::Pro, 5, 8, name, move || {
            let mut sink = LogEventSink::new();
            run_periodic(name.trim_end_matches('\0'), period, clock, |_| {
                let mut session = session.lock().unwrap_or_else(PoisonError::into_inner);
                // Read the clock under the lock so attempts stay ordered.
                reporter.run_cycle(kind, &mut session, &STATE, clock.now_ms(), &mut sink);
            });
        })?;
    }

    // ── 6. Status log + Wi-Fi supervision ─────────────────────
    run_periodic("main", config.tasks.status_log_interval_ms, clock, |now| {
        wifi.poll(now);
        sink.emit(&AppEvent::Status(STATE.telemetry()));
    });
    Ok(())
}
