//! I2C environment sensors: BH1750 ambient light and AHT20 temperature /
//! humidity, both generic over the blocking `embedded_hal` I2C trait.
//!
//! A failed read keeps the previous value; the sensor task logs it and the
//! lamp keeps running on the last good lux figure.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use log::warn;

use crate::error::SensorError;

// ───────────────────────────────────────────────────────────────
// BH1750
// ───────────────────────────────────────────────────────────────

pub const BH1750_ADDR: u8 = 0x23;
const BH1750_POWER_ON: u8 = 0x01;
/// Continuous high-resolution mode, 1 lx resolution, ~120 ms conversion.
const BH1750_CONT_HRES: u8 = 0x10;

pub struct Bh1750<I> {
    i2c: I,
    last_lux: f32,
}

impl<I: I2c> Bh1750<I> {
    pub fn new(i2c: I) -> Self {
        Self { i2c, last_lux: 0.0 }
    }

    /// Power the sensor up and start continuous measurement.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(BH1750_ADDR, &[BH1750_POWER_ON])
            .map_err(|_| SensorError::BusError)?;
        self.i2c
            .write(BH1750_ADDR, &[BH1750_CONT_HRES])
            .map_err(|_| SensorError::BusError)
    }

    pub fn read_lux(&mut self) -> Result<f32, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .read(BH1750_ADDR, &mut buf)
            .map_err(|_| SensorError::BusError)?;
        let lux = f32::from(u16::from_be_bytes(buf)) / 1.2;
        self.last_lux = lux;
        Ok(lux)
    }

    /// Read, falling back to the last good value on bus errors.
    pub fn sample(&mut self) -> f32 {
        match self.read_lux() {
            Ok(lux) => lux,
            Err(e) => {
                warn!("BH1750: {e}, keeping {:.1} lx", self.last_lux);
                self.last_lux
            }
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AHT20
// ───────────────────────────────────────────────────────────────

pub const AHT20_ADDR: u8 = 0x38;
const AHT20_CMD_INIT: [u8; 3] = [0xBE, 0x08, 0x00];
const AHT20_CMD_MEASURE: [u8; 3] = [0xAC, 0x33, 0x00];
const AHT20_STATUS_BUSY: u8 = 0x80;
const AHT20_MEASURE_MS: u32 = 80;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Climate {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Decode the 6-byte AHT20 response (status + 20-bit RH + 20-bit T).
pub fn decode_aht20(frame: &[u8; 6]) -> Result<Climate, SensorError> {
    if frame[0] & AHT20_STATUS_BUSY != 0 {
        return Err(SensorError::NotReady);
    }
    let raw_h =
        (u32::from(frame[1]) << 12) | (u32::from(frame[2]) << 4) | (u32::from(frame[3]) >> 4);
    let raw_t =
        ((u32::from(frame[3]) & 0x0F) << 16) | (u32::from(frame[4]) << 8) | u32::from(frame[5]);
    const SCALE: f32 = (1u32 << 20) as f32;
    Ok(Climate {
        humidity_pct: raw_h as f32 / SCALE * 100.0,
        temperature_c: raw_t as f32 / SCALE * 200.0 - 50.0,
    })
}

pub struct Aht20<I, D> {
    i2c: I,
    delay: D,
    last: Climate,
}

impl<I: I2c, D: DelayNs> Aht20<I, D> {
    pub fn new(i2c: I, delay: D) -> Self {
        Self {
            i2c,
            delay,
            last: Climate::default(),
        }
    }

    /// Load the factory calibration.
    pub fn init(&mut self) -> Result<(), SensorError> {
        self.i2c
            .write(AHT20_ADDR, &AHT20_CMD_INIT)
            .map_err(|_| SensorError::BusError)?;
        self.delay.delay_ms(10);
        Ok(())
    }

    /// Trigger a measurement and read it back (blocks ~80 ms).
    pub fn read(&mut self) -> Result<Climate, SensorError> {
        self.i2c
            .write(AHT20_ADDR, &AHT20_CMD_MEASURE)
            .map_err(|_| SensorError::BusError)?;
        self.delay.delay_ms(AHT20_MEASURE_MS);
        let mut frame = [0u8; 6];
        self.i2c
            .read(AHT20_ADDR, &mut frame)
            .map_err(|_| SensorError::BusError)?;
        let climate = decode_aht20(&frame)?;
        self.last = climate;
        Ok(climate)
    }

    pub fn sample(&mut self) -> Climate {
        match self.read() {
            Ok(c) => c,
            Err(e) => {
                warn!("AHT20: {e}, keeping previous reading");
                self.last
            }
        }
    }
}
