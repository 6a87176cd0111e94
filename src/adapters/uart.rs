//! PM2.5 sensor serial adapter.
//!
//! Implements [`SerialSource`] over UART at 9600 8N1.
//!
//! - **`target_os = "espidf"`**: `esp_idf_hal::uart::UartDriver`, read with
//!   `NON_BLOCK` so a drain never waits on the line.
//! - **other targets**: an in-memory byte queue fed by `sim_push`.

#[cfg(not(target_os = "espidf"))]
use std::collections::VecDeque;

use crate::app::ports::{SerialError, SerialSource};

#[cfg(target_os = "espidf")]
use esp_idf_hal::{delay::NON_BLOCK, uart::UartDriver};

pub struct UartSerial {
    #[cfg(target_os = "espidf")]
    driver: UartDriver<'static>,
    #[cfg(not(target_os = "espidf"))]
    rx: VecDeque<u8>,
}

impl UartSerial {
    #[cfg(target_os = "espidf")]
    pub fn new(driver: UartDriver<'static>) -> Self {
        log::info!("UartSerial: PM2.5 line at {} baud", crate::pins::PM25_BAUD);
        Self { driver }
    }

    #[cfg(not(target_os = "espidf"))]
    pub fn new() -> Self {
        Self { rx: VecDeque::new() }
    }
}

#[cfg(not(target_os = "espidf"))]
impl Default for UartSerial {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_os = "espidf"))]
impl UartSerial {
    /// Simulation: bytes arrive on the line.
    pub fn sim_push(&mut self, bytes: &[u8]) {
        self.rx.extend(bytes);
    }

    pub fn sim_pending(&self) -> usize {
        self.rx.len()
    }
}

impl SerialSource for UartSerial {
    #[cfg(target_os = "espidf")]
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        match self.driver.read(buf, NON_BLOCK) {
            Ok(n) => Ok(n),
            // Nothing buffered is reported as a timeout.
            Err(e) if e.code() == esp_idf_svc::sys::ESP_ERR_TIMEOUT => Ok(0),
            Err(e) => Err(SerialError::Io(e.code())),
        }
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, SerialError> {
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_at_most_buffer_len() {
        let mut uart = UartSerial::new();
        uart.sim_push(&[1, 2, 3, 4, 5]);
        let mut buf = [0u8; 3];
        assert_eq!(uart.read_available(&mut buf), Ok(3));
        assert_eq!(buf, [1, 2, 3]);
        assert_eq!(uart.sim_pending(), 2);
        assert_eq!(uart.read_available(&mut buf), Ok(2));
        assert_eq!(uart.read_available(&mut buf), Ok(0));
    }
}
