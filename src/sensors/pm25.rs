//! PM2.5 sensor serial protocol.
//!
//! Wire format (9600 8N1):
//! ```text
//! ┌──────┬──────────┬─────────┬──────────────────────────┐
//! │ 0xA5 │ dataHigh │ dataLow │ (A5 + hi + lo) & 0x7F    │
//! └──────┴──────────┴─────────┴──────────────────────────┘
//! concentration = dataHigh * 128 + dataLow   (µg/m³)
//! ```
//!
//! The decoder is fed one byte at a time and never blocks or allocates.
//! Corrupt frames are dropped without an error; the sensor streams
//! continuously so the next header resynchronises.

use core::sync::atomic::{AtomicBool, AtomicU16, Ordering};

use log::{debug, warn};

use crate::app::ports::SerialSource;

pub const FRAME_HEADER: u8 = 0xA5;
pub const FRAME_LEN: usize = 4;

/// A validated concentration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pm25Reading {
    pub value: u16,
}

/// Checksum over the first three frame bytes.
pub const fn checksum(header: u8, high: u8, low: u8) -> u8 {
    header.wrapping_add(high).wrapping_add(low) & 0x7F
}

/// Build a well-formed frame for `value`. Values above 14 bits are masked.
pub const fn encode_frame(value: u16) -> [u8; FRAME_LEN] {
    let high = ((value >> 7) & 0x7F) as u8;
    let low = (value & 0x7F) as u8;
    [FRAME_HEADER, high, low, checksum(FRAME_HEADER, high, low)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecoderState {
    SearchHeader,
    CollectBody { cursor: usize },
}

/// Byte-at-a-time frame decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    buf: [u8; FRAME_LEN],
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: DecoderState::SearchHeader,
            buf: [0; FRAME_LEN],
        }
    }

    /// Drop any partial frame and return to header search.
    pub fn reset(&mut self) {
        self.state = DecoderState::SearchHeader;
        self.buf = [0; FRAME_LEN];
    }

    pub fn is_searching(&self) -> bool {
        self.state == DecoderState::SearchHeader
    }

    /// Consume one byte. Returns a reading when it completes a valid frame.
    pub fn feed(&mut self, byte: u8) -> Option<Pm25Reading> {
        match self.state {
            DecoderState::SearchHeader => {
                if byte == FRAME_HEADER {
                    self.start_frame();
                }
                None
            }
            // Payload and checksum bytes are 7-bit on the wire, so a header
            // byte in the body means the previous frame was cut short.
            DecoderState::CollectBody { .. } if byte == FRAME_HEADER => {
                debug!("pm25: header inside frame, resyncing");
                self.start_frame();
                None
            }
            DecoderState::CollectBody { cursor } => {
                self.buf[cursor] = byte;
                let cursor = cursor + 1;
                if cursor < FRAME_LEN {
                    self.state = DecoderState::CollectBody { cursor };
                    return None;
                }
                let frame = self.buf;
                self.reset();
                Self::validate(&frame)
            }
        }
    }

    fn start_frame(&mut self) {
        self.buf = [FRAME_HEADER, 0, 0, 0];
        self.state = DecoderState::CollectBody { cursor: 1 };
    }

    fn validate(frame: &[u8; FRAME_LEN]) -> Option<Pm25Reading> {
        let [header, high, low, sum] = *frame;
        if checksum(header, high, low) != sum {
            debug!("pm25: checksum mismatch {frame:02X?}");
            return None;
        }
        Some(Pm25Reading {
            value: u16::from(high) * 128 + u16::from(low),
        })
    }
}

/// Latest decoded concentration with a read-and-clear ready flag.
///
/// One writer (the drain task) and any number of readers. The value is
/// stored before the flag is raised, so `take()` never returns a value
/// older than the flag it cleared.
#[derive(Debug, Default)]
pub struct ConcentrationCell {
    value: AtomicU16,
    ready: AtomicBool,
}

impl ConcentrationCell {
    pub const fn new() -> Self {
        Self {
            value: AtomicU16::new(0),
            ready: AtomicBool::new(false),
        }
    }

    pub fn publish(&self, reading: Pm25Reading) {
        self.value.store(reading.value, Ordering::Relaxed);
        self.ready.store(true, Ordering::Release);
    }

    /// Return the value if a fresh one arrived since the last take.
    pub fn take(&self) -> Option<u16> {
        if self.ready.swap(false, Ordering::AcqRel) {
            Some(self.value.load(Ordering::Relaxed))
        } else {
            None
        }
    }

    /// Last decoded value, fresh or not. Zero before the first frame.
    pub fn latest(&self) -> u16 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Drains a serial port through the decoder into a [`ConcentrationCell`].
pub struct Pm25Monitor<S: SerialSource> {
    serial: S,
    decoder: FrameDecoder,
    frames_ok: u32,
}

impl<S: SerialSource> Pm25Monitor<S> {
    pub fn new(serial: S) -> Self {
        Self {
            serial,
            decoder: FrameDecoder::new(),
            frames_ok: 0,
        }
    }

    /// Feed every byte currently buffered on the port, in arrival order.
    /// Returns the number of valid frames decoded during this call.
    pub fn drain(&mut self, cell: &ConcentrationCell) -> usize {
        let mut chunk = [0u8; 32];
        let mut decoded = 0;
        loop {
            let n = match self.serial.read_available(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n.min(chunk.len()),
                Err(e) => {
                    warn!("pm25: serial read failed: {e}");
                    break;
                }
            };
            for &byte in &chunk[..n] {
                if let Some(reading) = self.decoder.feed(byte) {
                    cell.publish(reading);
                    decoded += 1;
                }
            }
        }
        self.frames_ok = self.frames_ok.wrapping_add(decoded as u32);
        decoded
    }

    /// Valid frames decoded since boot.
    pub fn frames_ok(&self) -> u32 {
        self.frames_ok
    }

    pub fn serial_mut(&mut self) -> &mut S {
        &mut self.serial
    }
}
