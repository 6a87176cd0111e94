//! PM2.5 drain loop: serial bytes through the decoder into the shared cell.

use streetlight::app::service::NodeState;
use streetlight::sensors::Pm25Monitor;
use streetlight::sensors::pm25::{checksum, encode_frame};

use crate::mock_hw::MockSerial;

#[test]
fn frame_split_across_drains_is_reassembled() {
    let state = NodeState::new();
    let mut serial = MockSerial::default();
    let frame = encode_frame(172);
    serial.push(&frame[..2]);
    let mut monitor = Pm25Monitor::new(serial);

    assert_eq!(monitor.drain(&state.pm25), 0);
    assert!(!state.pm25.is_ready());

    monitor.serial_mut().push(&frame[2..]);
    assert_eq!(monitor.drain(&state.pm25), 1);
    assert_eq!(state.pm25.take(), Some(172));
}

#[test]
fn burst_longer_than_read_chunk_is_fully_drained() {
    let state = NodeState::new();
    let mut serial = MockSerial::default();
    let mut burst = Vec::new();
    for v in 1..=20u16 {
        burst.extend_from_slice(&encode_frame(v * 10));
    }
    serial.push(&burst);
    let mut monitor = Pm25Monitor::new(serial);

    assert_eq!(monitor.drain(&state.pm25), 20);
    assert_eq!(monitor.frames_ok(), 20);
    assert_eq!(state.pm25.take(), Some(200));
    assert_eq!(state.pm25.take(), None);
    // The last value stays visible to telemetry after `take`.
    assert_eq!(state.telemetry().pm25, 200);
}

#[test]
fn truncated_frame_does_not_poison_the_next() {
    let state = NodeState::new();
    let mut serial = MockSerial::default();
    serial.push(&[0xA5, 0xFF]);
    serial.push(&[0xA5, 0x00, 0x01, checksum(0xA5, 0x00, 0x01)]);
    let mut monitor = Pm25Monitor::new(serial);

    assert_eq!(monitor.drain(&state.pm25), 1);
    assert_eq!(state.pm25.take(), Some(1));
}

#[test]
fn noise_and_bad_checksums_are_skipped() {
    let state = NodeState::new();
    let mut serial = MockSerial::default();
    let mut corrupt = encode_frame(300);
    corrupt[2] ^= 0x04;
    serial.push(&[0x00, 0x13, 0x7F]);
    serial.push(&corrupt);
    serial.push(&encode_frame(35));
    let mut monitor = Pm25Monitor::new(serial);

    assert_eq!(monitor.drain(&state.pm25), 1);
    assert_eq!(state.pm25.latest(), 35);
}

#[test]
fn read_error_ends_the_drain_early() {
    let state = NodeState::new();
    let mut serial = MockSerial::default();
    serial.fail_next = true;
    serial.push(&encode_frame(40));
    let mut monitor = Pm25Monitor::new(serial);

    assert_eq!(monitor.drain(&state.pm25), 0);
    assert_eq!(monitor.drain(&state.pm25), 1);
}
