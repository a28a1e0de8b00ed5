//! Fuzz target: calibrated channel filter
//!
//! Drives a `CalibratedChannel` with arbitrary raw counts and window sizes
//! and verifies:
//! - No panics under any count stream
//! - Every accepted reading is normalised to `[0, 1]`
//! - Counts above 12 bits are rejected, never clamped in
//!
//! cargo fuzz run fuzz_channel_filter

#![no_main]

use carewatch::app::ports::AdcBus;
use carewatch::error::BusError;
use carewatch::sensors::channel::{CalibratedChannel, CalibrationProfile};
use libfuzzer_sys::fuzz_target;

struct ByteBus<'a>(core::slice::ChunksExact<'a, u8>);

impl AdcBus for ByteBus<'_> {
    fn read_channel(&mut self, _channel: u8) -> Result<u16, BusError> {
        self.0
            .next()
            .map(|c| u16::from_le_bytes([c[0], c[1]]) & 0x1FFF)
            .ok_or(BusError::Timeout)
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let window = data[0] % 40;
    let smoothing = data[1] % 12;
    let offset = f32::from(data[2]) / 255.0;

    let profile = CalibrationProfile {
        offset,
        filter_window: window,
    };
    let mut ch = CalibratedChannel::new(0, profile, smoothing);
    let mut bus = ByteBus(data[3..].chunks_exact(2));

    for t in 0.. {
        match ch.read(&mut bus, t) {
            Ok(r) => assert!((0.0..=1.0).contains(&r.value), "value {}", r.value),
            Err(BusError::OutOfRange(raw)) => assert!(raw > 4095),
            Err(BusError::Timeout) => break,
            Err(e) => panic!("unexpected bus error {e}"),
        }
    }
});
