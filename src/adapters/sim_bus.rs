//! Simulated ADC bus for running without hardware.
//!
//! Each channel reads `centre + slow sine drift + uniform noise`, clamped to
//! the 12-bit range. Handles are cheap clones over shared channel state, so
//! the console can move the light level or inject a fall while the motion
//! and ambient loops keep reading through their own handles.
//!
//! Injected effects:
//! - **override**: the next `n` reads of a channel return a fixed level
//!   (used for the fall profile);
//! - **failure**: the next `n` reads of a channel time out.

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::app::ports::AdcBus;
use crate::error::BusError;
use crate::pins::{ACCEL_X_CHANNEL, ACCEL_Y_CHANNEL, ACCEL_Z_CHANNEL, ADC_CHANNELS, ADC_MAX};

/// Resting level for every channel (mid-scale).
pub const DEFAULT_CENTRE: u16 = 2047;
const DEFAULT_NOISE: u16 = 100;
const DEFAULT_DRIFT: f32 = 50.0;
const CHANNELS: usize = ADC_CHANNELS as usize;

/// Reads per drift period.
const DRIFT_PERIOD_READS: f32 = 600.0;

/// Fall profile: every accelerometer axis pinned near full scale.
const IMPACT_LEVEL: u16 = 3900;

#[derive(Default)]
struct SimChannel {
    centre: AtomicU16,
    override_level: AtomicU16,
    override_reads: AtomicU32,
    fail_reads: AtomicU32,
}

fn take_one(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

pub struct SimulatedBus {
    channels: Arc<[SimChannel; CHANNELS]>,
    rng: StdRng,
    noise: u16,
    drift: f32,
    reads: u64,
}

impl Clone for SimulatedBus {
    /// A new handle onto the same channels, with its own noise source.
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            rng: StdRng::from_entropy(),
            noise: self.noise,
            drift: self.drift,
            reads: 0,
        }
    }
}

impl Default for SimulatedBus {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy(), DEFAULT_NOISE, DEFAULT_DRIFT)
    }

    /// Deterministic bus for tests.
    pub fn seeded(seed: u64, noise: u16, drift: f32) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), noise, drift)
    }

    fn with_rng(rng: StdRng, noise: u16, drift: f32) -> Self {
        let channels: [SimChannel; CHANNELS] = core::array::from_fn(|_| SimChannel::default());
        for ch in &channels {
            ch.centre.store(DEFAULT_CENTRE, Ordering::Relaxed);
        }
        info!("SimBus: {} channels, noise ±{}, drift ±{:.0}", ADC_CHANNELS, noise, drift);
        Self {
            channels: Arc::new(channels),
            rng,
            noise,
            drift,
            reads: 0,
        }
    }

    fn slot(&self, channel: u8) -> Option<&SimChannel> {
        self.channels.get(usize::from(channel))
    }

    /// Move a channel's resting level.
    pub fn set_centre(&self, channel: u8, counts: u16) {
        if let Some(ch) = self.slot(channel) {
            ch.centre.store(counts.min(ADC_MAX), Ordering::SeqCst);
        }
    }

    /// Set a channel's resting level from a normalised value.
    pub fn set_level(&self, channel: u8, value: f32) {
        let counts = (value.clamp(0.0, 1.0) * f32::from(ADC_MAX)).round() as u16;
        self.set_centre(channel, counts);
    }

    /// Return `level` for the next `reads` reads of `channel`.
    pub fn override_reads(&self, channel: u8, level: u16, reads: u32) {
        if let Some(ch) = self.slot(channel) {
            ch.override_level.store(level.min(ADC_MAX), Ordering::SeqCst);
            ch.override_reads.store(reads, Ordering::SeqCst);
        }
    }

    /// Make the next `reads` reads of `channel` time out.
    pub fn fail_reads(&self, channel: u8, reads: u32) {
        if let Some(ch) = self.slot(channel) {
            ch.fail_reads.store(reads, Ordering::SeqCst);
        }
    }

    /// Pin all three accelerometer axes high for `ticks` motion ticks.
    pub fn inject_impact(&self, ticks: u32) {
        info!("SimBus: injecting impact for {} ticks", ticks);
        for ch in [ACCEL_X_CHANNEL, ACCEL_Y_CHANNEL, ACCEL_Z_CHANNEL] {
            self.override_reads(ch, IMPACT_LEVEL, ticks);
        }
    }
}

impl AdcBus for SimulatedBus {
    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
        let slot = self
            .channels
            .get(usize::from(channel))
            .ok_or(BusError::InvalidChannel(channel))?;
        self.reads = self.reads.wrapping_add(1);

        if take_one(&slot.fail_reads) {
            return Err(BusError::Timeout);
        }

        let base = if take_one(&slot.override_reads) {
            f32::from(slot.override_level.load(Ordering::SeqCst))
        } else {
            let phase = self.reads as f32 / DRIFT_PERIOD_READS * core::f32::consts::TAU;
            f32::from(slot.centre.load(Ordering::SeqCst)) + phase.sin() * self.drift
        };
        let noise = if self.noise == 0 {
            0.0
        } else {
            f32::from(self.rng.gen_range(0..=2 * self.noise)) - f32::from(self.noise)
        };
        Ok((base + noise).round().clamp(0.0, f32::from(ADC_MAX)) as u16)
    }
}
