//! Calibrated analog channel reader.
//!
//! One instance per ADC input. Each `read()` pulls a raw count from the bus,
//! pushes it into a fixed-size ring buffer, and produces a normalised reading:
//!
//! ```text
//!  raw ──▶ ring[N] ──▶ median ──▶ avg(last M medians) ──▶ /4095 ──▶ −offset ──▶ clamp[0,1]
//! ```
//!
//! The median rejects single-sample spikes (bit flips on the bus) that a
//! plain moving average would smear into the output; the short average then
//! removes residual high-frequency noise.
//!
//! The ring buffer is owned exclusively by its reader; readers are never
//! shared across threads.

use heapless::{Deque, Vec};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{AdcBus, StorageError, StoragePort};
use crate::config::{MAX_FILTER_WINDOW, MAX_SMOOTHING_WINDOW};
use crate::error::{BusError, CalibrationError};
use crate::pins::ADC_MAX;

const RING_CAP: usize = MAX_FILTER_WINDOW as usize;
const SMOOTH_CAP: usize = MAX_SMOOTHING_WINDOW as usize;

const CALIB_NAMESPACE: &str = "calib";

/// Per-channel calibration, persisted as an opaque blob.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationProfile {
    /// Normalised value subtracted from every reading.
    pub offset: f32,
    /// Median ring depth.
    pub filter_window: u8,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            offset: 0.0,
            filter_window: 15,
        }
    }
}

/// One raw conversion. Consumed immediately by the filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSample {
    pub channel: u8,
    pub raw_count: u16,
    pub timestamp_ms: u64,
}

/// Filtered, calibrated reading in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilteredReading {
    pub channel: u8,
    pub value: f32,
    /// Filtered count before normalisation (diagnostics).
    pub counts: f32,
    pub timestamp_ms: u64,
}

// ── Persistence ──────────────────────────────────────────────

/// Load / save calibration profiles.
///
/// Every [`StoragePort`] is a calibration store: profiles are postcard blobs
/// under the `calib` namespace, one key per channel.
pub trait CalibrationStore {
    fn load_profile(&self, channel: u8) -> Result<Option<CalibrationProfile>, StorageError>;
    fn save_profile(&mut self, channel: u8, profile: &CalibrationProfile) -> Result<(), StorageError>;
}

fn profile_key(channel: u8) -> heapless::String<8> {
    let mut key = heapless::String::new();
    let _ = core::fmt::write(&mut key, format_args!("ch{channel}"));
    key
}

impl<S: StoragePort> CalibrationStore for S {
    fn load_profile(&self, channel: u8) -> Result<Option<CalibrationProfile>, StorageError> {
        let key = profile_key(channel);
        let mut buf = [0u8; 32];
        match self.read(CALIB_NAMESPACE, &key, &mut buf) {
            Ok(n) => postcard::from_bytes(&buf[..n])
                .map(Some)
                .map_err(|_| StorageError::IoError),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save_profile(&mut self, channel: u8, profile: &CalibrationProfile) -> Result<(), StorageError> {
        let bytes = postcard::to_allocvec(profile).map_err(|_| StorageError::IoError)?;
        self.write(CALIB_NAMESPACE, &profile_key(channel), &bytes)
    }
}

// ── Reader ───────────────────────────────────────────────────

pub struct CalibratedChannel {
    channel: u8,
    profile: CalibrationProfile,
    smoothing_window: u8,
    ring: Deque<u16, RING_CAP>,
    medians: Deque<f32, SMOOTH_CAP>,
}

impl CalibratedChannel {
    pub fn new(channel: u8, profile: CalibrationProfile, smoothing_window: u8) -> Self {
        let profile = CalibrationProfile {
            filter_window: profile.filter_window.clamp(1, MAX_FILTER_WINDOW),
            ..profile
        };
        Self {
            channel,
            profile,
            smoothing_window: smoothing_window.min(MAX_SMOOTHING_WINDOW),
            ring: Deque::new(),
            medians: Deque::new(),
        }
    }

    /// Build a reader from the stored profile, falling back to a zero offset.
    pub fn from_store(
        channel: u8,
        filter_window: u8,
        smoothing_window: u8,
        store: &impl CalibrationStore,
    ) -> Self {
        let profile = match store.load_profile(channel) {
            Ok(Some(p)) => {
                info!("Channel {}: loaded offset {:.3}", channel, p.offset);
                CalibrationProfile { filter_window, ..p }
            }
            Ok(None) => {
                info!("Channel {}: no stored calibration, offset 0", channel);
                CalibrationProfile {
                    offset: 0.0,
                    filter_window,
                }
            }
            Err(e) => {
                warn!("Channel {}: calibration load failed ({}), offset 0", channel, e);
                CalibrationProfile {
                    offset: 0.0,
                    filter_window,
                }
            }
        };
        Self::new(channel, profile, smoothing_window)
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn profile(&self) -> CalibrationProfile {
        self.profile
    }

    /// Read, filter and normalise one sample.
    pub fn read(
        &mut self,
        bus: &mut impl AdcBus,
        now_ms: u64,
    ) -> Result<FilteredReading, BusError> {
        let sample = self.sample(bus, now_ms)?;

        if self.ring.len() >= self.profile.filter_window as usize {
            self.ring.pop_front();
        }
        // Capacity is >= filter_window after the pop above.
        let _ = self.ring.push_back(sample.raw_count);

        let mut window: Vec<u16, RING_CAP> = self.ring.iter().copied().collect();
        let med = median(&mut window);

        let counts = if self.smoothing_window > 1 {
            if self.medians.len() >= self.smoothing_window as usize {
                self.medians.pop_front();
            }
            let _ = self.medians.push_back(med);
            self.medians.iter().sum::<f32>() / self.medians.len() as f32
        } else {
            med
        };

        let value = (counts / f32::from(ADC_MAX) - self.profile.offset).clamp(0.0, 1.0);
        Ok(FilteredReading {
            channel: self.channel,
            value,
            counts,
            timestamp_ms: sample.timestamp_ms,
        })
    }

    /// Capture `n` still samples, take their mean as the new offset and
    /// persist it.
    ///
    /// The in-memory offset is replaced only after all `n` samples were read
    /// and the profile was written.
    pub fn calibrate(
        &mut self,
        bus: &mut impl AdcBus,
        n: u16,
        max_spread: u16,
        store: &mut impl CalibrationStore,
    ) -> Result<CalibrationProfile, CalibrationError> {
        let candidate = self.measure(bus, n, max_spread)?;
        store
            .save_profile(self.channel, &candidate)
            .map_err(|_| CalibrationError::Persist)?;
        self.apply(candidate);
        Ok(candidate)
    }

    /// Sample `n` still readings and build the candidate profile. Touches
    /// neither the reader nor the store.
    pub fn measure(
        &self,
        bus: &mut impl AdcBus,
        n: u16,
        max_spread: u16,
    ) -> Result<CalibrationProfile, CalibrationError> {
        if n == 0 {
            return Err(CalibrationError::InsufficientSamples);
        }

        let mut sum: u64 = 0;
        let mut lo = u16::MAX;
        let mut hi = 0u16;
        for _ in 0..n {
            let raw = self.sample(bus, 0)?.raw_count;
            sum += u64::from(raw);
            lo = lo.min(raw);
            hi = hi.max(raw);
        }

        let spread = hi - lo;
        if spread > max_spread {
            warn!(
                "Channel {}: calibration rejected, spread {} > {}",
                self.channel, spread, max_spread
            );
            return Err(CalibrationError::Unstable { spread });
        }

        let mean = sum as f64 / f64::from(n);
        Ok(CalibrationProfile {
            offset: (mean / f64::from(ADC_MAX)) as f32,
            filter_window: self.profile.filter_window,
        })
    }

    /// Install a measured profile. The filter window stays the reader's own.
    pub fn apply(&mut self, profile: CalibrationProfile) {
        self.profile.offset = profile.offset;
        info!(
            "Channel {}: calibrated offset {:.4}",
            self.channel, profile.offset
        );
    }

    /// Override the offset in memory (not persisted). Non-finite values are
    /// ignored.
    pub fn set_offset(&mut self, value: f32) {
        if !value.is_finite() {
            warn!("Channel {}: ignoring non-finite offset", self.channel);
            return;
        }
        self.profile.offset = value.clamp(0.0, 1.0);
    }

    /// Drop filter history (e.g. after a long bus outage).
    pub fn reset_filter(&mut self) {
        self.ring.clear();
        self.medians.clear();
    }

    fn sample(&self, bus: &mut impl AdcBus, now_ms: u64) -> Result<RawSample, BusError> {
        let raw_count = bus.read_channel(self.channel)?;
        if raw_count > ADC_MAX {
            return Err(BusError::OutOfRange(raw_count));
        }
        Ok(RawSample {
            channel: self.channel,
            raw_count,
            timestamp_ms: now_ms,
        })
    }
}

/// Median of `samples` (sorted in place). Mean of the middle pair for even
/// lengths; `0.0` for an empty slice.
pub fn median(samples: &mut [u16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.sort_unstable();
    let mid = samples.len() / 2;
    if samples.len() % 2 == 1 {
        f32::from(samples[mid])
    } else {
        (f32::from(samples[mid - 1]) + f32::from(samples[mid])) / 2.0
    }
}
