//! 3-axis motion estimator.
//!
//! Composes three calibrated accelerometer channels into a vector and a
//! scalar magnitude once per tick. Owns its bus handle; the motion loop is
//! the only caller.

use log::{info, warn};

use super::channel::{CalibratedChannel, CalibrationProfile, CalibrationStore, FilteredReading};
use crate::app::ports::AdcBus;
use crate::error::{BusError, CalibrationError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionVector {
    pub x: FilteredReading,
    pub y: FilteredReading,
    pub z: FilteredReading,
    /// `sqrt(x² + y² + z²)` of the calibrated components; never negative.
    pub magnitude: f32,
}

impl MotionVector {
    pub fn from_axes(x: FilteredReading, y: FilteredReading, z: FilteredReading) -> Self {
        let magnitude = (x.value * x.value + y.value * y.value + z.value * z.value).sqrt();
        Self { x, y, z, magnitude }
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.x.timestamp_ms
    }
}

pub struct MotionEstimator<B: AdcBus> {
    bus: B,
    axes: [CalibratedChannel; 3],
    last: Option<MotionVector>,
}

impl<B: AdcBus> MotionEstimator<B> {
    pub fn new(bus: B, x: CalibratedChannel, y: CalibratedChannel, z: CalibratedChannel) -> Self {
        Self {
            bus,
            axes: [x, y, z],
            last: None,
        }
    }

    /// Read all three axes. A failure on any axis fails the whole tick.
    pub fn sample(&mut self, now_ms: u64) -> Result<MotionVector, BusError> {
        let [x, y, z] = &mut self.axes;
        let rx = x.read(&mut self.bus, now_ms)?;
        let ry = y.read(&mut self.bus, now_ms)?;
        let rz = z.read(&mut self.bus, now_ms)?;
        let v = MotionVector::from_axes(rx, ry, rz);
        self.last = Some(v);
        Ok(v)
    }

    /// Whether the last sampled magnitude exceeds `threshold`.
    pub fn is_moving(&self, threshold: f32) -> bool {
        self.last.is_some_and(|v| v.magnitude > threshold)
    }

    pub fn last(&self) -> Option<MotionVector> {
        self.last
    }

    /// Recalibrate every axis. The device must be held still.
    ///
    /// All three axes are measured before anything is written. The profiles
    /// are persisted together and swapped in only once every axis succeeded;
    /// a failed write puts the previous profiles back in the store. Filter
    /// history is dropped whatever the outcome.
    pub fn calibrate_all(
        &mut self,
        samples: u16,
        max_spread: u16,
        store: &mut impl CalibrationStore,
    ) -> Result<[CalibrationProfile; 3], CalibrationError> {
        let result = self.calibrate_axes(samples, max_spread, store);
        for axis in &mut self.axes {
            axis.reset_filter();
        }
        self.last = None;
        let out = result?;
        info!(
            "Motion: calibrated offsets x={:.3} y={:.3} z={:.3}",
            out[0].offset, out[1].offset, out[2].offset
        );
        Ok(out)
    }

    fn calibrate_axes(
        &mut self,
        samples: u16,
        max_spread: u16,
        store: &mut impl CalibrationStore,
    ) -> Result<[CalibrationProfile; 3], CalibrationError> {
        let mut out = [CalibrationProfile::default(); 3];
        for (slot, axis) in out.iter_mut().zip(self.axes.iter()) {
            *slot = axis.measure(&mut self.bus, samples, max_spread)?;
        }

        for (i, (axis, profile)) in self.axes.iter().zip(out.iter()).enumerate() {
            if let Err(e) = store.save_profile(axis.channel(), profile) {
                warn!(
                    "Motion: persisting ch{} failed ({}), restoring previous offsets",
                    axis.channel(),
                    e
                );
                for prev in &self.axes[..i] {
                    let _ = store.save_profile(prev.channel(), &prev.profile());
                }
                return Err(CalibrationError::Persist);
            }
        }

        for (axis, profile) in self.axes.iter_mut().zip(out) {
            axis.apply(profile);
        }
        Ok(out)
    }

    pub fn axes(&self) -> &[CalibratedChannel; 3] {
        &self.axes
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }
}
