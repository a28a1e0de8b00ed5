//! Motion monitor: one motion-loop tick.
//!
//! [`MotionMonitor`] owns the motion estimator and the impact detector.
//! All I/O flows through the bus owned by the estimator and the event sink
//! injected at the call site, so the whole tick is testable with a scripted
//! bus and simulated time.
//!
//! ```text
//!  AdcBus ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!             │        MotionMonitor          │
//!             │  MotionEstimator · Impact FSM │ ──▶ FallDetected (to safety loop)
//!             └──────────────────────────────┘
//! ```
//!
//! A bus failure skips the tick. The first failure of an outage is recorded
//! as "fall detection unavailable"; the first good tick afterwards records
//! the recovery.

use log::{debug, info, warn};

use super::events::AppEvent;
use super::ports::{AdcBus, EventSink};
use crate::config::SystemConfig;
use crate::error::CalibrationError;
use crate::safety::impact::{FallDetected, ImpactDetector};
use crate::sensors::channel::{CalibrationProfile, CalibrationStore};
use crate::sensors::motion::{MotionEstimator, MotionVector};

pub struct MotionMonitor<B: AdcBus> {
    estimator: MotionEstimator<B>,
    detector: ImpactDetector,
    failed_ticks: u32,
    unavailable: bool,
    tick_count: u64,
}

impl<B: AdcBus> MotionMonitor<B> {
    pub fn new(estimator: MotionEstimator<B>, detector: ImpactDetector) -> Self {
        Self {
            estimator,
            detector,
            failed_ticks: 0,
            unavailable: false,
            tick_count: 0,
        }
    }

    pub fn from_config(cfg: &SystemConfig, estimator: MotionEstimator<B>) -> Self {
        Self::new(estimator, ImpactDetector::from_config(cfg))
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Sample → observe → record. Returns the fall on its confirming tick.
    pub fn tick(&mut self, now_ms: u64, sink: &mut impl EventSink) -> Option<FallDetected> {
        self.tick_count += 1;

        let vector = match self.estimator.sample(now_ms) {
            Ok(v) => v,
            Err(e) => {
                self.failed_ticks = self.failed_ticks.saturating_add(1);
                if !self.unavailable {
                    self.unavailable = true;
                    self.detector.reset();
                    warn!("Monitor: fall detection unavailable: {}", e);
                    sink.record(&AppEvent::DetectionUnavailable(e));
                } else {
                    debug!("Monitor: bus still failing ({} ticks): {}", self.failed_ticks, e);
                }
                return None;
            }
        };

        if self.unavailable {
            info!("Monitor: bus recovered after {} failed ticks", self.failed_ticks);
            sink.record(&AppEvent::DetectionRestored {
                failed_ticks: self.failed_ticks,
            });
            self.unavailable = false;
        }
        self.failed_ticks = 0;

        let fall = self.detector.observe(vector.magnitude, now_ms)?;
        sink.record(&AppEvent::FallDetected(fall));
        Some(fall)
    }

    // ── Calibration ───────────────────────────────────────────

    /// Recalibrate all axes (device held still). The detector is re-armed
    /// after every attempt, failed ones included.
    pub fn recalibrate(
        &mut self,
        samples: u16,
        max_spread: u16,
        store: &mut impl CalibrationStore,
        sink: &mut impl EventSink,
    ) -> Result<[CalibrationProfile; 3], CalibrationError> {
        let result = self.estimator.calibrate_all(samples, max_spread, store);
        self.detector.reset();
        let profiles = result?;
        for (axis, profile) in self.estimator.axes().iter().zip(profiles.iter()) {
            sink.record(&AppEvent::CalibrationCompleted {
                channel: axis.channel(),
                offset: profile.offset,
            });
        }
        Ok(profiles)
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn is_available(&self) -> bool {
        !self.unavailable
    }

    pub fn is_moving(&self, threshold: f32) -> bool {
        self.estimator.is_moving(threshold)
    }

    pub fn last_vector(&self) -> Option<MotionVector> {
        self.estimator.last()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn estimator_mut(&mut self) -> &mut MotionEstimator<B> {
        &mut self.estimator
    }
}
