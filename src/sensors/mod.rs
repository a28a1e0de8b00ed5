//! Sensor subsystem: calibrated channel readers and the motion estimator.
//!
//! Readers are built here from [`SystemConfig`] and the persisted
//! calibration profiles, in one place where bus ownership is established.

pub mod channel;
pub mod motion;

use crate::app::ports::AdcBus;
use crate::config::SystemConfig;
use channel::{CalibratedChannel, CalibrationStore};
use motion::MotionEstimator;

/// Build the 3-axis estimator with offsets loaded from `store`.
pub fn motion_estimator<B: AdcBus>(
    cfg: &SystemConfig,
    bus: B,
    store: &impl CalibrationStore,
) -> MotionEstimator<B> {
    let axis = |ch| CalibratedChannel::from_store(ch, cfg.filter_window, cfg.smoothing_window, store);
    MotionEstimator::new(
        bus,
        axis(cfg.accel_x_channel),
        axis(cfg.accel_y_channel),
        axis(cfg.accel_z_channel),
    )
}

/// Build the ambient light reader with its offset loaded from `store`.
pub fn light_channel(cfg: &SystemConfig, store: &impl CalibrationStore) -> CalibratedChannel {
    CalibratedChannel::from_store(
        cfg.light_channel,
        cfg.filter_window,
        cfg.smoothing_window,
        store,
    )
}
