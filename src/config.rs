//! System configuration parameters
//!
//! All tunable parameters for CareWatch. Values can be overridden via the
//! persisted `syscfg` blob or, for deployment secrets, environment variables.

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::pins;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Sampling / filtering ---
    /// Motion loop period (milliseconds)
    pub sample_interval_ms: u32,
    /// Median ring-buffer depth per channel
    pub filter_window: u8,
    /// Moving-average depth applied to medians (0 or 1 disables)
    pub smoothing_window: u8,

    // --- Motion / impact ---
    /// Magnitude above which the wearer is considered moving
    pub motion_threshold: f32,
    /// Tick-to-tick magnitude delta that raises a suspected impact
    pub impact_threshold: f32,
    /// How long the elevated magnitude must persist to confirm a fall (ms)
    pub confirmation_window_ms: u32,

    // --- Health check ---
    /// Time the wearer has to answer the check-in prompt (seconds)
    pub health_check_timeout_secs: u32,

    // --- Alerts ---
    /// Webhook endpoint; `None` disables delivery
    pub webhook_url: Option<String>,
    /// Title line of the alert body
    pub alert_title: String,
    /// Delivery attempts per job (including the first)
    pub alert_max_attempts: u8,
    /// First retry delay; doubles per attempt (ms)
    pub alert_backoff_ms: u32,
    /// Per-request HTTP timeout (seconds)
    pub alert_request_timeout_secs: u32,

    // --- Ambient ---
    /// Ambient loop period (milliseconds)
    pub ambient_interval_ms: u32,
    /// Normalised light level below which the room is dark
    pub dark_threshold: f32,
    /// Consecutive opposite readings required before flipping
    pub ambient_dwell_checks: u8,
    /// Background playback volume (0.0–1.0)
    pub ambient_volume: f32,

    // --- Inference ---
    /// Emotion score cache lifetime (seconds)
    pub emotion_cache_ttl_secs: u32,
    /// Remote classification calls refilled per second
    pub inference_rate_per_sec: u32,
    /// Remote classification burst capacity
    pub inference_burst: u32,

    // --- Calibration ---
    /// Still samples taken per axis during calibration
    pub calibration_samples: u16,
    /// Maximum raw spread accepted as "stationary" (counts)
    pub calibration_max_spread: u16,

    // --- Channels ---
    pub accel_x_channel: u8,
    pub accel_y_channel: u8,
    pub accel_z_channel: u8,
    pub light_channel: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Sampling
            sample_interval_ms: 100, // 10 Hz
            filter_window: 15,
            smoothing_window: 1, // median only

            // Motion / impact
            motion_threshold: 0.1,
            impact_threshold: 0.3,
            confirmation_window_ms: 200,

            // Health check
            health_check_timeout_secs: 30,

            // Alerts
            webhook_url: None,
            alert_title: String::from("Fall detected - check-in required"),
            alert_max_attempts: 3,
            alert_backoff_ms: 1000,
            alert_request_timeout_secs: 10,

            // Ambient
            ambient_interval_ms: 2000,
            dark_threshold: 0.58,
            ambient_dwell_checks: 2,
            ambient_volume: 0.4,

            // Inference
            emotion_cache_ttl_secs: 15,
            inference_rate_per_sec: 1,
            inference_burst: 3,

            // Calibration
            calibration_samples: 50,
            calibration_max_spread: 200,

            // Channels
            accel_x_channel: pins::ACCEL_X_CHANNEL,
            accel_y_channel: pins::ACCEL_Y_CHANNEL,
            accel_z_channel: pins::ACCEL_Z_CHANNEL,
            light_channel: pins::LIGHT_CHANNEL,
        }
    }
}

/// Upper bound on `filter_window`; matches the reader's fixed ring capacity.
pub const MAX_FILTER_WINDOW: u8 = 32;
/// Upper bound on `smoothing_window`.
pub const MAX_SMOOTHING_WINDOW: u8 = 8;

impl SystemConfig {
    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(20..=1000).contains(&self.sample_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "sample_interval_ms must be 20–1000",
            ));
        }
        if !(1..=MAX_FILTER_WINDOW).contains(&self.filter_window) {
            return Err(ConfigError::ValidationFailed("filter_window must be 1–32"));
        }
        if self.smoothing_window > MAX_SMOOTHING_WINDOW {
            return Err(ConfigError::ValidationFailed(
                "smoothing_window must be 0–8",
            ));
        }
        if !(0.0..=1.0).contains(&self.motion_threshold) {
            return Err(ConfigError::ValidationFailed(
                "motion_threshold must be 0.0–1.0",
            ));
        }
        if !(0.01..=1.5).contains(&self.impact_threshold) {
            return Err(ConfigError::ValidationFailed(
                "impact_threshold must be 0.01–1.5",
            ));
        }
        if self.confirmation_window_ms > 5000 {
            return Err(ConfigError::ValidationFailed(
                "confirmation_window_ms must be 0–5000",
            ));
        }
        if !(5..=600).contains(&self.health_check_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "health_check_timeout_secs must be 5–600",
            ));
        }
        if let Some(url) = &self.webhook_url {
            if !(url.starts_with("https://") || url.starts_with("http://")) {
                return Err(ConfigError::ValidationFailed(
                    "webhook_url must be an http(s) URL",
                ));
            }
        }
        if !(1..=10).contains(&self.alert_max_attempts) {
            return Err(ConfigError::ValidationFailed(
                "alert_max_attempts must be 1–10",
            ));
        }
        if self.alert_backoff_ms > 30_000 {
            return Err(ConfigError::ValidationFailed(
                "alert_backoff_ms must be 0–30000",
            ));
        }
        if !(1..=120).contains(&self.alert_request_timeout_secs) {
            return Err(ConfigError::ValidationFailed(
                "alert_request_timeout_secs must be 1–120",
            ));
        }
        if !(100..=60_000).contains(&self.ambient_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "ambient_interval_ms must be 100–60000",
            ));
        }
        if !(0.0..=1.0).contains(&self.dark_threshold) {
            return Err(ConfigError::ValidationFailed(
                "dark_threshold must be 0.0–1.0",
            ));
        }
        if !(1..=20).contains(&self.ambient_dwell_checks) {
            return Err(ConfigError::ValidationFailed(
                "ambient_dwell_checks must be 1–20",
            ));
        }
        if !(0.0..=1.0).contains(&self.ambient_volume) {
            return Err(ConfigError::ValidationFailed(
                "ambient_volume must be 0.0–1.0",
            ));
        }
        if !(1..=3600).contains(&self.emotion_cache_ttl_secs) {
            return Err(ConfigError::ValidationFailed(
                "emotion_cache_ttl_secs must be 1–3600",
            ));
        }
        if self.inference_rate_per_sec == 0 || self.inference_burst == 0 {
            return Err(ConfigError::ValidationFailed(
                "inference rate and burst must be non-zero",
            ));
        }
        if !(1..=1000).contains(&self.calibration_samples) {
            return Err(ConfigError::ValidationFailed(
                "calibration_samples must be 1–1000",
            ));
        }
        let channels = [
            self.accel_x_channel,
            self.accel_y_channel,
            self.accel_z_channel,
            self.light_channel,
        ];
        if channels.iter().any(|&ch| ch >= pins::ADC_CHANNELS) {
            return Err(ConfigError::ValidationFailed("ADC channels must be 0–7"));
        }
        for (i, a) in channels.iter().enumerate() {
            if channels[i + 1..].contains(a) {
                return Err(ConfigError::ValidationFailed(
                    "ADC channels must be distinct",
                ));
            }
        }
        Ok(())
    }
}
