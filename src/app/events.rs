//! Outbound application events.
//!
//! The domain types emit these through the [`EventSink`](super::ports::EventSink)
//! port. Each event renders to the event-log record shape consumed by the
//! dashboard: an `event_type` string plus a `details` JSON map.

use serde_json::{Map, Value, json};

use crate::error::{BusError, DispatchError, QueueOverflowError};
use crate::safety::alert::AlertReason;
use crate::safety::health_check::SessionState;
use crate::safety::impact::FallDetected;

/// Structured events emitted by the core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The impact state machine confirmed a fall.
    FallDetected(FallDetected),

    /// A pending fall was evicted from the bounded queue.
    FallQueueOverflow(QueueOverflowError),

    /// A check-in prompt was issued.
    HealthCheckOpened { episode_ts: u64, deadline_ms: u64 },

    /// A session reached a terminal state.
    HealthCheckResolved {
        outcome: SessionState,
        episode_ts: u64,
        response_text: Option<String>,
    },

    /// An inbound reply did not resolve the open session.
    HealthCheckUnrecognized { text: String },

    /// The webhook accepted an alert.
    AlertSent {
        reason: AlertReason,
        episode_ts: u64,
        attempts: u8,
    },

    /// An alert was dropped after exhausting its attempts (or never queued).
    AlertDeliveryFailed {
        reason: AlertReason,
        episode_ts: u64,
        attempts: u8,
        error: DispatchError,
    },

    /// The ambient reactor flipped between dark and bright.
    AmbientTransition {
        is_dark: bool,
        reading: f32,
        track: Option<String>,
    },

    /// The accelerometer bus failed; fall detection is paused.
    DetectionUnavailable(BusError),

    /// The accelerometer bus recovered.
    DetectionRestored { failed_ticks: u32 },

    /// A channel was recalibrated.
    CalibrationCompleted { channel: u8, offset: f32 },
}

impl AppEvent {
    /// Stable identifier written to the `event_type` column.
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::FallDetected(_) => "fall_detected",
            Self::FallQueueOverflow(_) => "fall_queue_overflow",
            Self::HealthCheckOpened { .. } => "health_check_initiated",
            Self::HealthCheckResolved { .. } => "health_check_resolved",
            Self::HealthCheckUnrecognized { .. } => "health_check_unrecognized",
            Self::AlertSent { .. } => "alert_sent",
            Self::AlertDeliveryFailed { .. } => "alert_delivery_failed",
            Self::AmbientTransition { .. } => "ambient_transition",
            Self::DetectionUnavailable(_) => "fall_detection_unavailable",
            Self::DetectionRestored { .. } => "fall_detection_restored",
            Self::CalibrationCompleted { .. } => "calibration_completed",
        }
    }

    /// Free-form details map written alongside the event type.
    pub fn details(&self) -> Map<String, Value> {
        let v = match self {
            Self::FallDetected(f) => json!({
                "magnitude": f.magnitude,
                "timestamp_ms": f.timestamp_ms,
                "suspected_at_ms": f.suspected_at_ms,
            }),
            Self::FallQueueOverflow(e) => json!({
                "dropped_timestamp_ms": e.dropped_timestamp_ms,
                "capacity": e.capacity,
            }),
            Self::HealthCheckOpened {
                episode_ts,
                deadline_ms,
            } => json!({ "episode_ts": episode_ts, "deadline_ms": deadline_ms }),
            Self::HealthCheckResolved {
                outcome,
                episode_ts,
                response_text,
            } => json!({
                "outcome": outcome.as_str(),
                "episode_ts": episode_ts,
                "response_text": response_text,
            }),
            Self::HealthCheckUnrecognized { text } => json!({ "text": text }),
            Self::AlertSent {
                reason,
                episode_ts,
                attempts,
            } => json!({
                "reason": reason.as_str(),
                "episode_ts": episode_ts,
                "attempts": attempts,
            }),
            Self::AlertDeliveryFailed {
                reason,
                episode_ts,
                attempts,
                error,
            } => json!({
                "reason": reason.as_str(),
                "episode_ts": episode_ts,
                "attempts": attempts,
                "error": error.to_string(),
            }),
            Self::AmbientTransition {
                is_dark,
                reading,
                track,
            } => json!({ "is_dark": is_dark, "reading": reading, "track": track }),
            Self::DetectionUnavailable(e) => json!({ "error": e.to_string() }),
            Self::DetectionRestored { failed_ticks } => json!({ "failed_ticks": failed_ticks }),
            Self::CalibrationCompleted { channel, offset } => {
                json!({ "channel": channel, "offset": offset })
            }
        };
        match v {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}
