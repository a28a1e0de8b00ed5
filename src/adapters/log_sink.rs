//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every application event to the `log`
//! facade, one line per event. Failure events go out at `warn` so they stand
//! out on the console.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the console.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn record(&mut self, event: &AppEvent) {
        let details = serde_json::Value::Object(event.details());
        match event {
            AppEvent::FallDetected(f) => {
                warn!(
                    "FALL  | magnitude={:.3} suspected={}ms confirmed={}ms",
                    f.magnitude, f.suspected_at_ms, f.timestamp_ms
                );
            }
            AppEvent::FallQueueOverflow(_)
            | AppEvent::AlertDeliveryFailed { .. }
            | AppEvent::DetectionUnavailable(_) => {
                warn!("EVENT | {} | {}", event.event_type(), details);
            }
            AppEvent::HealthCheckResolved { outcome, .. } => {
                info!("CHECK | resolved {} | {}", outcome.as_str(), details);
            }
            AppEvent::AmbientTransition { is_dark, track, .. } => {
                info!(
                    "LIGHT | {} track={}",
                    if *is_dark { "dark" } else { "bright" },
                    track.as_deref().unwrap_or("-")
                );
            }
            _ => info!("EVENT | {} | {}", event.event_type(), details),
        }
    }
}
