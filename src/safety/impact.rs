//! Impact state machine.
//!
//! Watches the magnitude stream for a sudden tick-to-tick jump and confirms
//! a fall only if the reading stays away from the pre-impact baseline for the
//! whole confirmation window.
//!
//! | State     | Trigger                                          | Next      | Side effect              |
//! |-----------|--------------------------------------------------|-----------|--------------------------|
//! | Idle      | `|m_t − m_{t−1}| > threshold`                    | Suspected | record `since`, baseline |
//! | Suspected | `|m − baseline| > threshold` for `>= window`     | Idle      | emit `FallDetected`      |
//! | Suspected | `|m − baseline| <= threshold` before the window  | Idle      | discard (jostle)         |
//!
//! A new jump while `Suspected` keeps the original `since` timestamp, so
//! sustained shaking cannot postpone confirmation forever.
//!
//! After a confirmed fall the pre-impact baseline is remembered as the rest
//! level: getting back up to it is a recovery, not a second impact.

use log::{debug, info};

use crate::config::SystemConfig;

/// Emitted exactly once per confirmed episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallDetected {
    /// Magnitude of the confirming sample.
    pub magnitude: f32,
    /// Time of confirmation.
    pub timestamp_ms: u64,
    /// Time of the first triggering jump.
    pub suspected_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpactState {
    Idle,
    Suspected { since_ms: u64, baseline: f32 },
}

pub struct ImpactDetector {
    threshold: f32,
    window_ms: u64,
    state: ImpactState,
    prev: Option<f32>,
    rest: Option<f32>,
}

impl ImpactDetector {
    pub fn new(threshold: f32, window_ms: u64) -> Self {
        Self {
            threshold,
            window_ms,
            state: ImpactState::Idle,
            prev: None,
            rest: None,
        }
    }

    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self::new(cfg.impact_threshold, u64::from(cfg.confirmation_window_ms))
    }

    pub fn state(&self) -> ImpactState {
        self.state
    }

    /// Feed one magnitude sample. Returns `Some` on the confirming tick only.
    pub fn observe(&mut self, magnitude: f32, timestamp_ms: u64) -> Option<FallDetected> {
        let prev = self.prev.replace(magnitude);

        if self.state == ImpactState::Idle {
            if let Some(rest) = self.rest {
                if (magnitude - rest).abs() <= self.threshold {
                    debug!("Impact: back at rest level {:.3}", rest);
                    self.rest = None;
                    return None;
                }
            }
            let p = prev?;
            if (magnitude - p).abs() <= self.threshold {
                return None;
            }
            debug!(
                "Impact: suspected at {}ms ({:.3} -> {:.3})",
                timestamp_ms, p, magnitude
            );
            self.state = ImpactState::Suspected {
                since_ms: timestamp_ms,
                baseline: p,
            };
        }

        let ImpactState::Suspected { since_ms, baseline } = self.state else {
            return None;
        };

        if (magnitude - baseline).abs() <= self.threshold {
            debug!("Impact: discarded, settled after {}ms", timestamp_ms.saturating_sub(since_ms));
            self.state = ImpactState::Idle;
            return None;
        }

        if timestamp_ms.saturating_sub(since_ms) < self.window_ms {
            return None;
        }

        info!(
            "Impact: fall confirmed at {}ms (suspected {}ms, magnitude {:.3})",
            timestamp_ms, since_ms, magnitude
        );
        self.state = ImpactState::Idle;
        self.rest = Some(baseline);
        Some(FallDetected {
            magnitude,
            timestamp_ms,
            suspected_at_ms: since_ms,
        })
    }

    /// Forget history (e.g. after a bus outage left a gap in the stream).
    pub fn reset(&mut self) {
        self.state = ImpactState::Idle;
        self.prev = None;
        self.rest = None;
    }
}
