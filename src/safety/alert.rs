//! Alert dispatch: escalation jobs delivered to an external webhook.
//!
//! ```text
//!  ┌────────────────┐  try_send   ┌──────────────┐  worker thread  ┌──────────┐
//!  │ HealthCheck    │───────────▶│ AlertQueue    │────────────────▶│ Webhook  │
//!  │ (safety loop)  │  never      │ depth 8       │  retry+backoff  │ (HTTPS)  │
//!  └────────────────┘  blocks     └──────────────┘                 └──────────┘
//! ```
//!
//! Accepting a job only enqueues it. Network latency and failures stay on
//! the worker; a job that exhausts its attempts is recorded as
//! `alert_delivery_failed` and dropped.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, SecondsFormat, Utc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{info, warn};
use serde::Serialize;

use crate::app::events::AppEvent;
use crate::app::ports::{AlertSink, EventSink, WebhookPort};
use crate::config::SystemConfig;
use crate::error::DispatchError;

/// Queue depth between the safety loop and the delivery worker.
pub const ALERT_QUEUE_DEPTH: usize = 8;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// How often an idle worker re-checks the stop flag.
const IDLE_POLL: Duration = Duration::from_millis(500);

pub type AlertQueue = Channel<CriticalSectionRawMutex, AlertJob, ALERT_QUEUE_DEPTH>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertReason {
    #[serde(rename = "NEEDS_HELP")]
    NeedsHelp,
    #[serde(rename = "NO_RESPONSE")]
    NoResponse,
}

impl AlertReason {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeedsHelp => "NEEDS_HELP",
            Self::NoResponse => "NO_RESPONSE",
        }
    }
}

/// One escalation, owned by the dispatcher until delivered or exhausted.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertJob {
    pub reason: AlertReason,
    pub episode_timestamp_ms: u64,
    pub response_text: Option<String>,
    pub attempt_count: u8,
}

impl AlertJob {
    pub fn new(reason: AlertReason, episode_timestamp_ms: u64, response_text: Option<String>) -> Self {
        Self {
            reason,
            episode_timestamp_ms,
            response_text,
            attempt_count: 0,
        }
    }
}

/// JSON body posted to the webhook.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub title: &'a str,
    pub timestamp: String,
    pub reason: AlertReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_text: Option<&'a str>,
}

impl<'a> WebhookPayload<'a> {
    pub fn new(title: &'a str, job: &'a AlertJob) -> Self {
        Self {
            title,
            timestamp: rfc3339(job.episode_timestamp_ms),
            reason: job.reason,
            response_text: job.response_text.as_deref(),
        }
    }
}

/// Milliseconds since the Unix epoch as an RFC 3339 UTC string.
pub fn rfc3339(epoch_ms: u64) -> String {
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .map_or_else(
            || epoch_ms.to_string(),
            |t| t.to_rfc3339_opts(SecondsFormat::Millis, true),
        )
}

// ── Producer side ────────────────────────────────────────────

/// Cloneable handle that enqueues jobs without blocking.
#[derive(Clone)]
pub struct AlertDispatcher {
    queue: Arc<AlertQueue>,
}

impl AlertDispatcher {
    pub fn new(queue: Arc<AlertQueue>) -> Self {
        Self { queue }
    }

    /// Enqueue `job`. Returns immediately; `QueueFull` if the worker is
    /// behind by more than [`ALERT_QUEUE_DEPTH`] jobs.
    pub fn dispatch(&self, job: AlertJob) -> Result<(), DispatchError> {
        self.queue.try_send(job).map_err(|_| {
            warn!("Alert: queue full, job rejected");
            DispatchError::QueueFull
        })
    }
}

impl AlertSink for AlertDispatcher {
    fn submit(&mut self, job: AlertJob) -> Result<(), DispatchError> {
        self.dispatch(job)
    }
}

// ── Retry policy ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u8,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self {
            max_attempts: cfg.alert_max_attempts.max(1),
            base_backoff: Duration::from_millis(u64::from(cfg.alert_backoff_ms)),
        }
    }

    /// Delay before attempt `attempt + 1` (1-based `attempt`).
    pub fn backoff(&self, attempt: u8) -> Duration {
        let shift = u32::from(attempt.saturating_sub(1)).min(16);
        self.base_backoff
            .checked_mul(1 << shift)
            .unwrap_or(MAX_BACKOFF)
            .min(MAX_BACKOFF)
    }
}

/// Attempt delivery until success, a non-retryable error, or the attempt
/// budget runs out. `sleep` is called between attempts.
pub fn deliver_with_retry(
    job: &mut AlertJob,
    title: &str,
    webhook: &mut impl WebhookPort,
    policy: RetryPolicy,
    sleep: &mut impl FnMut(Duration),
) -> Result<(), DispatchError> {
    let body = serde_json::to_value(WebhookPayload::new(title, job))
        .map_err(|_| DispatchError::Encode)?;

    loop {
        job.attempt_count = job.attempt_count.saturating_add(1);
        match webhook.post_json(&body) {
            Ok(()) => return Ok(()),
            Err(e) if !e.is_retryable() || job.attempt_count >= policy.max_attempts => {
                return Err(e);
            }
            Err(e) => {
                let delay = policy.backoff(job.attempt_count);
                warn!(
                    "Alert: attempt {}/{} failed ({}), retrying in {}ms",
                    job.attempt_count,
                    policy.max_attempts,
                    e,
                    delay.as_millis()
                );
                sleep(delay);
            }
        }
    }
}

// ── Worker ───────────────────────────────────────────────────

/// Drains the alert queue on its own thread.
pub struct AlertWorker<W, E> {
    queue: Arc<AlertQueue>,
    webhook: W,
    events: E,
    policy: RetryPolicy,
    title: String,
}

impl<W: WebhookPort, E: EventSink> AlertWorker<W, E> {
    pub fn new(queue: Arc<AlertQueue>, webhook: W, events: E, cfg: &SystemConfig) -> Self {
        Self {
            queue,
            webhook,
            events,
            policy: RetryPolicy::from_config(cfg),
            title: cfg.alert_title.clone(),
        }
    }

    /// Deliver one job and record the outcome.
    pub fn handle(&mut self, mut job: AlertJob, sleep: &mut impl FnMut(Duration)) {
        let result = deliver_with_retry(&mut job, &self.title, &mut self.webhook, self.policy, sleep);
        match result {
            Ok(()) => {
                info!(
                    "Alert: {} delivered after {} attempt(s)",
                    job.reason.as_str(),
                    job.attempt_count
                );
                self.events.record(&AppEvent::AlertSent {
                    reason: job.reason,
                    episode_ts: job.episode_timestamp_ms,
                    attempts: job.attempt_count,
                });
            }
            Err(error) => {
                warn!(
                    "Alert: {} dropped after {} attempt(s): {}",
                    job.reason.as_str(),
                    job.attempt_count,
                    error
                );
                self.events.record(&AppEvent::AlertDeliveryFailed {
                    reason: job.reason,
                    episode_ts: job.episode_timestamp_ms,
                    attempts: job.attempt_count,
                    error,
                });
            }
        }
    }

    /// Take the next job without waiting.
    pub fn try_next(&self) -> Option<AlertJob> {
        self.queue.try_receive().ok()
    }

    /// Block the calling thread, delivering jobs until `stop` is set.
    pub fn run(mut self, stop: &AtomicBool) {
        info!("Alert: worker started");
        let mut sleep = std::thread::sleep;
        while !stop.load(Ordering::Acquire) {
            let next = futures_lite::future::block_on(futures_lite::future::or(
                async { Some(self.queue.receive().await) },
                async {
                    async_io_mini::Timer::after(IDLE_POLL).await;
                    None
                },
            ));
            if let Some(job) = next {
                self.handle(job, &mut sleep);
            }
        }
        info!("Alert: worker stopped");
    }
}
