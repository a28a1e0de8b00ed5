//! Health-check orchestrator.
//!
//! Drives one check-in session per confirmed fall:
//!
//! ```text
//!   FallDetected ──▶ AwaitingResponse ──┬── "I'm okay" ─────▶ ResolvedOk    (silent close)
//!                    prompt + deadline  ├── "help" / "no" ──▶ ResolvedHelp  ─┐
//!                                       └── deadline ───────▶ TimedOut      ─┴─▶ AlertJob
//! ```
//!
//! Only one session is open at a time. Falls that arrive while a session is
//! open wait in a bounded FIFO and open, in order, as soon as the current
//! session reaches a terminal state. On overflow the oldest pending fall is
//! dropped and the drop is recorded.
//!
//! The orchestrator is a pure state machine: time is passed in, and all I/O
//! goes through the [`HealthCheckIo`] ports, so the runtime decides how to
//! wait (reply channel vs. deadline timer).

use core::time::Duration;

use heapless::Deque;
use log::{debug, info, warn};

use super::alert::{AlertJob, AlertReason};
use super::impact::FallDetected;
use super::response::{ResponseClass, ResponsePolicy};
use crate::app::events::AppEvent;
use crate::app::ports::{AlertSink, EventSink, PromptSink};
use crate::config::SystemConfig;
use crate::error::QueueOverflowError;

/// Pending falls held while a session is open.
pub const FALL_QUEUE_DEPTH: usize = 4;

pub const DEFAULT_PROMPT: &str =
    "I detected a fall. Are you okay? Please respond with 'yes' or 'I'm okay' if you're fine.";

/// Everything a session needs from the outside world.
pub trait HealthCheckIo: PromptSink + AlertSink + EventSink {}

impl<T: PromptSink + AlertSink + EventSink> HealthCheckIo for T {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    AwaitingResponse,
    ResolvedOk,
    ResolvedHelp,
    TimedOut,
}

impl SessionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AwaitingResponse => "awaiting_response",
            Self::ResolvedOk => "resolved_ok",
            Self::ResolvedHelp => "resolved_help",
            Self::TimedOut => "timed_out",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::AwaitingResponse)
    }

    const fn alert_reason(self) -> Option<AlertReason> {
        match self {
            Self::ResolvedHelp => Some(AlertReason::NeedsHelp),
            Self::TimedOut => Some(AlertReason::NoResponse),
            Self::AwaitingResponse | Self::ResolvedOk => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthCheckSession {
    pub state: SessionState,
    pub episode: FallDetected,
    pub opened_at_ms: u64,
    pub deadline_ms: u64,
    pub response_text: Option<String>,
}

/// Terminal outcome of one session.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub state: SessionState,
    pub episode: FallDetected,
    pub response_text: Option<String>,
    /// Reason of the escalation handed to the dispatcher, if any.
    pub alert: Option<AlertReason>,
}

pub struct HealthCheckOrchestrator {
    policy: ResponsePolicy,
    timeout_ms: u64,
    prompt: String,
    session: Option<HealthCheckSession>,
    pending: Deque<FallDetected, FALL_QUEUE_DEPTH>,
}

impl HealthCheckOrchestrator {
    pub fn new(policy: ResponsePolicy, timeout: Duration) -> Self {
        Self {
            policy,
            timeout_ms: timeout.as_millis() as u64,
            prompt: String::from(DEFAULT_PROMPT),
            session: None,
            pending: Deque::new(),
        }
    }

    pub fn from_config(cfg: &SystemConfig) -> Self {
        Self::new(
            ResponsePolicy::default(),
            Duration::from_secs(u64::from(cfg.health_check_timeout_secs)),
        )
    }

    #[must_use]
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = String::from(prompt);
        self
    }

    pub fn session(&self) -> Option<&HealthCheckSession> {
        self.session.as_ref()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Time left before the open session times out; `None` when idle.
    pub fn time_until_deadline(&self, now_ms: u64) -> Option<Duration> {
        self.session
            .as_ref()
            .map(|s| Duration::from_millis(s.deadline_ms.saturating_sub(now_ms)))
    }

    /// Open a session for `event`, or queue it behind the open one.
    pub fn on_fall_detected(&mut self, event: FallDetected, now_ms: u64, io: &mut impl HealthCheckIo) {
        if self.session.is_none() {
            self.open(event, now_ms, io);
            return;
        }

        if self.pending.is_full() {
            if let Some(dropped) = self.pending.pop_front() {
                let err = QueueOverflowError {
                    dropped_timestamp_ms: dropped.timestamp_ms,
                    capacity: FALL_QUEUE_DEPTH,
                };
                warn!("HealthCheck: {}", err);
                io.record(&AppEvent::FallQueueOverflow(err));
            }
        }
        // A slot is free after the pop above.
        let _ = self.pending.push_back(event);
        info!(
            "HealthCheck: fall at {}ms queued ({} pending)",
            event.timestamp_ms,
            self.pending.len()
        );
    }

    /// Feed one inbound reply. Late replies (past the deadline) do not count.
    pub fn on_response(
        &mut self,
        text: &str,
        now_ms: u64,
        io: &mut impl HealthCheckIo,
    ) -> Option<Resolution> {
        if let Some(timed_out) = self.poll(now_ms, io) {
            debug!("HealthCheck: reply arrived after the deadline, ignored");
            return Some(timed_out);
        }
        let Some(session) = self.session.as_ref() else {
            debug!("HealthCheck: no open session, reply ignored");
            return None;
        };

        let next = match self.policy.classify(text) {
            ResponseClass::Ok => SessionState::ResolvedOk,
            ResponseClass::NeedsHelp => SessionState::ResolvedHelp,
            ResponseClass::Unrecognized => {
                info!(
                    "HealthCheck: unrecognised reply, {}ms left",
                    session.deadline_ms.saturating_sub(now_ms)
                );
                io.record(&AppEvent::HealthCheckUnrecognized {
                    text: String::from(text),
                });
                return None;
            }
        };
        let session = self.session.take()?;
        Some(self.finish(session, next, Some(String::from(text)), now_ms, io))
    }

    /// Close the open session if its deadline has passed.
    pub fn poll(&mut self, now_ms: u64, io: &mut impl HealthCheckIo) -> Option<Resolution> {
        if !self.session.as_ref().is_some_and(|s| now_ms >= s.deadline_ms) {
            return None;
        }
        let session = self.session.take()?;
        Some(self.finish(session, SessionState::TimedOut, None, now_ms, io))
    }

    fn open(&mut self, episode: FallDetected, now_ms: u64, io: &mut impl HealthCheckIo) {
        let deadline_ms = now_ms.saturating_add(self.timeout_ms);
        info!(
            "HealthCheck: session opened for fall at {}ms, deadline in {}s",
            episode.timestamp_ms,
            self.timeout_ms / 1000
        );
        self.session = Some(HealthCheckSession {
            state: SessionState::AwaitingResponse,
            episode,
            opened_at_ms: now_ms,
            deadline_ms,
            response_text: None,
        });
        io.prompt(&self.prompt);
        io.record(&AppEvent::HealthCheckOpened {
            episode_ts: episode.timestamp_ms,
            deadline_ms,
        });
    }

    fn finish(
        &mut self,
        mut session: HealthCheckSession,
        state: SessionState,
        response_text: Option<String>,
        now_ms: u64,
        io: &mut impl HealthCheckIo,
    ) -> Resolution {
        session.state = state;
        session.response_text = response_text;

        info!(
            "HealthCheck: session for fall at {}ms -> {}",
            session.episode.timestamp_ms,
            state.as_str()
        );
        io.record(&AppEvent::HealthCheckResolved {
            outcome: state,
            episode_ts: session.episode.timestamp_ms,
            response_text: session.response_text.clone(),
        });

        let alert = state.alert_reason();
        if let Some(reason) = alert {
            let job = AlertJob::new(
                reason,
                session.episode.timestamp_ms,
                session.response_text.clone(),
            );
            if let Err(error) = io.submit(job) {
                warn!("HealthCheck: alert not queued: {}", error);
                io.record(&AppEvent::AlertDeliveryFailed {
                    reason,
                    episode_ts: session.episode.timestamp_ms,
                    attempts: 0,
                    error,
                });
            }
        }

        if let Some(next) = self.pending.pop_front() {
            self.open(next, now_ms, io);
        }

        Resolution {
            state,
            episode: session.episode,
            response_text: session.response_text,
            alert,
        }
    }
}
