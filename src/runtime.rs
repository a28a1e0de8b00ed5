//! Thread and channel wiring.
//!
//! ```text
//!  ┌──────────────┐ FallDetected ┌───────────────┐ AlertJob ┌──────────────┐
//!  │ motion 100ms │─────────────▶│    safety     │─────────▶│   alerts     │──▶ webhook
//!  └──────────────┘  FallChannel │ (or: fall,    │ AlertQueue│ retry/backoff│
//!                                │  reply,       │          └──────────────┘
//!  ┌──────────────┐              │  deadline)    │
//!  │ ambient 2s   │──▶ audio     └───────────────┘
//!  └──────────────┘                     ▲ ResponseInbox
//!                                       │
//!                                 ReplyRouter ──▶ mood (scored off the
//!                                       ▲          check-in path)
//!                                    console
//! ```
//!
//! Every loop runs on its own named thread. Periodic loops are driven by an
//! `edge_executor::LocalExecutor` with `async_io_mini` timers, so no loop
//! ever sleeps while holding state another loop needs. Loop state is owned
//! by exactly one thread; the hand-offs are bounded `embassy-sync`
//! channels.

use core::time::Duration;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Instant;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::{Channel, TrySendError};
use futures_lite::future;
use log::{debug, info, warn};

use crate::ambient::{AmbientReactor, TrackCatalog};
use crate::app::events::AppEvent;
use crate::app::monitor::MotionMonitor;
use crate::app::ports::{
    AdcBus, AlertSink, AudioPort, Clock, EmotionClassifier, EventSink, PromptSink, StoragePort,
    WebhookPort,
};
use crate::config::SystemConfig;
use crate::error::{DispatchError, Error, QueueOverflowError};
use crate::safety::alert::{AlertDispatcher, AlertJob, AlertQueue, AlertWorker};
use crate::safety::health_check::HealthCheckOrchestrator;
use crate::safety::impact::FallDetected;
use crate::sensors;

/// Falls in flight between the motion loop and the safety loop.
pub const FALL_CHANNEL_DEPTH: usize = 4;
/// Replies buffered for the safety loop.
pub const REPLY_CHANNEL_DEPTH: usize = 4;
/// Replies waiting to be mood-scored.
pub const MOOD_CHANNEL_DEPTH: usize = 8;

/// Longest the safety loop waits before re-checking the stop flag.
const SAFETY_IDLE_WAIT: Duration = Duration::from_millis(500);

pub type FallChannel = Channel<CriticalSectionRawMutex, FallDetected, FALL_CHANNEL_DEPTH>;
pub type ReplyChannel = Channel<CriticalSectionRawMutex, String, REPLY_CHANNEL_DEPTH>;
pub type MoodChannel = Channel<CriticalSectionRawMutex, String, MOOD_CHANNEL_DEPTH>;

// ── Periodic task abstraction ────────────────────────────────

/// Run `task` every `period` on a dedicated thread until `stop` is set.
///
/// Ticks are scheduled against a fixed start instant, so a slow tick does
/// not shift every later one.
pub fn spawn_periodic<F>(
    name: &str,
    period: Duration,
    stop: Arc<AtomicBool>,
    mut task: F,
) -> std::io::Result<JoinHandle<()>>
where
    F: FnMut() + Send + 'static,
{
    let label = name.to_string();
    std::thread::Builder::new()
        .name(label.clone())
        .spawn(move || {
            let executor: edge_executor::LocalExecutor<'_, 1> = edge_executor::LocalExecutor::new();
            info!("Runtime: {} loop started ({}ms)", label, period.as_millis());
            future::block_on(executor.run(async {
                let mut next = Instant::now();
                while !stop.load(Ordering::Acquire) {
                    task();
                    next += period;
                    let now = Instant::now();
                    if next < now {
                        debug!("Runtime: {} overran its period", label);
                        next = now;
                    }
                    async_io_mini::Timer::after(next - now).await;
                }
            }));
            info!("Runtime: {} loop stopped", label);
        })
}

/// Hand a fall to the safety loop. A full channel loses its oldest fall,
/// never the new one.
pub fn push_fall(falls: &FallChannel, fall: FallDetected, events: &mut impl EventSink) {
    let Err(TrySendError::Full(fall)) = falls.try_send(fall) else {
        return;
    };
    if let Ok(oldest) = falls.try_receive() {
        let err = QueueOverflowError {
            dropped_timestamp_ms: oldest.timestamp_ms,
            capacity: FALL_CHANNEL_DEPTH,
        };
        warn!("Motion: {}", err);
        events.record(&AppEvent::FallQueueOverflow(err));
    }
    if falls.try_send(fall).is_err() {
        warn!("Motion: fall channel still full, fall at {}ms dropped", fall.timestamp_ms);
    }
}

// ── Inbound replies ──────────────────────────────────────────

/// Sending half of the user-response channel.
#[derive(Clone)]
pub struct ResponseInbox {
    channel: Arc<ReplyChannel>,
}

impl Default for ResponseInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseInbox {
    pub fn new() -> Self {
        Self {
            channel: Arc::new(Channel::new()),
        }
    }

    /// Hand a reply to the safety loop. `false` if the buffer is full.
    pub fn deliver(&self, text: impl Into<String>) -> bool {
        if self.channel.try_send(text.into()).is_err() {
            warn!("Runtime: reply buffer full, reply dropped");
            return false;
        }
        true
    }
}

// ── Mood scoring ─────────────────────────────────────────────

/// Console-side entry point for replies.
///
/// The safety loop always gets the reply first; mood scoring receives a copy
/// on its own thread and can never hold a reply back.
#[derive(Clone)]
pub struct ReplyRouter {
    inbox: ResponseInbox,
    mood: Arc<MoodChannel>,
}

impl ReplyRouter {
    /// Deliver `text` to the safety loop, then queue it for scoring.
    /// Returns whether the safety loop accepted it.
    pub fn route(&self, text: impl Into<String>) -> bool {
        let text = text.into();
        let delivered = self.inbox.deliver(text.clone());
        if self.mood.try_send(text).is_err() {
            debug!("Runtime: mood queue full, reply not scored");
        }
        delivered
    }
}

/// Score replies with `classifier` on a dedicated thread until `stop` is set.
pub fn spawn_mood_worker<M>(
    classifier: M,
    inbox: ResponseInbox,
    stop: Arc<AtomicBool>,
) -> std::io::Result<(ReplyRouter, JoinHandle<()>)>
where
    M: EmotionClassifier + Send + 'static,
{
    let mood: Arc<MoodChannel> = Arc::new(Channel::new());
    let queue = mood.clone();
    let handle = std::thread::Builder::new()
        .name("mood".into())
        .spawn(move || {
            info!("Runtime: mood worker started");
            while !stop.load(Ordering::Acquire) {
                let next = future::block_on(future::or(
                    async { Some(queue.receive().await) },
                    async {
                        async_io_mini::Timer::after(SAFETY_IDLE_WAIT).await;
                        None
                    },
                ));
                if let Some(text) = next {
                    let score = classifier.classify(&text);
                    info!("Mood: {} ({})", score, classifier.summarize(&text));
                }
            }
            info!("Runtime: mood worker stopped");
        })?;
    Ok((ReplyRouter { inbox, mood }, handle))
}

// ── Safety loop ──────────────────────────────────────────────

/// Ports for the health-check orchestrator, owned by the safety thread.
pub struct SafetyIo<P, E> {
    pub prompt: P,
    pub alerts: AlertDispatcher,
    pub events: E,
}

impl<P: PromptSink, E> PromptSink for SafetyIo<P, E> {
    fn prompt(&mut self, text: &str) {
        self.prompt.prompt(text);
    }
}

impl<P, E> AlertSink for SafetyIo<P, E> {
    fn submit(&mut self, job: AlertJob) -> Result<(), DispatchError> {
        self.alerts.dispatch(job)
    }
}

impl<P, E: EventSink> EventSink for SafetyIo<P, E> {
    fn record(&mut self, event: &AppEvent) {
        self.events.record(event);
    }
}

enum SafetyInput {
    Fall(FallDetected),
    Reply(String),
    Wake,
}

/// Wait for a fall, a reply or the session deadline, whichever comes first,
/// and feed it to the orchestrator. Returns when `stop` is set.
pub fn run_safety_loop<P, E, C>(
    mut orchestrator: HealthCheckOrchestrator,
    falls: &FallChannel,
    replies: &ReplyChannel,
    mut io: SafetyIo<P, E>,
    clock: &C,
    stop: &AtomicBool,
) where
    P: PromptSink,
    E: EventSink,
    C: Clock,
{
    info!("Runtime: safety loop started");
    while !stop.load(Ordering::Acquire) {
        let wait = orchestrator
            .time_until_deadline(clock.now_ms())
            .map_or(SAFETY_IDLE_WAIT, |d| d.min(SAFETY_IDLE_WAIT));

        let input = future::block_on(future::or(
            future::or(
                async { SafetyInput::Fall(falls.receive().await) },
                async { SafetyInput::Reply(replies.receive().await) },
            ),
            async {
                async_io_mini::Timer::after(wait).await;
                SafetyInput::Wake
            },
        ));

        let now = clock.now_ms();
        match input {
            SafetyInput::Fall(fall) => orchestrator.on_fall_detected(fall, now, &mut io),
            SafetyInput::Reply(text) => {
                if let Some(r) = orchestrator.on_response(&text, now, &mut io) {
                    debug!("Runtime: session closed as {}", r.state.as_str());
                }
            }
            SafetyInput::Wake => {
                if let Some(r) = orchestrator.poll(now, &mut io) {
                    debug!("Runtime: session closed as {}", r.state.as_str());
                }
            }
        }
    }
    info!("Runtime: safety loop stopped");
}

// ── Runtime ──────────────────────────────────────────────────

/// Everything the runtime needs from the outside world.
pub struct Wiring<B, A, W, E, P, S, C> {
    /// Bus handle for the motion loop.
    pub motion_bus: B,
    /// Bus handle for the ambient loop.
    pub light_bus: B,
    pub audio: A,
    pub webhook: W,
    pub events: E,
    pub prompt: P,
    pub store: S,
    pub clock: C,
    pub catalog: TrackCatalog,
}

pub struct Runtime {
    stop: Arc<AtomicBool>,
    calibrate: Arc<AtomicBool>,
    inbox: ResponseInbox,
    threads: Vec<JoinHandle<()>>,
}

impl Runtime {
    /// Spawn the motion, ambient, safety and alert threads.
    pub fn start<B, A, W, E, P, S, C>(
        cfg: &SystemConfig,
        wiring: Wiring<B, A, W, E, P, S, C>,
    ) -> Result<Self, Error>
    where
        B: AdcBus + Send + 'static,
        A: AudioPort + Send + 'static,
        W: WebhookPort + Send + 'static,
        E: EventSink + Clone + Send + 'static,
        P: PromptSink + Send + 'static,
        S: StoragePort + Send + 'static,
        C: Clock + Clone + Send + 'static,
    {
        let Wiring {
            motion_bus,
            light_bus,
            mut audio,
            webhook,
            events,
            prompt,
            mut store,
            clock,
            catalog,
        } = wiring;

        let stop = Arc::new(AtomicBool::new(false));
        let calibrate = Arc::new(AtomicBool::new(false));
        let inbox = ResponseInbox::new();
        let falls: Arc<FallChannel> = Arc::new(Channel::new());
        let alert_queue: Arc<AlertQueue> = Arc::new(Channel::new());
        let spawn_err = |_: std::io::Error| Error::Init("thread spawn failed");
        let mut threads = Vec::with_capacity(4);

        // Alert worker
        let worker = AlertWorker::new(alert_queue.clone(), webhook, events.clone(), cfg);
        let worker_stop = stop.clone();
        threads.push(
            std::thread::Builder::new()
                .name("alerts".into())
                .spawn(move || worker.run(&worker_stop))
                .map_err(spawn_err)?,
        );

        // Safety loop
        let orchestrator = HealthCheckOrchestrator::from_config(cfg);
        let io = SafetyIo {
            prompt,
            alerts: AlertDispatcher::new(alert_queue),
            events: events.clone(),
        };
        let (safety_falls, safety_replies, safety_clock, safety_stop) =
            (falls.clone(), inbox.channel.clone(), clock.clone(), stop.clone());
        threads.push(
            std::thread::Builder::new()
                .name("safety".into())
                .spawn(move || {
                    run_safety_loop(
                        orchestrator,
                        &safety_falls,
                        &safety_replies,
                        io,
                        &safety_clock,
                        &safety_stop,
                    );
                })
                .map_err(spawn_err)?,
        );

        // Ambient loop
        let light = sensors::light_channel(cfg, &store);
        let mut reactor = AmbientReactor::from_config(cfg, light_bus, light, catalog);
        let (mut ambient_events, ambient_clock) = (events.clone(), clock.clone());
        threads.push(
            spawn_periodic(
                "ambient",
                Duration::from_millis(u64::from(cfg.ambient_interval_ms)),
                stop.clone(),
                move || {
                    if let Err(e) = reactor.tick(ambient_clock.now_ms(), &mut audio, &mut ambient_events) {
                        warn!("Ambient: light read failed: {}", e);
                    }
                },
            )
            .map_err(spawn_err)?,
        );

        // Motion loop
        let estimator = sensors::motion_estimator(cfg, motion_bus, &store);
        let mut monitor = MotionMonitor::from_config(cfg, estimator);
        let (samples, max_spread) = (cfg.calibration_samples, cfg.calibration_max_spread);
        let (mut motion_events, motion_clock, motion_calibrate) =
            (events, clock, calibrate.clone());
        threads.push(
            spawn_periodic(
                "motion",
                Duration::from_millis(u64::from(cfg.sample_interval_ms)),
                stop.clone(),
                move || {
                    if motion_calibrate.swap(false, Ordering::AcqRel) {
                        if let Err(e) =
                            monitor.recalibrate(samples, max_spread, &mut store, &mut motion_events)
                        {
                            warn!("Motion: calibration failed: {}", e);
                        }
                    }
                    if let Some(fall) = monitor.tick(motion_clock.now_ms(), &mut motion_events) {
                        push_fall(&falls, fall, &mut motion_events);
                    }
                },
            )
            .map_err(spawn_err)?,
        );

        info!("Runtime: {} threads running", threads.len());
        Ok(Self {
            stop,
            calibrate,
            inbox,
            threads,
        })
    }

    /// Handle for delivering user replies.
    pub fn inbox(&self) -> ResponseInbox {
        self.inbox.clone()
    }

    /// Ask the motion loop to recalibrate on its next tick.
    pub fn request_calibration(&self) {
        self.calibrate.store(true, Ordering::Release);
    }

    /// Stop every loop and wait for the threads to exit.
    pub fn shutdown(self) {
        info!("Runtime: shutting down");
        self.stop.store(true, Ordering::Release);
        for t in self.threads {
            let name = t.thread().name().unwrap_or("?").to_string();
            if t.join().is_err() {
                warn!("Runtime: {} thread panicked", name);
            }
        }
        info!("Runtime: stopped");
    }
}
