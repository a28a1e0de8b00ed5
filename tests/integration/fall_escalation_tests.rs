//! Accelerometer → impact → check-in → webhook, driven tick by tick with
//! simulated time.

use std::sync::Arc;

use carewatch::adapters::sim_bus::SimulatedBus;
use carewatch::app::events::AppEvent;
use carewatch::app::monitor::MotionMonitor;
use carewatch::config::SystemConfig;
use carewatch::error::DispatchError;
use carewatch::pins::ACCEL_Y_CHANNEL;
use carewatch::runtime::SafetyIo;
use carewatch::safety::alert::{AlertDispatcher, AlertQueue, AlertReason, AlertWorker};
use carewatch::safety::health_check::{HealthCheckOrchestrator, SessionState};
use carewatch::safety::impact::FallDetected;
use carewatch::sensors;
use embassy_sync::channel::Channel;

use crate::mock_hw::{MemStore, RecordingPrompt, RecordingSink, ScriptedWebhook};

const TICK_MS: u64 = 100;

struct Rig {
    cfg: SystemConfig,
    bus: SimulatedBus,
    monitor: MotionMonitor<SimulatedBus>,
    orchestrator: HealthCheckOrchestrator,
    io: SafetyIo<RecordingPrompt, RecordingSink>,
    queue: Arc<AlertQueue>,
    prompt: RecordingPrompt,
    sink: RecordingSink,
    now_ms: u64,
}

impl Rig {
    fn new() -> Self {
        let cfg = SystemConfig::default();
        let bus = SimulatedBus::seeded(42, 0, 0.0);
        let store = MemStore::new();
        let monitor = MotionMonitor::from_config(&cfg, sensors::motion_estimator(&cfg, bus.clone(), &store));
        let queue: Arc<AlertQueue> = Arc::new(Channel::new());
        let prompt = RecordingPrompt::new();
        let sink = RecordingSink::new();
        let io = SafetyIo {
            prompt: prompt.clone(),
            alerts: AlertDispatcher::new(queue.clone()),
            events: sink.clone(),
        };
        Self {
            orchestrator: HealthCheckOrchestrator::from_config(&cfg),
            cfg,
            bus,
            monitor,
            io,
            queue,
            prompt,
            sink,
            now_ms: 1_700_000_000_000,
        }
    }

    /// Advance `n` motion ticks, feeding confirmed falls to the orchestrator.
    fn run_ticks(&mut self, n: u32) -> Vec<FallDetected> {
        let mut falls = Vec::new();
        for _ in 0..n {
            self.now_ms += TICK_MS;
            let mut events = self.sink.clone();
            if let Some(fall) = self.monitor.tick(self.now_ms, &mut events) {
                self.orchestrator.on_fall_detected(fall, self.now_ms, &mut self.io);
                falls.push(fall);
            }
            self.orchestrator.poll(self.now_ms, &mut self.io);
        }
        falls
    }

    fn reply(&mut self, text: &str) -> Option<SessionState> {
        self.orchestrator
            .on_response(text, self.now_ms, &mut self.io)
            .map(|r| r.state)
    }

    fn deliver_all(&self, webhook: ScriptedWebhook) {
        let mut worker = AlertWorker::new(self.queue.clone(), webhook, self.sink.clone(), &self.cfg);
        while let Some(job) = worker.try_next() {
            worker.handle(job, &mut |_| {});
        }
    }
}

#[test]
fn quiet_device_never_reports_a_fall() {
    let mut rig = Rig::new();
    assert!(rig.run_ticks(100).is_empty());
    assert!(rig.prompt.prompts().is_empty());
}

#[test]
fn impact_opens_exactly_one_check_in() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    let falls = rig.run_ticks(60);

    assert_eq!(falls.len(), 1, "{falls:?}");
    assert!(falls[0].timestamp_ms - falls[0].suspected_at_ms >= 200);
    assert_eq!(rig.prompt.prompts().len(), 1);
    assert!(rig.prompt.prompts()[0].contains("Are you okay?"));
    assert_eq!(rig.sink.count("fall_detected"), 1);
    assert_eq!(rig.sink.count("health_check_initiated"), 1);
}

#[test]
fn silence_escalates_as_no_response() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    let falls = rig.run_ticks(40);
    assert_eq!(falls.len(), 1);

    // 30 s default timeout
    rig.run_ticks(300);
    assert!(rig.orchestrator.session().is_none());

    let hook = ScriptedWebhook::accepting();
    rig.deliver_all(hook.clone());

    let bodies = hook.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["reason"], "NO_RESPONSE");
    assert_eq!(bodies[0]["title"], rig.cfg.alert_title.as_str());
    assert!(bodies[0].get("response_text").is_none());
    assert_eq!(rig.sink.count("alert_sent"), 1);
}

#[test]
fn call_for_help_escalates_with_reply_text() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    rig.run_ticks(40);

    assert_eq!(rig.reply("hmm"), None);
    assert_eq!(rig.reply("I can't get up"), Some(SessionState::ResolvedHelp));

    let hook = ScriptedWebhook::accepting();
    rig.deliver_all(hook.clone());
    let bodies = hook.bodies();
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["reason"], "NEEDS_HELP");
    assert_eq!(bodies[0]["response_text"], "I can't get up");
    assert_eq!(rig.sink.count("health_check_unrecognized"), 1);
}

#[test]
fn reassurance_closes_without_alert() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    rig.run_ticks(40);

    assert_eq!(rig.reply("Yes, I'm okay"), Some(SessionState::ResolvedOk));
    rig.run_ticks(400);
    assert!(rig.queue.try_receive().is_err());
    assert!(rig.sink.events().iter().any(|e| matches!(
        e,
        AppEvent::HealthCheckResolved {
            outcome: SessionState::ResolvedOk,
            ..
        }
    )));
}

#[test]
fn unreachable_webhook_records_failure_after_retries() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    rig.run_ticks(40);
    rig.reply("help");

    rig.deliver_all(ScriptedWebhook::failing(DispatchError::Transport, 10));

    let failure = rig
        .sink
        .events()
        .into_iter()
        .find_map(|e| match e {
            AppEvent::AlertDeliveryFailed {
                reason,
                attempts,
                error,
                ..
            } => Some((reason, attempts, error)),
            _ => None,
        });
    assert_eq!(
        failure,
        Some((AlertReason::NeedsHelp, rig.cfg.alert_max_attempts, DispatchError::Transport))
    );
    assert_eq!(rig.sink.count("alert_sent"), 0);
}

#[test]
fn second_fall_waits_for_the_first_session() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.inject_impact(30);
    rig.run_ticks(60);
    rig.bus.inject_impact(30);
    let falls = rig.run_ticks(60);

    assert_eq!(falls.len(), 1);
    assert_eq!(rig.orchestrator.pending_len(), 1);
    assert_eq!(rig.prompt.prompts().len(), 1);

    rig.reply("I'm fine");
    assert_eq!(rig.prompt.prompts().len(), 2, "queued fall opens next");
}

#[test]
fn bus_outage_pauses_detection_and_recovers() {
    let mut rig = Rig::new();
    rig.run_ticks(20);
    rig.bus.fail_reads(ACCEL_Y_CHANNEL, 5);
    assert!(rig.run_ticks(10).is_empty());

    assert_eq!(rig.sink.count("fall_detection_unavailable"), 1);
    assert!(rig.sink.events().contains(&AppEvent::DetectionRestored { failed_ticks: 5 }));
    assert!(rig.monitor.is_available());

    rig.bus.inject_impact(30);
    assert_eq!(rig.run_ticks(40).len(), 1, "detection resumes after recovery");
}
