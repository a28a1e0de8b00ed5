//! Full threaded runtime against the simulated bus, on wall-clock time.

use std::time::{Duration, Instant};

use carewatch::adapters::audio::SharedAudio;
use carewatch::adapters::sim_bus::SimulatedBus;
use carewatch::adapters::time::SystemClock;
use carewatch::ambient::TrackCatalog;
use carewatch::config::SystemConfig;
use carewatch::runtime::{Runtime, Wiring};

use crate::mock_hw::{
    AudioCall, MemStore, RecordingBackend, RecordingPrompt, RecordingSink, ScriptedWebhook,
};

fn wait_for(what: &str, timeout: Duration, mut done: impl FnMut() -> bool) {
    let deadline = Instant::now() + timeout;
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {what}");
        std::thread::sleep(Duration::from_millis(20));
    }
}

#[test]
fn fall_reply_and_alert_flow_through_the_threads() {
    let cfg = SystemConfig {
        ambient_interval_ms: 200,
        ..SystemConfig::default()
    };
    let bus = SimulatedBus::seeded(11, 0, 0.0);
    bus.set_level(cfg.light_channel, 0.9);
    let backend = RecordingBackend::default();
    let prompt = RecordingPrompt::new();
    let sink = RecordingSink::new();
    let webhook = ScriptedWebhook::accepting();

    let runtime = Runtime::start(
        &cfg,
        Wiring {
            motion_bus: bus.clone(),
            light_bus: bus.clone(),
            audio: SharedAudio::new(backend.clone()),
            webhook: webhook.clone(),
            events: sink.clone(),
            prompt: prompt.clone(),
            store: MemStore::new(),
            clock: SystemClock::new(),
            catalog: TrackCatalog::new(["night.ogg"]),
        },
    )
    .unwrap();

    std::thread::sleep(Duration::from_millis(500));
    bus.inject_impact(30);
    wait_for("check-in prompt", Duration::from_secs(10), || !prompt.prompts().is_empty());

    assert!(runtime.inbox().deliver("please help"));
    wait_for("webhook call", Duration::from_secs(10), || !webhook.bodies().is_empty());
    assert_eq!(webhook.bodies()[0]["reason"], "NEEDS_HELP");

    bus.set_level(cfg.light_channel, 0.1);
    wait_for("ambient playback", Duration::from_secs(10), || {
        backend
            .calls()
            .iter()
            .any(|c| matches!(c, AudioCall::Play { looping: true, .. }))
    });

    runtime.shutdown();

    assert_eq!(sink.count("fall_detected"), 1);
    assert_eq!(sink.count("alert_sent"), 1);
    assert_eq!(sink.count("ambient_transition"), 1);
}

#[test]
fn shutdown_joins_idle_runtime() {
    let cfg = SystemConfig::default();
    let bus = SimulatedBus::seeded(1, 0, 0.0);
    let runtime = Runtime::start(
        &cfg,
        Wiring {
            motion_bus: bus.clone(),
            light_bus: bus,
            audio: SharedAudio::new(RecordingBackend::default()),
            webhook: ScriptedWebhook::accepting(),
            events: RecordingSink::new(),
            prompt: RecordingPrompt::new(),
            store: MemStore::new(),
            clock: SystemClock::new(),
            catalog: TrackCatalog::default(),
        },
    )
    .unwrap();
    std::thread::sleep(Duration::from_millis(200));

    let started = Instant::now();
    runtime.shutdown();
    assert!(started.elapsed() < Duration::from_secs(5));
}
