//! Light sensor → ambient reactor → shared audio device.

use carewatch::adapters::audio::SharedAudio;
use carewatch::adapters::sim_bus::SimulatedBus;
use carewatch::ambient::{AmbientReactor, TrackCatalog, recommend_dark_threshold};
use carewatch::app::events::AppEvent;
use carewatch::app::ports::{AudioOwner, AudioPort};
use carewatch::config::SystemConfig;
use carewatch::error::AudioError;
use carewatch::pins::LIGHT_CHANNEL;
use carewatch::sensors;

use crate::mock_hw::{AudioCall, MemStore, RecordingBackend, RecordingSink};

const CHECK_MS: u64 = 2_000;

struct Room {
    bus: SimulatedBus,
    reactor: AmbientReactor<SimulatedBus>,
    audio: SharedAudio<RecordingBackend>,
    backend: RecordingBackend,
    sink: RecordingSink,
    now_ms: u64,
}

impl Room {
    fn new(tracks: &[&str]) -> Self {
        let cfg = SystemConfig {
            filter_window: 1,
            ..SystemConfig::default()
        };
        let bus = SimulatedBus::seeded(3, 0, 0.0);
        bus.set_level(LIGHT_CHANNEL, 0.9);
        let channel = sensors::light_channel(&cfg, &MemStore::new());
        let backend = RecordingBackend::default();
        Self {
            reactor: AmbientReactor::from_config(
                &cfg,
                bus.clone(),
                channel,
                TrackCatalog::new(tracks.iter().copied()),
            ),
            bus,
            audio: SharedAudio::new(backend.clone()),
            backend,
            sink: RecordingSink::new(),
            now_ms: 0,
        }
    }

    fn checks(&mut self, n: usize) {
        for _ in 0..n {
            self.now_ms += CHECK_MS;
            self.reactor
                .tick(self.now_ms, &mut self.audio, &mut self.sink)
                .unwrap();
        }
    }
}

#[test]
fn lights_off_starts_looping_ambient_track() {
    let mut room = Room::new(&["rain.wav", "calm.mp3"]);
    room.checks(3);
    assert!(room.backend.calls().is_empty());

    room.bus.set_level(LIGHT_CHANNEL, 0.2);
    room.checks(1);
    assert!(room.backend.calls().is_empty(), "one dark check is not enough");
    room.checks(1);

    assert_eq!(
        room.backend.calls(),
        vec![AudioCall::Play {
            track: "calm.mp3".into(),
            looping: true
        }]
    );
    assert_eq!(room.audio.owner(), Some(AudioOwner::Ambient));
    assert!(room.reactor.state().is_dark);

    room.bus.set_level(LIGHT_CHANNEL, 0.9);
    room.checks(2);
    assert_eq!(room.backend.calls().last(), Some(&AudioCall::Halt));
    assert_eq!(room.audio.owner(), None);
    assert_eq!(room.sink.count("ambient_transition"), 2);
}

#[test]
fn flicker_does_not_toggle_playback() {
    let mut room = Room::new(&["rain.wav"]);
    for level in [0.2, 0.9, 0.2, 0.9, 0.2, 0.9] {
        room.bus.set_level(LIGHT_CHANNEL, level);
        room.checks(1);
    }
    assert!(room.backend.calls().is_empty());
    assert_eq!(room.sink.count("ambient_transition"), 0);
}

#[test]
fn foreground_song_is_never_interrupted() {
    let mut room = Room::new(&["rain.wav"]);
    let mut console = room.audio.clone();
    console
        .start(AudioOwner::Foreground, "favourite.mp3", 1.0, false)
        .unwrap();

    room.bus.set_level(LIGHT_CHANNEL, 0.1);
    room.checks(2);
    assert!(room.reactor.state().is_dark);
    assert_eq!(room.reactor.state().active_track, None);
    assert_eq!(room.audio.current_track().as_deref(), Some("favourite.mp3"));

    room.bus.set_level(LIGHT_CHANNEL, 0.9);
    room.checks(2);
    assert_eq!(room.audio.current_track().as_deref(), Some("favourite.mp3"));
    assert_eq!(
        room.audio.clone().stop(AudioOwner::Ambient),
        Err(AudioError::NotOwner)
    );
}

#[test]
fn foreground_preempts_ambient_and_ambient_stop_is_harmless() {
    let mut room = Room::new(&["rain.wav"]);
    room.bus.set_level(LIGHT_CHANNEL, 0.1);
    room.checks(2);
    assert_eq!(room.audio.owner(), Some(AudioOwner::Ambient));

    let mut console = room.audio.clone();
    console
        .start(AudioOwner::Foreground, "favourite.mp3", 1.0, false)
        .unwrap();

    room.bus.set_level(LIGHT_CHANNEL, 0.9);
    room.checks(2);
    assert!(!room.reactor.state().is_dark);
    assert_eq!(room.audio.owner(), Some(AudioOwner::Foreground));
    assert!(matches!(
        room.sink.events().last(),
        Some(AppEvent::AmbientTransition { is_dark: false, track: None, .. })
    ));
}

#[test]
fn ambient_comes_back_after_the_favourite_song_in_a_dark_room() {
    let mut room = Room::new(&["rain.wav"]);
    room.bus.set_level(LIGHT_CHANNEL, 0.1);
    room.checks(2);

    let mut console = room.audio.clone();
    console
        .start(AudioOwner::Foreground, "favourite.mp3", 1.0, false)
        .unwrap();
    room.checks(1);
    assert_eq!(room.reactor.state().active_track, None);

    console.stop(AudioOwner::Foreground).unwrap();
    room.checks(1);
    assert_eq!(room.audio.owner(), Some(AudioOwner::Ambient));
    assert_eq!(room.audio.current_track().as_deref(), Some("rain.wav"));
    assert_eq!(room.sink.count("ambient_transition"), 1);
}

#[test]
fn empty_catalog_stays_silent() {
    let mut room = Room::new(&[]);
    room.bus.set_level(LIGHT_CHANNEL, 0.1);
    room.checks(3);
    assert!(room.reactor.state().is_dark);
    assert!(room.backend.calls().is_empty());
}

#[test]
fn threshold_from_calibration_runs_separates_the_rooms() {
    let mut room = Room::new(&["rain.wav"]);
    let sample = |level: f32, room: &mut Room| -> Vec<f32> {
        room.bus.set_level(LIGHT_CHANNEL, level);
        (0..5)
            .map(|_| {
                room.checks(1);
                room.reactor.state().last_reading.unwrap()
            })
            .collect()
    };
    let dark = sample(0.2, &mut room);
    let bright = sample(0.7, &mut room);

    let t = recommend_dark_threshold(&dark, &bright).unwrap();
    assert!(t > 0.2 && t < 0.7, "{t}");
    assert!((t - 0.3).abs() < 0.01, "{t}");
}
