//! CareWatch: host simulation entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedBus   LogEventSink   JsonlEventSink   FileStore      │
//! │  (AdcBus)       (EventSink)    (EventSink)      (Config+Store) │
//! │  SharedAudio    Webhook        ConsolePrompt    SystemClock    │
//! │  (AudioPort)    (WebhookPort)  (PromptSink)     (Clock)        │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │  Motion · Impact · HealthCheck · Alerts · Ambient      │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Runtime (motion / ambient / safety / alert / mood threads)    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! stdin drives the simulation: every line is a reply to the current
//! check-in, `!fall`, `!dark`, `!bright`, `!calibrate`, `!play [track]` and
//! `!stop` poke the simulated hardware, Ctrl-D exits.

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use log::{info, warn};

use carewatch::adapters::audio::{LogAudioBackend, SharedAudio};
use carewatch::adapters::console::ConsolePrompt;
use carewatch::adapters::jsonl_sink::JsonlEventSink;
use carewatch::adapters::log_sink::LogEventSink;
use carewatch::adapters::ollama::OllamaClassifier;
use carewatch::adapters::sim_bus::SimulatedBus;
use carewatch::adapters::storage::FileStore;
use carewatch::adapters::time::SystemClock;
use carewatch::adapters::webhook::Webhook;
use carewatch::ambient::TrackCatalog;
use carewatch::app::commands::AppCommand;
use carewatch::app::ports::{AudioOwner, AudioPort, ConfigPort, EmotionClassifier};
use carewatch::config::SystemConfig;
use carewatch::inference::{CachedClassifier, EmotionScore, KeywordClassifier};
use carewatch::runtime::{Runtime, Wiring, spawn_mood_worker};

const DEFAULT_DATA_DIR: &str = "./carewatch-data";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
/// Motion ticks the simulated impact stays pinned.
const IMPACT_TICKS: u32 = 30;
const DARK_LEVEL: f32 = 0.1;
const BRIGHT_LEVEL: f32 = 0.8;

/// Remote model when configured, local lexicon otherwise.
enum MoodClassifier {
    Remote(OllamaClassifier),
    Local(KeywordClassifier),
}

impl EmotionClassifier for MoodClassifier {
    fn classify(&self, text: &str) -> EmotionScore {
        match self {
            Self::Remote(c) => c.classify(text),
            Self::Local(c) => c.classify(text),
        }
    }

    fn summarize(&self, text: &str) -> String {
        match self {
            Self::Remote(c) => c.summarize(text),
            Self::Local(c) => c.summarize(text),
        }
    }
}

fn load_config(store: &FileStore) -> SystemConfig {
    let mut config = match store.load() {
        Ok(cfg) => {
            info!("Config loaded from {}", store.root().display());
            cfg
        }
        Err(e) => {
            warn!("Config load failed ({}), using defaults", e);
            SystemConfig::default()
        }
    };
    if let Ok(url) = std::env::var("CAREWATCH_WEBHOOK_URL") {
        if !url.trim().is_empty() {
            config.webhook_url = Some(url.trim().to_string());
        }
    }
    config
}

fn main() -> Result<()> {
    // ── 1. Logging ────────────────────────────────────────────
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    info!("╔══════════════════════════════════════╗");
    info!("║  CareWatch v{}                    ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Storage + config ───────────────────────────────────
    let data_dir = std::env::var("CAREWATCH_DATA_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_DATA_DIR));
    let store = FileStore::open(&data_dir)
        .with_context(|| format!("opening data dir {}", data_dir.display()))?;
    let config = load_config(&store);
    config.validate().context("effective config is invalid")?;

    // ── 3. Simulated hardware ─────────────────────────────────
    let bus = SimulatedBus::new();
    bus.set_level(config.light_channel, BRIGHT_LEVEL);

    let music_dir = data_dir.join("music");
    let catalog = TrackCatalog::from_dir(&music_dir)
        .with_context(|| format!("reading {}", music_dir.display()))?;
    info!("Ambient: {} track(s) in {}", catalog.len(), music_dir.display());
    let audio = SharedAudio::new(LogAudioBackend::new(&music_dir));

    // ── 4. Event sinks ────────────────────────────────────────
    let clock = SystemClock::new();
    let jsonl = JsonlEventSink::open(&data_dir.join("events.jsonl"), clock)
        .context("opening event log")?;
    let events = (LogEventSink::new(), jsonl);

    // ── 5. Mood classifier ────────────────────────────────────
    let inner = match std::env::var("CAREWATCH_OLLAMA_URL") {
        Ok(url) if !url.trim().is_empty() => {
            let model = std::env::var("CAREWATCH_OLLAMA_MODEL")
                .unwrap_or_else(|_| DEFAULT_OLLAMA_MODEL.to_string());
            info!("Mood: using Ollama model {} at {}", model, url);
            MoodClassifier::Remote(OllamaClassifier::new(url, model))
        }
        _ => MoodClassifier::Local(KeywordClassifier),
    };
    let mood = CachedClassifier::from_config(&config, inner, clock);

    // ── 6. Runtime ────────────────────────────────────────────
    let runtime = Runtime::start(
        &config,
        Wiring {
            motion_bus: bus.clone(),
            light_bus: bus.clone(),
            audio: audio.clone(),
            webhook: Webhook::from_config(&config),
            events,
            prompt: ConsolePrompt,
            store,
            clock,
            catalog: catalog.clone(),
        },
    )
    .context("starting runtime")?;
    let mood_stop = Arc::new(AtomicBool::new(false));
    let (replies, mood_worker) = spawn_mood_worker(mood, runtime.inbox(), mood_stop.clone())
        .context("starting mood worker")?;
    let mut foreground = audio;

    info!("Ready. Type a reply, or !fall !dark !bright !calibrate !play !stop; Ctrl-D exits");

    // ── 7. Console loop ───────────────────────────────────────
    for line in std::io::stdin().lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Console: read failed: {}", e);
                break;
            }
        };
        let Some(command) = AppCommand::parse(&line) else {
            if line.trim_start().starts_with('!') {
                warn!("Console: unknown command {:?}", line.trim());
            }
            continue;
        };
        match command {
            AppCommand::Reply(text) => {
                replies.route(text);
            }
            AppCommand::SimulateFall => bus.inject_impact(IMPACT_TICKS),
            AppCommand::Dark => {
                info!("Console: lights off");
                bus.set_level(config.light_channel, DARK_LEVEL);
            }
            AppCommand::Bright => {
                info!("Console: lights on");
                bus.set_level(config.light_channel, BRIGHT_LEVEL);
            }
            AppCommand::Calibrate => {
                info!("Console: recalibration requested, keep the device still");
                runtime.request_calibration();
            }
            AppCommand::PlayFavorite(track) => {
                let choice = track.or_else(|| catalog.choose(None).map(str::to_string));
                match choice {
                    Some(t) => {
                        if let Err(e) = foreground.start(AudioOwner::Foreground, &t, 1.0, false) {
                            warn!("Console: play failed: {}", e);
                        }
                    }
                    None => warn!("Console: no tracks in {}", music_dir.display()),
                }
            }
            AppCommand::StopFavorite => {
                if let Err(e) = foreground.stop(AudioOwner::Foreground) {
                    warn!("Console: stop failed: {}", e);
                }
            }
        }
    }

    runtime.shutdown();
    mood_stop.store(true, Ordering::Release);
    if mood_worker.join().is_err() {
        warn!("Mood worker panicked");
    }
    Ok(())
}
