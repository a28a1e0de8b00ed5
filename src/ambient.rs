//! Ambient light reactor.
//!
//! Polls the light channel on its own timer and starts or stops background
//! audio when the room goes dark or bright.
//!
//! ```text
//!  light ──▶ CalibratedChannel ──▶ value < threshold? ──▶ dwell counter ──▶ flip ──▶ AudioPort
//!                                                                            └────▶ EventSink
//! ```
//!
//! A flip requires `dwell` consecutive readings of the opposite condition;
//! any reading that agrees with the current state resets the count. A light
//! level hovering at the threshold therefore never toggles playback.
//!
//! The reactor only ever stops audio it started itself. If the user started
//! a foreground session in the meantime, the stop is refused by the audio
//! arbiter and the foreground session keeps playing.

use std::path::Path;

use log::{debug, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{AdcBus, AudioOwner, AudioPort, EventSink};
use crate::config::SystemConfig;
use crate::error::{AudioError, BusError};
use crate::sensors::channel::CalibratedChannel;

/// File extensions accepted into the catalog.
pub const TRACK_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg", "flac"];

// ── Track catalog ──────────────────────────────────────────────

/// Sorted list of playable tracks, shared by the ambient reactor and the
/// foreground "favorite song" command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackCatalog {
    tracks: Vec<String>,
}

impl TrackCatalog {
    pub fn new<I, S>(tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tracks: Vec<String> = tracks.into_iter().map(Into::into).collect();
        tracks.sort();
        tracks.dedup();
        Self { tracks }
    }

    /// Scan `dir` (non-recursive) for audio files. A missing directory is an
    /// empty catalog.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Ambient: music directory {} not found", dir.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(e),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if !path.is_file() || !is_track(&path) {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        let catalog = Self::new(names);
        info!("Ambient: {} tracks in {}", catalog.len(), dir.display());
        Ok(catalog)
    }

    pub fn tracks(&self) -> &[String] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn contains(&self, track: &str) -> bool {
        self.tracks.iter().any(|t| t == track)
    }

    /// Keep `previous` if it is still in the catalog, else the first track.
    pub fn choose(&self, previous: Option<&str>) -> Option<&str> {
        previous
            .and_then(|p| self.tracks.iter().find(|t| t.as_str() == p))
            .or_else(|| self.tracks.first())
            .map(String::as_str)
    }
}

fn is_track(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| TRACK_EXTENSIONS.iter().any(|x| x.eq_ignore_ascii_case(e)))
}

// ── Reactor ────────────────────────────────────────────────────

/// Debounced light state plus the track this reactor started, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmbientState {
    pub is_dark: bool,
    pub active_track: Option<String>,
    pub last_reading: Option<f32>,
}

/// Returned (and recorded) on every dark/bright flip.
#[derive(Debug, Clone, PartialEq)]
pub struct AmbientTransition {
    pub is_dark: bool,
    pub reading: f32,
    /// Track this flip started (dark) or stopped (bright); `None` when the
    /// flip left the device alone.
    pub track: Option<String>,
}

pub struct AmbientReactor<B: AdcBus> {
    bus: B,
    channel: CalibratedChannel,
    catalog: TrackCatalog,
    threshold: f32,
    dwell: u8,
    volume: f32,
    opposite: u8,
    state: AmbientState,
    last_played: Option<String>,
}

impl<B: AdcBus> AmbientReactor<B> {
    pub fn new(
        bus: B,
        channel: CalibratedChannel,
        catalog: TrackCatalog,
        threshold: f32,
        dwell: u8,
        volume: f32,
    ) -> Self {
        Self {
            bus,
            channel,
            catalog,
            threshold,
            dwell: dwell.max(1),
            volume,
            opposite: 0,
            state: AmbientState::default(),
            last_played: None,
        }
    }

    pub fn from_config(
        cfg: &SystemConfig,
        bus: B,
        channel: CalibratedChannel,
        catalog: TrackCatalog,
    ) -> Self {
        Self::new(
            bus,
            channel,
            catalog,
            cfg.dark_threshold,
            cfg.ambient_dwell_checks,
            cfg.ambient_volume,
        )
    }

    pub fn state(&self) -> &AmbientState {
        &self.state
    }

    pub fn catalog(&self) -> &TrackCatalog {
        &self.catalog
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Read light, update the debounced state, drive playback on a flip.
    ///
    /// A bus failure leaves the state untouched; the caller retries on the
    /// next tick.
    pub fn tick(
        &mut self,
        now_ms: u64,
        audio: &mut impl AudioPort,
        log: &mut impl EventSink,
    ) -> Result<Option<AmbientTransition>, BusError> {
        let reading = self.channel.read(&mut self.bus, now_ms)?.value;
        self.state.last_reading = Some(reading);

        let observed_dark = reading < self.threshold;
        if observed_dark == self.state.is_dark {
            self.opposite = 0;
            if observed_dark {
                self.follow_device(audio);
            }
            return Ok(None);
        }

        self.opposite += 1;
        if self.opposite < self.dwell {
            debug!(
                "Ambient: {:.3} opposite for {}/{} checks",
                reading, self.opposite, self.dwell
            );
            return Ok(None);
        }
        self.opposite = 0;
        self.state.is_dark = observed_dark;

        let track = if observed_dark {
            self.start_background(audio)
        } else {
            self.stop_background(audio)
        };

        info!(
            "Ambient: now {} ({:.3}), track {:?}",
            if observed_dark { "dark" } else { "bright" },
            reading,
            track
        );
        let transition = AmbientTransition {
            is_dark: observed_dark,
            reading,
            track,
        };
        log.record(&AppEvent::AmbientTransition {
            is_dark: transition.is_dark,
            reading: transition.reading,
            track: transition.track.clone(),
        });
        Ok(Some(transition))
    }

    fn start_background(&mut self, audio: &mut impl AudioPort) -> Option<String> {
        if let Some(active) = &self.state.active_track {
            debug!("Ambient: {} already active", active);
            return None;
        }
        let Some(track) = self.catalog.choose(self.last_played.as_deref()) else {
            info!("Ambient: no tracks available, staying silent");
            return None;
        };
        let track = track.to_string();

        match audio.start(AudioOwner::Ambient, &track, self.volume, true) {
            Ok(()) => {
                self.state.active_track = Some(track.clone());
                self.last_played = Some(track.clone());
                Some(track)
            }
            Err(AudioError::Busy) => {
                info!("Ambient: audio held by foreground playback, not starting");
                None
            }
            Err(e) => {
                warn!("Ambient: failed to start {}: {}", track, e);
                None
            }
        }
    }

    /// Reports the track only if this reactor actually stopped it.
    fn stop_background(&mut self, audio: &mut impl AudioPort) -> Option<String> {
        let track = self.state.active_track.take()?;
        match audio.stop(AudioOwner::Ambient) {
            Ok(()) => Some(track),
            Err(AudioError::NotOwner) => {
                debug!("Ambient: {} was replaced by foreground playback", track);
                None
            }
            Err(e) => {
                warn!("Ambient: failed to stop {}: {}", track, e);
                Some(track)
            }
        }
    }

    /// While the room stays dark: forget a track that foreground playback
    /// took over, and resume once the device is free again.
    fn follow_device(&mut self, audio: &mut impl AudioPort) {
        let owner = audio.owner();
        if self.state.active_track.is_some() {
            if owner != Some(AudioOwner::Ambient) {
                if let Some(track) = self.state.active_track.take() {
                    debug!("Ambient: {} no longer holds the device", track);
                }
            }
        } else if owner.is_none() && !self.catalog.is_empty() {
            if let Some(track) = self.start_background(audio) {
                info!("Ambient: device free again, resumed {}", track);
            }
        }
    }
}

/// Conservative dark threshold from two calibration runs: a fifth of the way
/// from the dark average towards the bright average.
///
/// `None` when either set is empty or the dark room is not darker than the
/// bright one.
pub fn recommend_dark_threshold(dark: &[f32], bright: &[f32]) -> Option<f32> {
    let avg = |s: &[f32]| -> Option<f32> {
        (!s.is_empty()).then(|| s.iter().sum::<f32>() / s.len() as f32)
    };
    let dark_avg = avg(dark)?;
    let bright_avg = avg(bright)?;
    if dark_avg >= bright_avg {
        return None;
    }
    Some(dark_avg + 0.2 * (bright_avg - dark_avg))
}
