//! Shared audio device with explicit ownership.
//!
//! The ambient loop and the console both hold a [`SharedAudio`] handle onto
//! one arbiter. The arbiter tracks which [`AudioOwner`] issued the current
//! `start`:
//!
//! | Holder      | `start(Ambient)` | `start(Foreground)`   | `stop(x)`                 |
//! |-------------|------------------|-----------------------|---------------------------|
//! | idle        | plays            | plays                 | `NotOwner`                |
//! | Ambient     | replaces track   | preempts ambient      | only `stop(Ambient)`      |
//! | Foreground  | `Busy`           | replaces track        | only `stop(Foreground)`   |
//!
//! The actual output is a pluggable [`AudioBackend`]; the host build logs.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use log::{info, warn};

use crate::app::ports::{AudioOwner, AudioPort};
use crate::error::AudioError;

/// Raw playback device.
pub trait AudioBackend {
    fn play(&mut self, track: &str, volume: f32, looping: bool) -> Result<(), AudioError>;
    fn halt(&mut self) -> Result<(), AudioError>;
}

/// Host backend: logs what a speaker would play.
#[derive(Debug, Clone, Default)]
pub struct LogAudioBackend {
    music_dir: PathBuf,
}

impl LogAudioBackend {
    pub fn new(music_dir: impl Into<PathBuf>) -> Self {
        Self {
            music_dir: music_dir.into(),
        }
    }
}

impl AudioBackend for LogAudioBackend {
    fn play(&mut self, track: &str, volume: f32, looping: bool) -> Result<(), AudioError> {
        info!(
            "Audio: playing {} at {:.0}%{}",
            self.music_dir.join(track).display(),
            volume * 100.0,
            if looping { " (loop)" } else { "" }
        );
        Ok(())
    }

    fn halt(&mut self) -> Result<(), AudioError> {
        info!("Audio: stopped");
        Ok(())
    }
}

struct Arbiter<B> {
    backend: B,
    owner: Option<AudioOwner>,
    track: Option<String>,
}

/// Cloneable handle onto one audio device.
pub struct SharedAudio<B> {
    inner: Arc<Mutex<Arbiter<B>>>,
}

impl<B> Clone for SharedAudio<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: AudioBackend> SharedAudio<B> {
    pub fn new(backend: B) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Arbiter {
                backend,
                owner: None,
                track: None,
            })),
        }
    }

    /// Track currently playing, if any.
    pub fn current_track(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .track
            .clone()
    }
}

impl<B: AudioBackend> AudioPort for SharedAudio<B> {
    fn start(
        &mut self,
        owner: AudioOwner,
        track: &str,
        volume: f32,
        looping: bool,
    ) -> Result<(), AudioError> {
        let mut a = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = a.owner {
            if current > owner {
                return Err(AudioError::Busy);
            }
            if current != owner {
                info!("Audio: {} preempts {}", owner.as_str(), current.as_str());
            }
            if let Err(e) = a.backend.halt() {
                warn!("Audio: halt before start failed: {}", e);
            }
            a.owner = None;
            a.track = None;
        }

        a.backend.play(track, volume.clamp(0.0, 1.0), looping)?;
        a.owner = Some(owner);
        a.track = Some(track.to_string());
        Ok(())
    }

    fn stop(&mut self, owner: AudioOwner) -> Result<(), AudioError> {
        let mut a = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if a.owner != Some(owner) {
            return Err(AudioError::NotOwner);
        }
        a.owner = None;
        a.track = None;
        a.backend.halt()
    }

    fn owner(&self) -> Option<AudioOwner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).owner
    }
}
