//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MotionMonitor / HealthCheckOrchestrator / AmbientReactor
//! ```
//!
//! Driven adapters (ADC bus, audio device, event log, webhook, storage)
//! implement these traits. The domain types consume them via generics, so the
//! core never touches SPI, files or the network directly and every loop can be
//! driven from tests with simulated time.
//!
//! ## Notes
//!
//! - **ConfigPort** implementations MUST validate before persisting.
//! - **StoragePort** writes MUST be atomic (no partial blobs on power loss).
//! - All port errors are typed; callers must handle every variant explicitly.

use crate::app::events::AppEvent;
use crate::config::SystemConfig;
use crate::error::{AudioError, BusError, DispatchError};
use crate::inference::EmotionScore;
use crate::safety::alert::AlertJob;

// ───────────────────────────────────────────────────────────────
// Sensor bus port (driven adapter: ADC → domain)
// ───────────────────────────────────────────────────────────────

/// Synchronous access to one converter on the shared sensor bus.
///
/// Each call is bounded by the driver's own I/O timeout. Every loop owns its
/// own bus handle; the kernel (or the simulation) serialises transfers.
pub trait AdcBus {
    /// Read one raw count (0..=4095) from `channel`.
    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError>;
}

impl<T: AdcBus + ?Sized> AdcBus for &mut T {
    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
        (**self).read_channel(channel)
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock anchored to wall time at boot.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → event log)
// ───────────────────────────────────────────────────────────────

/// Append-only, fire-and-forget event log.
///
/// Adapters decide where events go (log console, JSON-lines file for the
/// dashboard, an in-memory vector in tests).
pub trait EventSink {
    fn record(&mut self, event: &AppEvent);
}

/// Fan-out: record to both sinks in order.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn record(&mut self, event: &AppEvent) {
        self.0.record(event);
        self.1.record(event);
    }
}

// ───────────────────────────────────────────────────────────────
// User-response channel (outbound half)
// ───────────────────────────────────────────────────────────────

/// Display / speech sink for check-in prompts.
pub trait PromptSink {
    fn prompt(&mut self, text: &str);
}

// ───────────────────────────────────────────────────────────────
// Alert hand-off
// ───────────────────────────────────────────────────────────────

/// Accepts escalation jobs. Must return immediately.
pub trait AlertSink {
    fn submit(&mut self, job: AlertJob) -> Result<(), DispatchError>;
}

/// Outbound webhook transport used by the alert worker.
pub trait WebhookPort {
    /// POST `body` as JSON; `Ok` only on a 2xx answer.
    fn post_json(&mut self, body: &serde_json::Value) -> Result<(), DispatchError>;
}

// ───────────────────────────────────────────────────────────────
// Audio device port
// ───────────────────────────────────────────────────────────────

/// Who currently holds the audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AudioOwner {
    /// Background playback started by the ambient reactor.
    Ambient,
    /// A user-requested session (e.g. "play my favourite song").
    Foreground,
}

impl AudioOwner {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ambient => "ambient",
            Self::Foreground => "foreground",
        }
    }
}

/// Exclusive audio device with explicit ownership.
///
/// `stop` only succeeds for the owner that issued the matching `start`.
pub trait AudioPort {
    fn start(
        &mut self,
        owner: AudioOwner,
        track: &str,
        volume: f32,
        looping: bool,
    ) -> Result<(), AudioError>;

    fn stop(&mut self, owner: AudioOwner) -> Result<(), AudioError>;

    /// Current holder, if any.
    fn owner(&self) -> Option<AudioOwner>;
}

// ───────────────────────────────────────────────────────────────
// Inference port
// ───────────────────────────────────────────────────────────────

/// Mood scoring of free text, usually backed by a remote model.
///
/// Implementations are shared across threads and must never fail: an
/// unreachable backend degrades to a local estimate.
pub trait EmotionClassifier {
    fn classify(&self, text: &str) -> EmotionScore;

    /// Short summary of `text` for the event log.
    fn summarize(&self, text: &str) -> String;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// Implementations MUST validate config values before persisting.
/// Invalid ranges are rejected with [`ConfigError::ValidationFailed`],
/// not silently clamped.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ disk)
// ───────────────────────────────────────────────────────────────

/// Persistent namespaced key-value blob storage (calibration profiles,
/// configuration).
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic; no partial writes on power loss.
pub trait StoragePort {
    /// Read a value. Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot).
    NotFound,
    /// Stored config failed deserialization.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Stored value does not fit in the caller's buffer.
    BufferTooSmall,
    /// Namespace or key contains characters the backend cannot store.
    InvalidKey,
    /// Generic I/O error.
    IoError,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::BufferTooSmall => write!(f, "value larger than buffer"),
            Self::InvalidKey => write!(f, "invalid namespace or key"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for ConfigError {}
impl std::error::Error for StorageError {}
