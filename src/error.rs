//! Unified error types for CareWatch.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! binary's error handling uniform. All variants are `Copy` so they can be
//! passed through the monitoring loops and the event log without allocation.
//!
//! Containment rules:
//!
//! | Error                | Raised by               | Handled by                          |
//! |----------------------|-------------------------|-------------------------------------|
//! | `BusError`           | ADC bus / channel read  | owning loop: skip tick, retry next  |
//! | `CalibrationError`   | `calibrate(n)`          | operator, no offset written         |
//! | `DispatchError`      | alert worker            | retried, then logged and dropped    |
//! | `QueueOverflowError` | fall queue              | oldest dropped, logged              |
//! | `AudioError`         | audio arbiter           | caller logs, state left untouched   |

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the crate funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ADC bus could not be read or returned out-of-range data.
    Bus(BusError),
    /// A calibration run was rejected.
    Calibration(CalibrationError),
    /// An alert could not be delivered.
    Dispatch(DispatchError),
    /// The pending-fall queue overflowed.
    QueueOverflow(QueueOverflowError),
    /// The audio device refused a command.
    Audio(AudioError),
    /// Peripheral or runtime initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus: {e}"),
            Self::Calibration(e) => write!(f, "calibration: {e}"),
            Self::Dispatch(e) => write!(f, "dispatch: {e}"),
            Self::QueueOverflow(e) => write!(f, "queue: {e}"),
            Self::Audio(e) => write!(f, "audio: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor bus errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusError {
    /// The SPI transfer did not complete within the driver's timeout.
    Timeout,
    /// The SPI transfer failed.
    TransferFailed,
    /// Channel id is outside 0..=7.
    InvalidChannel(u8),
    /// The converter returned a count above 4095.
    OutOfRange(u16),
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "ADC transfer timed out"),
            Self::TransferFailed => write!(f, "ADC transfer failed"),
            Self::InvalidChannel(ch) => write!(f, "invalid ADC channel {ch}"),
            Self::OutOfRange(raw) => write!(f, "ADC count {raw} out of range"),
        }
    }
}

impl From<BusError> for Error {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

// ---------------------------------------------------------------------------
// Calibration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// A bus read failed mid-run.
    Bus(BusError),
    /// Zero samples were requested.
    InsufficientSamples,
    /// Raw samples spread more than the configured limit (sensor moving).
    Unstable { spread: u16 },
    /// The new profile could not be persisted.
    Persist,
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(e) => write!(f, "bus unreadable: {e}"),
            Self::InsufficientSamples => write!(f, "at least one sample is required"),
            Self::Unstable { spread } => {
                write!(f, "input not stationary (spread {spread} counts)")
            }
            Self::Persist => write!(f, "profile could not be persisted"),
        }
    }
}

impl From<BusError> for CalibrationError {
    fn from(e: BusError) -> Self {
        Self::Bus(e)
    }
}

impl From<CalibrationError> for Error {
    fn from(e: CalibrationError) -> Self {
        Self::Calibration(e)
    }
}

// ---------------------------------------------------------------------------
// Dispatch errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The bounded alert queue is full.
    QueueFull,
    /// No webhook endpoint is configured.
    NotConfigured,
    /// The endpoint answered with a non-2xx status.
    Status(u16),
    /// Connection, TLS or timeout failure.
    Transport,
    /// The payload could not be encoded.
    Encode,
}

impl DispatchError {
    /// Whether another attempt could plausibly succeed.
    pub const fn is_retryable(self) -> bool {
        match self {
            Self::Transport | Self::QueueFull => true,
            Self::Status(code) => code >= 500 || code == 408 || code == 429,
            Self::NotConfigured | Self::Encode => false,
        }
    }
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::QueueFull => write!(f, "alert queue full"),
            Self::NotConfigured => write!(f, "webhook not configured"),
            Self::Status(code) => write!(f, "webhook returned HTTP {code}"),
            Self::Transport => write!(f, "webhook transport failure"),
            Self::Encode => write!(f, "payload encoding failed"),
        }
    }
}

impl From<DispatchError> for Error {
    fn from(e: DispatchError) -> Self {
        Self::Dispatch(e)
    }
}

// ---------------------------------------------------------------------------
// Queue overflow
// ---------------------------------------------------------------------------

/// A pending fall was evicted to make room for a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueOverflowError {
    /// Timestamp of the evicted episode.
    pub dropped_timestamp_ms: u64,
    /// Queue capacity at the time of the overflow.
    pub capacity: usize,
}

impl fmt::Display for QueueOverflowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fall queue full ({}), dropped episode at {}ms",
            self.capacity, self.dropped_timestamp_ms
        )
    }
}

impl From<QueueOverflowError> for Error {
    fn from(e: QueueOverflowError) -> Self {
        Self::QueueOverflow(e)
    }
}

// ---------------------------------------------------------------------------
// Audio errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioError {
    /// A higher-priority owner holds the device.
    Busy,
    /// `stop` was issued by an owner that does not hold the device.
    NotOwner,
    /// The backend failed to open or decode the track.
    Backend,
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Busy => write!(f, "audio device busy"),
            Self::NotOwner => write!(f, "caller does not own the audio device"),
            Self::Backend => write!(f, "audio backend failure"),
        }
    }
}

impl From<AudioError> for Error {
    fn from(e: AudioError) -> Self {
        Self::Audio(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
