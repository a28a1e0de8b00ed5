//! Analog channel assignments for the CareWatch sensor board.
//!
//! Single source of truth: every reader references this module rather than
//! hard-coding channel numbers. The defaults here seed [`SystemConfig`]
//! and can be overridden per board in stored configuration.
//!
//! [`SystemConfig`]: crate::config::SystemConfig

// ---------------------------------------------------------------------------
// ADC (MCP3208, 8 channels, 12-bit, SPI0 CE0)
// ---------------------------------------------------------------------------

/// Highest valid raw count from the 12-bit converter.
pub const ADC_MAX: u16 = 4095;
/// Number of single-ended inputs on the converter.
pub const ADC_CHANNELS: u8 = 8;
/// Default SPI clock for the converter (1 MHz is inside the 2.7 V limit).
pub const ADC_SPI_HZ: u32 = 1_000_000;

// ---------------------------------------------------------------------------
// Accelerometer (ADXL335, analog, ratiometric)
// ---------------------------------------------------------------------------

pub const ACCEL_X_CHANNEL: u8 = 2;
pub const ACCEL_Y_CHANNEL: u8 = 3;
pub const ACCEL_Z_CHANNEL: u8 = 7;

// ---------------------------------------------------------------------------
// Light (LDR in a divider to 3V3; brighter = higher count)
// ---------------------------------------------------------------------------

pub const LIGHT_CHANNEL: u8 = 5;
