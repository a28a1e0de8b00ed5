//! MCP3208 8-channel 12-bit SPI ADC driver.
//!
//! ## Wire format (single-ended, mode 0)
//!
//! ```text
//!  MOSI  0000 01 S D2 | D1 D0 xx xxxx | xxxx xxxx
//!  MISO  xxxx xxxx    | xxx 0 B11..B8 | B7 .. B0
//! ```
//!
//! Generic over any `embedded_hal::spi::SpiDevice`, so the same driver runs
//! on a Linux spidev handle or a mock in tests. Chip-select and the transfer
//! timeout belong to the `SpiDevice` implementation.

use embedded_hal::spi::{Error as _, SpiDevice};
use log::debug;

use crate::app::ports::AdcBus;
use crate::error::BusError;
use crate::pins::ADC_CHANNELS;

pub struct Mcp3208<SPI> {
    spi: SPI,
}

impl<SPI> Mcp3208<SPI> {
    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give the SPI device back (e.g. to reconfigure clock speed).
    pub fn release(self) -> SPI {
        self.spi
    }
}

/// Three-byte single-ended conversion request for `channel`.
pub const fn command(channel: u8) -> [u8; 3] {
    [0x06 | ((channel & 0x04) >> 2), (channel & 0x03) << 6, 0x00]
}

/// Extract the 12-bit result from the response frame.
pub const fn decode(frame: [u8; 3]) -> u16 {
    (((frame[1] & 0x0F) as u16) << 8) | frame[2] as u16
}

impl<SPI: SpiDevice> AdcBus for Mcp3208<SPI> {
    fn read_channel(&mut self, channel: u8) -> Result<u16, BusError> {
        if channel >= ADC_CHANNELS {
            return Err(BusError::InvalidChannel(channel));
        }
        let mut frame = command(channel);
        self.spi.transfer_in_place(&mut frame).map_err(|e| {
            debug!("MCP3208: ch{} transfer failed: {:?}", channel, e.kind());
            BusError::TransferFailed
        })?;
        Ok(decode(frame))
    }
}
