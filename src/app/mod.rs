//! Application core: domain wiring behind port traits.
//!
//! The motion tick, the event vocabulary and the console command set live
//! here. All interaction with hardware and the outside world happens through
//! the **port traits** in [`ports`], keeping this layer testable without real
//! peripherals.

pub mod commands;
pub mod events;
pub mod monitor;
pub mod ports;
