//! Peripheral drivers.

pub mod mcp3208;
