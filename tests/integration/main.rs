//! Integration test driver for the `tests/integration/` submodules.
//!
//! Each `mod` below exercises one pipeline against the mock ports in
//! `mock_hw`. Everything runs on the host with the simulated ADC bus.

mod ambient_tests;
mod calibration_tests;
mod fall_escalation_tests;
mod mock_hw;
mod runtime_tests;
