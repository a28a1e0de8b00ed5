//! CareWatch library.
//!
//! Fall detection, check-in escalation and ambient audio for a
//! sensor-equipped care companion. The domain modules are pure and
//! time-injected; everything that touches the outside world sits behind
//! the port traits in [`app::ports`] and is implemented in [`adapters`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod ambient;
pub mod app;
pub mod config;
pub mod drivers;
pub mod error;
pub mod inference;
pub mod pins;
pub mod runtime;
pub mod safety;
pub mod sensors;
