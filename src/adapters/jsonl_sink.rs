//! JSON-lines event log.
//!
//! Appends one `{timestamp, event_type, details}` object per line to a file
//! that the dashboard tails. Clones share one file handle; each record is a
//! single `write_all` of a complete line so records from different loops
//! never interleave.
//!
//! Write failures are logged and swallowed: the event log is
//! fire-and-forget and must never stall a monitoring loop.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use log::warn;
use serde_json::json;

use crate::app::events::AppEvent;
use crate::app::ports::{Clock, EventSink};
use crate::safety::alert::rfc3339;

#[derive(Clone)]
pub struct JsonlEventSink<C: Clock> {
    path: PathBuf,
    file: Arc<Mutex<File>>,
    clock: C,
}

impl<C: Clock> JsonlEventSink<C> {
    /// Open (or create) `path` for appending.
    pub fn open(path: &Path, clock: C) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Arc::new(Mutex::new(file)),
            clock,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Render one record (without the trailing newline).
    pub fn render(event: &AppEvent, now_ms: u64) -> String {
        json!({
            "timestamp": rfc3339(now_ms),
            "event_type": event.event_type(),
            "details": event.details(),
        })
        .to_string()
    }
}

impl<C: Clock> EventSink for JsonlEventSink<C> {
    fn record(&mut self, event: &AppEvent) {
        let mut line = Self::render(event, self.clock.now_ms());
        line.push('\n');
        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        if let Err(e) = file.write_all(line.as_bytes()) {
            warn!(
                "EventLog: write to {} failed: {}",
                self.path.display(),
                e
            );
        }
    }
}
