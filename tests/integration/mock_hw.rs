//! Mock ports for integration tests.
//!
//! Every mock records into shared state behind an `Arc`, so a test can keep
//! one handle for assertions while the code under test owns a clone.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use carewatch::adapters::audio::AudioBackend;
use carewatch::app::events::AppEvent;
use carewatch::app::ports::{
    ConfigError, ConfigPort, EventSink, PromptSink, StorageError, StoragePort, WebhookPort,
};
use carewatch::config::SystemConfig;
use carewatch::error::{AudioError, DispatchError};

// ── Event sink ────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<AppEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AppEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn types(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(AppEvent::event_type).collect()
    }

    pub fn count(&self, event_type: &str) -> usize {
        self.types().iter().filter(|t| **t == event_type).count()
    }
}

impl EventSink for RecordingSink {
    fn record(&mut self, event: &AppEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

// ── Prompt sink ───────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingPrompt {
    prompts: Arc<Mutex<Vec<String>>>,
}

impl RecordingPrompt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

impl PromptSink for RecordingPrompt {
    fn prompt(&mut self, text: &str) {
        self.prompts.lock().unwrap().push(text.to_string());
    }
}

// ── Webhook ───────────────────────────────────────────────────

/// Answers from a script, then succeeds. Every body is kept.
#[derive(Clone, Default)]
pub struct ScriptedWebhook {
    replies: Arc<Mutex<VecDeque<Result<(), DispatchError>>>>,
    bodies: Arc<Mutex<Vec<serde_json::Value>>>,
}

impl ScriptedWebhook {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn scripted(replies: &[Result<(), DispatchError>]) -> Self {
        let hook = Self::default();
        hook.replies.lock().unwrap().extend(replies.iter().copied());
        hook
    }

    pub fn failing(error: DispatchError, times: usize) -> Self {
        Self::scripted(&vec![Err(error); times])
    }

    pub fn bodies(&self) -> Vec<serde_json::Value> {
        self.bodies.lock().unwrap().clone()
    }
}

impl WebhookPort for ScriptedWebhook {
    fn post_json(&mut self, body: &serde_json::Value) -> Result<(), DispatchError> {
        self.bodies.lock().unwrap().push(body.clone());
        self.replies.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}

// ── Audio backend ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum AudioCall {
    Play { track: String, looping: bool },
    Halt,
}

#[derive(Clone, Default)]
pub struct RecordingBackend {
    calls: Arc<Mutex<Vec<AudioCall>>>,
}

impl RecordingBackend {
    pub fn calls(&self) -> Vec<AudioCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl AudioBackend for RecordingBackend {
    fn play(&mut self, track: &str, _volume: f32, looping: bool) -> Result<(), AudioError> {
        self.calls.lock().unwrap().push(AudioCall::Play {
            track: track.to_string(),
            looping,
        });
        Ok(())
    }

    fn halt(&mut self) -> Result<(), AudioError> {
        self.calls.lock().unwrap().push(AudioCall::Halt);
        Ok(())
    }
}

// ── Storage ───────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct MemStore {
    data: Arc<Mutex<HashMap<String, Vec<u8>>>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.data.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl StoragePort for MemStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.data.lock().unwrap();
        let v = data
            .get(&format!("{namespace}::{key}"))
            .ok_or(StorageError::NotFound)?;
        if v.len() > buf.len() {
            return Err(StorageError::BufferTooSmall);
        }
        buf[..v.len()].copy_from_slice(v);
        Ok(v.len())
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.data
            .lock()
            .unwrap()
            .insert(format!("{namespace}::{key}"), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.data.lock().unwrap().remove(&format!("{namespace}::{key}"));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.data
            .lock()
            .unwrap()
            .contains_key(&format!("{namespace}::{key}"))
    }
}

impl ConfigPort for MemStore {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        Ok(SystemConfig::default())
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()
    }
}
