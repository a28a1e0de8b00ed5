//! HTTP webhook adapter.
//!
//! [`UreqWebhook`] POSTs the alert body with a per-request timeout and maps
//! the outcome onto [`DispatchError`]: non-2xx answers become
//! `Status(code)`, connection and timeout failures become `Transport`.
//! [`DisabledWebhook`] stands in when no URL is configured.

use std::time::Duration;

use log::{debug, warn};

use crate::app::ports::WebhookPort;
use crate::config::SystemConfig;
use crate::error::DispatchError;

pub struct UreqWebhook {
    url: String,
    timeout: Duration,
}

impl UreqWebhook {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            timeout,
        }
    }
}

impl WebhookPort for UreqWebhook {
    fn post_json(&mut self, body: &serde_json::Value) -> Result<(), DispatchError> {
        match ureq::post(&self.url).timeout(self.timeout).send_json(body) {
            Ok(resp) if (200..300).contains(&resp.status()) => {
                debug!("Webhook: HTTP {}", resp.status());
                Ok(())
            }
            Ok(resp) => Err(DispatchError::Status(resp.status())),
            Err(ureq::Error::Status(code, _)) => Err(DispatchError::Status(code)),
            Err(ureq::Error::Transport(t)) => {
                warn!("Webhook: transport error: {}", t);
                Err(DispatchError::Transport)
            }
        }
    }
}

/// Webhook used when no endpoint is configured; every post fails with
/// `NotConfigured` (not retried).
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWebhook;

impl WebhookPort for DisabledWebhook {
    fn post_json(&mut self, _body: &serde_json::Value) -> Result<(), DispatchError> {
        Err(DispatchError::NotConfigured)
    }
}

/// Either a live endpoint or the disabled stand-in, chosen from config.
pub enum Webhook {
    Http(UreqWebhook),
    Disabled(DisabledWebhook),
}

impl Webhook {
    pub fn from_config(cfg: &SystemConfig) -> Self {
        match &cfg.webhook_url {
            Some(url) => Self::Http(UreqWebhook::new(
                url.clone(),
                Duration::from_secs(u64::from(cfg.alert_request_timeout_secs)),
            )),
            None => {
                warn!("Webhook: no URL configured, alerts will only be logged");
                Self::Disabled(DisabledWebhook)
            }
        }
    }
}

impl WebhookPort for Webhook {
    fn post_json(&mut self, body: &serde_json::Value) -> Result<(), DispatchError> {
        match self {
            Self::Http(w) => w.post_json(body),
            Self::Disabled(w) => w.post_json(body),
        }
    }
}
