//! Ollama-backed mood classifier.
//!
//! Asks a local Ollama server (`/api/generate`, non-streaming) for a 1–10
//! mood score and parses the first number in the answer. Any failure
//! (server down, timeout, unparseable answer) falls back to the local
//! [`KeywordClassifier`], so `classify` always returns a score.
//!
//! Wrap it in a [`CachedClassifier`](crate::inference::CachedClassifier)
//! before sharing it between callers.

use std::time::Duration;

use log::{debug, warn};

use crate::app::ports::EmotionClassifier;
use crate::inference::{EmotionScore, KeywordClassifier};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

pub struct OllamaClassifier {
    base_url: String,
    model: String,
    timeout: Duration,
    fallback: KeywordClassifier,
}

impl OllamaClassifier {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            timeout: DEFAULT_TIMEOUT,
            fallback: KeywordClassifier,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Prompt sent for one classification.
    pub fn prompt_for(text: &str) -> String {
        format!(
            "Analyze the emotional state expressed in this text and give a mood score \
             from 1 (extremely negative) to 10 (extremely positive).\n\n\
             Text: \"{text}\"\n\n\
             Respond with ONLY a single number from 1-10."
        )
    }

    fn generate(&self, prompt: &str) -> Option<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        let resp = ureq::post(&format!("{}/api/generate", self.base_url))
            .timeout(self.timeout)
            .send_json(&body)
            .map_err(|e| warn!("Ollama: request failed: {}", e))
            .ok()?;
        let json: serde_json::Value = resp
            .into_json()
            .map_err(|e| warn!("Ollama: bad response body: {}", e))
            .ok()?;
        json.get("response")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
    }
}

impl EmotionClassifier for OllamaClassifier {
    fn classify(&self, text: &str) -> EmotionScore {
        match self.generate(&Self::prompt_for(text)).as_deref().and_then(EmotionScore::parse) {
            Some(score) => {
                debug!("Ollama: scored {}", score);
                score
            }
            None => self.fallback.classify(text),
        }
    }

    fn summarize(&self, text: &str) -> String {
        self.fallback.summarize(text)
    }
}
