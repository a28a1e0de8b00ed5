//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements              | Connects to                   |
//! |---------------|-------------------------|-------------------------------|
//! | `audio`       | AudioPort               | speaker (logging on host)     |
//! | `console`     | PromptSink              | stdout                        |
//! | `jsonl_sink`  | EventSink               | JSON-lines file (dashboard)   |
//! | `log_sink`    | EventSink               | `log` console output          |
//! | `ollama`      | EmotionClassifier       | local Ollama REST API         |
//! | `sim_bus`     | AdcBus                  | simulated MCP3208 channels    |
//! | `storage`     | ConfigPort, StoragePort | files under the data dir      |
//! | `time`        | Clock                   | `Instant` anchored to epoch   |
//! | `webhook`     | WebhookPort             | HTTPS endpoint (ureq)         |
//!
//! The real converter lives in [`crate::drivers::mcp3208`].

pub mod audio;
pub mod console;
pub mod jsonl_sink;
pub mod log_sink;
pub mod ollama;
pub mod sim_bus;
pub mod storage;
pub mod time;
pub mod webhook;
