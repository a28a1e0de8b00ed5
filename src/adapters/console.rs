//! Console prompt sink.
//!
//! Stand-in for the display / speech output: check-in prompts are printed
//! to stdout where the operator types replies.

use std::io::Write;

use log::info;

use crate::app::ports::PromptSink;

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

impl PromptSink for ConsolePrompt {
    fn prompt(&mut self, text: &str) {
        info!("Prompt: {}", text);
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "\n>>> {text}");
        let _ = out.flush();
    }
}
