//! Check-in reply classification.
//!
//! Replies are lowercased and split into word tokens (apostrophes kept, so
//! "I'm" stays one token). A phrase matches when its tokens appear
//! contiguously. Help phrases are checked first: a reply that mentions both
//! ("yes, I need help") is a call for help, and negated OK phrases
//! ("not okay") are listed as help phrases.
//!
//! Anything that matches neither list is unrecognised and leaves the session
//! open; only a clear answer or the deadline closes it.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Ok,
    NeedsHelp,
    Unrecognized,
}

const DEFAULT_OK: &[&str] = &[
    "yes", "yeah", "yep", "okay", "ok", "fine", "good", "alright", "all right", "i'm okay",
    "im okay",
];

const DEFAULT_HELP: &[&str] = &[
    "help",
    "hurt",
    "hurts",
    "pain",
    "injured",
    "bleeding",
    "emergency",
    "ambulance",
    "no",
    "can't get up",
    "cannot get up",
    "not okay",
    "not ok",
    "not fine",
    "not good",
    "not alright",
];

/// Keyword policy for classifying free-text replies.
#[derive(Debug, Clone)]
pub struct ResponsePolicy {
    ok: Vec<Vec<String>>,
    help: Vec<Vec<String>>,
}

impl Default for ResponsePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_OK, DEFAULT_HELP)
    }
}

impl ResponsePolicy {
    pub fn new(ok: &[&str], help: &[&str]) -> Self {
        let phrases = |list: &[&str]| -> Vec<Vec<String>> {
            list.iter()
                .map(|p| tokenize(p))
                .filter(|t| !t.is_empty())
                .collect()
        };
        Self {
            ok: phrases(ok),
            help: phrases(help),
        }
    }

    pub fn classify(&self, text: &str) -> ResponseClass {
        let tokens = tokenize(text);
        if tokens.is_empty() {
            return ResponseClass::Unrecognized;
        }
        if self.help.iter().any(|p| contains_phrase(&tokens, p)) {
            return ResponseClass::NeedsHelp;
        }
        if self.ok.iter().any(|p| contains_phrase(&tokens, p)) {
            return ResponseClass::Ok;
        }
        ResponseClass::Unrecognized
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '\'' || c == '\u{2019}'))
        .map(|w| w.trim_matches(|c| c == '\'' || c == '\u{2019}'))
        .filter(|w| !w.is_empty())
        .map(|w| w.replace('\u{2019}', "'").to_lowercase())
        .collect()
}

fn contains_phrase(tokens: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty()
        && phrase.len() <= tokens.len()
        && tokens.windows(phrase.len()).any(|w| w == phrase)
}
