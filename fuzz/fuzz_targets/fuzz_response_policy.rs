//! Fuzz target: check-in reply classification
//!
//! Feeds arbitrary UTF-8 to the default `ResponsePolicy` and verifies:
//! - No panics on any input (combining marks, huge tokens, empty text)
//! - Appending a standalone "help" always yields `NeedsHelp`
//! - Whitespace-only replies are never treated as an answer
//!
//! cargo fuzz run fuzz_response_policy

#![no_main]

use carewatch::safety::response::{ResponseClass, ResponsePolicy};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    let policy = ResponsePolicy::default();

    let _ = policy.classify(text);

    let with_help = format!("{text} help");
    assert_eq!(policy.classify(&with_help), ResponseClass::NeedsHelp);

    if text.trim().is_empty() {
        assert_eq!(policy.classify(text), ResponseClass::Unrecognized);
    }
});
