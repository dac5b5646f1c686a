//! Completion promise detection.
//!
//! An agent signals "done" by emitting `<promise>PHRASE</promise>`. Only the
//! first tagged payload counts, and it must equal the configured phrase
//! exactly (case-sensitive) after whitespace normalization.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::types::{Message, Role};

static PROMISE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<promise>(.*?)</promise>").expect("promise regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Default number of assistant messages scanned for a promise.
pub const DEFAULT_WINDOW: usize = 5;

/// Extract the first `<promise>` payload, trimmed, whitespace runs collapsed.
pub fn extract_promise(text: &str) -> Option<String> {
    let caps = PROMISE_RE.captures(text)?;
    let payload = caps.get(1)?.as_str().trim();
    Some(WHITESPACE_RE.replace_all(payload, " ").into_owned())
}

/// Exact, case-sensitive comparison of the extracted promise with `target`.
pub fn is_satisfied(candidate: &str, target: &str) -> bool {
    extract_promise(candidate).as_deref() == Some(target)
}

/// Scan the last `window` assistant messages, newest first, for the promise.
///
/// Returns the index (into `messages`) of the first satisfying message.
pub fn scan_recent(messages: &[Message], target: &str, window: usize) -> Option<usize> {
    messages
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, msg)| msg.role == Role::Assistant)
        .take(window)
        .find(|(_, msg)| is_satisfied(&msg.text, target))
        .map(|(idx, _)| idx)
}
