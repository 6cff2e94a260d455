//! PII redaction and content flags for incoming chat messages.
//!
//! Patterns are deliberately small: e-mail addresses, phone-like digit runs
//! and a short profanity list.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("valid regex")
});

static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\+?\d[\d\-\s]{7,}\d").expect("valid regex"));

const BAD_WORDS: &[&str] = &["fuck", "shit"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyFlag {
    Email,
    Phone,
    Profanity,
}

/// Replace e-mail addresses with `[EMAIL]` and phone numbers with `[PHONE]`.
pub fn sanitize(text: &str) -> String {
    let redacted = EMAIL.replace_all(text, "[EMAIL]");
    PHONE.replace_all(&redacted, "[PHONE]").into_owned()
}

pub fn flags(text: &str) -> Vec<SafetyFlag> {
    let mut found = Vec::new();
    if EMAIL.is_match(text) {
        found.push(SafetyFlag::Email);
    }
    if PHONE.is_match(text) {
        found.push(SafetyFlag::Phone);
    }
    let lower = text.to_lowercase();
    if BAD_WORDS.iter().any(|w| lower.contains(w)) {
        found.push(SafetyFlag::Profanity);
    }
    found
}
