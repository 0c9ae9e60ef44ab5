//! Suggested filename from a `Content-Disposition` header.
//!
//! Accepts the forms conversion servers actually send:
//!
//! ```text
//! attachment; filename="deck.pptx"
//! attachment; filename=deck.pptx
//! attachment; filename*=UTF-8''d%C3%A9ck.pptx
//! ```
//!
//! The first `filename…=` parameter wins. Headers without `attachment`, or
//! values that end up empty, yield `None` and the caller falls back to its
//! default name.

use once_cell::sync::Lazy;
use regex::Regex;

static FILENAME_PARAM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)filename([^;=\n]*)=\s*(?:"([^"]*)"|'([^']*)'|([^;\n]*))"#)
        .expect("valid regex")
});

static EXT_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z0-9!#$&+\-^_`{}~]+)'[^']*'(.*)$").expect("valid regex"));

static PERCENT_ENCODED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[^%]|%[0-9A-Fa-f]{2})*$").expect("valid regex"));

/// Extract the suggested filename, or `None` if the header has none.
pub fn suggested_filename(header: &str) -> Option<String> {
    if !header.to_ascii_lowercase().contains("attachment") {
        return None;
    }

    let caps = FILENAME_PARAM.captures(header)?;
    let extended = caps.get(1).is_some_and(|m| m.as_str().contains('*'));
    let raw = caps
        .get(2)
        .or_else(|| caps.get(3))
        .or_else(|| caps.get(4))?
        .as_str();

    let value = if extended {
        decode_ext_value(raw.trim())?
    } else {
        raw.replace(['"', '\''], "")
    };

    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// `charset'lang'percent-encoded` → decoded text (UTF-8 only).
///
/// A `%` not followed by two hex digits makes the whole value invalid.
fn decode_ext_value(value: &str) -> Option<String> {
    let encoded = match EXT_VALUE.captures(value) {
        Some(caps) => caps.get(2)?.as_str(),
        None => value,
    };
    if !PERCENT_ENCODED.is_match(encoded) {
        return None;
    }
    urlencoding::decode(encoded).ok().map(|s| s.into_owned())
}
