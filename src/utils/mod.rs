//! Utility functions and helpers.

pub mod decode;
pub mod http;

use std::sync::LazyLock;

use regex::Regex;

pub use decode::decode_page;

static MARKUP_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid tag pattern"));

static NAMED_ENTITY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(\w+);").expect("valid entity pattern"));

/// Hex md5 digest of some content.
///
/// Only used for equality detection and resource ids.
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Replace markup tags with a space and decode common named entities.
///
/// Unknown entities are left untouched.
pub fn strip_html(text: &str) -> String {
    let stripped = MARKUP_TAG.replace_all(text, " ");
    NAMED_ENTITY
        .replace_all(&stripped, |caps: &regex::Captures| {
            let decoded = match &caps[1] {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "apos" => "'",
                "nbsp" => "\u{a0}",
                _ => return caps[0].to_string(),
            };
            decoded.to_string()
        })
        .into_owned()
}
